use scout_core::{EventKind, WorkerEvent};
use tracing::{debug, error, info, trace, warn};

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // health
        EventKind::CapabilityChecked => "capability check recorded",
        EventKind::CapabilityRecovered => "capability recovered",
        EventKind::CapabilityDegraded => "capability unhealthy; withheld from advertisement",

        // credentials
        EventKind::CredentialCooledDown => "account rate limited; out of rotation until cooldown ends",

        // execution
        EventKind::ActorRunFinished => "actor run finished",
        EventKind::JobFinished => "job finished",
    }
}

/// Log `event` at the level its kind deserves.
pub fn log_event(event: &WorkerEvent) {
    let msg = message_for(event.kind());

    match event {
        WorkerEvent::CapabilityChecked {
            capability,
            healthy,
            error_count,
            error,
        } => debug!(
            capability = %capability,
            healthy,
            error_count,
            error = error.as_deref().unwrap_or(""),
            "{msg}"
        ),
        WorkerEvent::CapabilityRecovered { capability } => info!(capability = %capability, "{msg}"),
        WorkerEvent::CapabilityDegraded { capability, error } => warn!(
            capability = %capability,
            error = error.as_deref().unwrap_or("unknown"),
            "{msg}"
        ),
        WorkerEvent::CredentialCooledDown { username, cooldown } => {
            warn!(username = %username, cooldown_secs = cooldown.as_secs(), "{msg}")
        }
        WorkerEvent::ActorRunFinished {
            actor,
            run_id,
            outcome,
            polls,
        } => {
            if outcome == "succeeded" {
                debug!(actor = %actor, run_id = %run_id, polls, "{msg}")
            } else if outcome == "cancelled" {
                trace!(actor = %actor, run_id = %run_id, polls, "actor run abandoned after cancellation")
            } else {
                error!(actor = %actor, run_id = %run_id, outcome = %outcome, polls, "actor run did not succeed")
            }
        }
        WorkerEvent::JobFinished {
            job_type,
            ok,
            items,
            elapsed,
        } => {
            let elapsed_ms = elapsed.as_millis() as u64;
            if *ok {
                debug!(job_type = %job_type, items, elapsed_ms, "{msg}")
            } else {
                debug!(job_type = %job_type, elapsed_ms, "job finished with error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn every_kind_has_a_message() {
        let kinds = [
            EventKind::CapabilityChecked,
            EventKind::CapabilityRecovered,
            EventKind::CapabilityDegraded,
            EventKind::CredentialCooledDown,
            EventKind::ActorRunFinished,
            EventKind::JobFinished,
        ];
        for kind in kinds {
            assert!(!message_for(kind).is_empty());
        }
    }

    #[test]
    fn logging_without_subscriber_is_silent() {
        log_event(&WorkerEvent::CredentialCooledDown {
            username: "u".into(),
            cooldown: Duration::from_secs(900),
        });
        log_event(&WorkerEvent::ActorRunFinished {
            actor: "a".into(),
            run_id: "r".into(),
            outcome: "failed".into(),
            polls: 3,
        });
    }
}
