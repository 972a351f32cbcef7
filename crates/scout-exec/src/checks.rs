//! Verifier checks for every capability a detector can advertise.

use std::{future::Ready, sync::Arc};

use scout_core::{ActorProbe, CapabilityDetector, CheckResult, CredentialPool, Verifier};
use scout_model::{AuthMode, JobType, split_capability_key};
use tracing::{debug, warn};

use crate::{direct::DirectClient, strategy::key_usable};

fn verdict(ok: bool, reason: &'static str) -> Ready<CheckResult> {
    std::future::ready(if ok { Ok(true) } else { Err(reason.into()) })
}

/// Register one check per capability key; returns how many were registered.
///
/// Account and key capabilities are healthy while the pool holds a
/// credential that `client` can actually authenticate with. Actor
/// capabilities re-probe platform access. Actor keys are skipped without a
/// probe, which leaves them to the verifier's missing-check policy.
pub fn register_checks(
    verifier: &Verifier,
    detector: &CapabilityDetector,
    pool: Arc<CredentialPool>,
    client: Arc<dyn DirectClient>,
    probe: Option<Arc<dyn ActorProbe>>,
) -> usize {
    let catalog = detector.catalog();
    let mut registered = 0;

    for key in detector.possible_capabilities().keys() {
        let Some((job_type, capability)) = split_capability_key(&key) else {
            continue;
        };
        let Ok(job_type) = job_type.parse::<JobType>() else {
            warn!(capability = %key, "capability under unknown job type; no check registered");
            continue;
        };
        let capability = capability.to_string();
        let via_account = catalog.credential.contains(&capability);
        let via_key = catalog.key_basic.contains(&capability) || catalog.key_elevated.contains(&capability);

        match job_type.auth_mode() {
            AuthMode::None => verifier.register_fn(key.as_str(), |_ctx| verdict(true, "")),
            AuthMode::Credential => {
                let pool = pool.clone();
                let client = client.clone();
                verifier.register_fn(key.as_str(), move |_ctx| {
                    let ok = client.supports_accounts() && pool.available_accounts() > 0;
                    verdict(ok, "no usable account out of cooldown")
                });
            }
            AuthMode::Key => {
                let pool = pool.clone();
                let client = client.clone();
                verifier.register_fn(key.as_str(), move |_ctx| {
                    verdict(
                        pool.has_key_matching(|k| key_usable(client.as_ref(), &capability, k)),
                        "no usable api key of the required tier",
                    )
                });
            }
            AuthMode::BestAvailable => {
                let pool = pool.clone();
                let client = client.clone();
                verifier.register_fn(key.as_str(), move |_ctx| {
                    let account =
                        via_account && client.supports_accounts() && pool.available_accounts() > 0;
                    let key = via_key
                        && pool.has_key_matching(|k| key_usable(client.as_ref(), &capability, k));
                    verdict(account || key, "no account or api key can serve this capability")
                });
            }
            AuthMode::Actor => {
                let Some(probe) = probe.clone() else {
                    continue;
                };
                let Some(gate) = catalog
                    .actors
                    .iter()
                    .find(|g| g.job_type == job_type && g.capabilities.contains(&capability))
                else {
                    continue;
                };
                let actor = gate.actor_id.clone();
                let input = gate.sample_input.clone();
                verifier.register_fn(key.as_str(), move |_ctx| {
                    let probe = probe.clone();
                    let actor = actor.clone();
                    let input = input.clone();
                    async move { probe.probe_access(&actor, &input).await }
                });
            }
        }
        registered += 1;
    }

    debug!(registered, "capability checks registered");
    registered
}
