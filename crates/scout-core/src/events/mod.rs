//! Worker events and their fan-out to subscribers (logging, metrics).
//!
//! Producers publish after releasing their own locks, so a slow subscriber
//! never extends a critical section.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Something observable happened inside the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A status update was recorded for a capability.
    CapabilityChecked {
        capability: String,
        healthy: bool,
        error_count: u32,
        error: Option<String>,
    },
    /// A capability went from unhealthy to healthy.
    CapabilityRecovered { capability: String },
    /// A capability went from healthy (or unknown) to unhealthy.
    CapabilityDegraded {
        capability: String,
        error: Option<String>,
    },
    /// An account was rate-limited and taken out of rotation.
    CredentialCooledDown { username: String, cooldown: Duration },
    /// An actor run reached a terminal outcome.
    ActorRunFinished {
        actor: String,
        run_id: String,
        outcome: String,
        polls: u32,
    },
    /// A job finished, successfully or not.
    JobFinished {
        job_type: String,
        ok: bool,
        items: usize,
        elapsed: Duration,
    },
}

/// Discriminant of [`WorkerEvent`], handy for routing and message tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CapabilityChecked,
    CapabilityRecovered,
    CapabilityDegraded,
    CredentialCooledDown,
    ActorRunFinished,
    JobFinished,
}

impl WorkerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WorkerEvent::CapabilityChecked { .. } => EventKind::CapabilityChecked,
            WorkerEvent::CapabilityRecovered { .. } => EventKind::CapabilityRecovered,
            WorkerEvent::CapabilityDegraded { .. } => EventKind::CapabilityDegraded,
            WorkerEvent::CredentialCooledDown { .. } => EventKind::CredentialCooledDown,
            WorkerEvent::ActorRunFinished { .. } => EventKind::ActorRunFinished,
            WorkerEvent::JobFinished { .. } => EventKind::JobFinished,
        }
    }
}

/// Receiver of worker events.
///
/// Each subscriber is fed from its own bounded queue by a dedicated task, so
/// a slow subscriber never blocks the publisher. When the queue is full the
/// event is dropped for that subscriber only.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &WorkerEvent);

    fn name(&self) -> &'static str;

    fn queue_capacity(&self) -> usize {
        DEFAULT_QUEUE_CAPACITY
    }
}

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

struct Queue {
    name: &'static str,
    tx: mpsc::Sender<WorkerEvent>,
}

/// Cheaply clonable fan-out to a fixed set of subscribers.
///
/// Delivery tasks stop once every clone of the bus is dropped.
#[derive(Clone, Default)]
pub struct EventBus {
    queues: Arc<Vec<Queue>>,
}

impl EventBus {
    /// Start one delivery task per subscriber on the current runtime.
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let queues = subscribers
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let name = sub.name();
                tokio::spawn(deliver(sub, rx));
                Queue { name, tx }
            })
            .collect();
        Self {
            queues: Arc::new(queues),
        }
    }

    /// Enqueue `event` for every subscriber without waiting.
    pub fn publish(&self, event: WorkerEvent) {
        for queue in self.queues.iter() {
            match queue.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(ev)) => {
                    warn!(subscriber = queue.name, kind = ?ev.kind(), "event queue full; event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscriber = queue.name, "subscriber stopped; event dropped");
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

async fn deliver(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<WorkerEvent>) {
    while let Some(event) = rx.recv().await {
        sub.on_event(&event).await;
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.queues.iter().map(|q| q.name).collect();
        f.debug_struct("EventBus").field("subscribers", &names).finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use super::*;

    /// Subscriber that keeps every event it sees.
    #[derive(Default)]
    pub struct Recorder {
        pub events: Mutex<Vec<WorkerEvent>>,
        delivered: Notify,
    }

    impl Recorder {
        pub fn kinds(&self) -> Vec<EventKind> {
            self.events.lock().iter().map(WorkerEvent::kind).collect()
        }

        /// Wait until at least `n` events arrived (or one second passed),
        /// then return the kinds seen so far.
        pub async fn wait_for(&self, n: usize) -> Vec<EventKind> {
            let _ = tokio::time::timeout(Duration::from_secs(1), async {
                loop {
                    let notified = self.delivered.notified();
                    if self.events.lock().len() >= n {
                        return;
                    }
                    notified.await;
                }
            })
            .await;
            self.kinds()
        }
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &WorkerEvent) {
            self.events.lock().push(event.clone());
            self.delivered.notify_waiters();
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    pub fn recording_bus() -> (EventBus, Arc<Recorder>) {
        let rec = Arc::new(Recorder::default());
        let bus = EventBus::new(vec![rec.clone() as Arc<dyn Subscribe>]);
        (bus, rec)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::recording_bus;
    use super::*;

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let (bus, rec) = recording_bus();
        bus.publish(WorkerEvent::CapabilityRecovered {
            capability: "web/scraper".into(),
        });
        assert_eq!(rec.wait_for(1).await, vec![EventKind::CapabilityRecovered]);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn empty_bus_is_silent() {
        let bus = EventBus::default();
        assert!(bus.is_empty());
        bus.publish(WorkerEvent::JobFinished {
            job_type: "telemetry".into(),
            ok: true,
            items: 1,
            elapsed: Duration::ZERO,
        });
    }

    struct Stuck;

    #[async_trait]
    impl Subscribe for Stuck {
        async fn on_event(&self, _event: &WorkerEvent) {
            std::future::pending::<()>().await;
        }

        fn name(&self) -> &'static str {
            "stuck"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn stalled_subscriber_does_not_block_publishers() {
        let (rec_bus, rec) = recording_bus();
        drop(rec_bus);
        let bus = EventBus::new(vec![
            Arc::new(Stuck) as Arc<dyn Subscribe>,
            rec.clone() as Arc<dyn Subscribe>,
        ]);

        for i in 0..10 {
            bus.publish(WorkerEvent::CapabilityRecovered {
                capability: format!("c{i}"),
            });
        }
        assert_eq!(rec.wait_for(10).await.len(), 10);
    }
}
