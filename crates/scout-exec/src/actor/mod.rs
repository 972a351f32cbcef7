//! Actor execution protocol: submit a run, poll it to a terminal status,
//! then fetch one page of its dataset.

#[cfg(feature = "apify")]
mod client;
#[cfg(feature = "apify")]
pub use client::{ApifyClient, DEFAULT_BASE_URL};

mod routes;
pub use routes::{ActorRoute, ActorRoutes, QueryInput};

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use scout_core::{ActorProbe, EventBus, Page, WorkerEvent};
use scout_model::{Cursor, RunHandle, RunStatus};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::error::{ExecError, ExecResult};

/// Operations the protocol needs from an actor platform.
#[async_trait]
pub trait ActorPlatform: Send + Sync + 'static {
    async fn start_run(&self, actor_id: &str, input: &Value) -> ExecResult<RunHandle>;

    async fn run_status(&self, run_id: &str) -> ExecResult<RunStatus>;

    async fn dataset_items(&self, dataset_id: &str, offset: u64, limit: usize) -> ExecResult<Vec<Value>>;

    /// Whether the caller may run `actor_id`, without starting a run.
    async fn probe_access(&self, actor_id: &str, sample_input: &Value) -> ExecResult<bool>;
}

#[derive(Debug, Clone)]
pub struct ActorConfig {
    pub poll_interval: Duration,
    /// Poll budget; with the default interval this is a five minute ceiling.
    pub max_polls: u32,
    /// Most items one run is asked for. Larger jobs take several runs.
    pub page_size: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_polls: 60,
            page_size: 1000,
        }
    }
}

impl ActorConfig {
    pub fn validate(&self) -> ExecResult<()> {
        if self.poll_interval.is_zero() {
            return Err(ExecError::InvalidConfig("poll_interval must be positive".into()));
        }
        if self.max_polls == 0 {
            return Err(ExecError::InvalidConfig("max_polls must be at least 1".into()));
        }
        if self.page_size == 0 {
            return Err(ExecError::InvalidConfig("page_size must be positive".into()));
        }
        Ok(())
    }
}

/// Drives runs on an [`ActorPlatform`].
pub struct ActorRunner {
    platform: Arc<dyn ActorPlatform>,
    config: ActorConfig,
    events: EventBus,
}

impl ActorRunner {
    pub fn new(platform: Arc<dyn ActorPlatform>, config: ActorConfig) -> Self {
        Self {
            platform,
            config,
            events: EventBus::default(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Items one run should fetch when `wanted` are still missing.
    pub fn page_limit(&self, wanted: usize) -> usize {
        wanted.min(self.config.page_size)
    }

    /// Run `actor_id` with `input` and return the page at `cursor`.
    ///
    /// `input` should already ask the actor for at least `offset + limit`
    /// items. The returned cursor is set only when the page came back full,
    /// so an exhausted dataset may cost one extra empty fetch.
    #[instrument(level = "debug", skip(self, ctx, input), fields(actor = actor_id))]
    pub async fn run<T>(
        &self,
        ctx: &CancellationToken,
        actor_id: &str,
        input: &Value,
        cursor: &Cursor,
        limit: usize,
    ) -> ExecResult<Page<T>>
    where
        T: DeserializeOwned,
    {
        if limit == 0 {
            return Err(ExecError::InvalidArguments("page limit must be positive".into()));
        }
        let offset = cursor.offset();

        let handle = self.platform.start_run(actor_id, input).await?;
        debug!(run_id = %handle.run_id, dataset_id = %handle.dataset_id, "actor run submitted");

        let (outcome, polls) = self.wait(ctx, &handle).await;
        self.events.publish(WorkerEvent::ActorRunFinished {
            actor: actor_id.to_string(),
            run_id: handle.run_id.clone(),
            outcome: outcome_label(&outcome),
            polls,
        });

        match outcome? {
            RunStatus::Succeeded => {}
            status => {
                return Err(ExecError::PlatformTerminal {
                    run_id: handle.run_id,
                    status,
                });
            }
        }

        let mut raw = self
            .platform
            .dataset_items(&handle.dataset_id, offset, limit)
            .await?;
        let full = raw.len() >= limit;
        if raw.len() > limit {
            trace!(run_id = %handle.run_id, returned = raw.len(), limit, "platform over-filled the page; truncating");
            raw.truncate(limit);
        }
        let fetched = raw.len() as u64;

        let items: Vec<T> = raw
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| match serde_json::from_value(item) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(run_id = %handle.run_id, index = offset + i as u64, error = %e, "dropping malformed dataset item");
                    None
                }
            })
            .collect();

        let next_cursor = if full {
            Cursor::from_offset(offset + fetched)
        } else {
            Cursor::default()
        };
        debug!(run_id = %handle.run_id, items = items.len(), more = full, "dataset page fetched");
        Ok(Page::new(items, next_cursor))
    }

    /// Poll until terminal, cancelled or out of budget. Returns the polls spent.
    async fn wait(&self, ctx: &CancellationToken, handle: &RunHandle) -> (ExecResult<RunStatus>, u32) {
        let mut polls = 0;
        while polls < self.config.max_polls {
            polls += 1;
            let status = match self.platform.run_status(&handle.run_id).await {
                Ok(status) => status,
                Err(e) => return (Err(e), polls),
            };
            if status.is_terminal() {
                return (Ok(status), polls);
            }
            trace!(run_id = %handle.run_id, status = status.as_str(), polls, "actor run pending");
            if polls == self.config.max_polls {
                break;
            }

            tokio::select! {
                _ = ctx.cancelled() => return (Err(ExecError::Cancelled), polls),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
        (
            Err(ExecError::PollTimeout {
                run_id: handle.run_id.clone(),
                polls,
            }),
            polls,
        )
    }
}

fn outcome_label(outcome: &ExecResult<RunStatus>) -> String {
    match outcome {
        Ok(status) => status.as_str().to_ascii_lowercase(),
        Err(ExecError::PollTimeout { .. }) => "poll-timeout".into(),
        Err(ExecError::Cancelled) => "cancelled".into(),
        Err(_) => "error".into(),
    }
}

#[async_trait]
impl ActorProbe for ActorRunner {
    async fn probe_access(
        &self,
        actor_id: &str,
        sample_input: &Value,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.platform.probe_access(actor_id, sample_input).await?)
    }
}


#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::fake::FakePlatform;
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Post {
        id: u32,
    }

    fn posts(n: u32) -> Vec<Value> {
        (0..n).map(|id| json!({ "id": id })).collect()
    }

    fn runner(platform: Arc<FakePlatform>) -> ActorRunner {
        ActorRunner::new(platform, ActorConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn succeeded_run_returns_page_and_cursor() {
        let platform = Arc::new(FakePlatform::new(
            &[RunStatus::Ready, RunStatus::Running, RunStatus::Succeeded],
            posts(25),
        ));
        let r = runner(platform.clone());
        let ctx = CancellationToken::new();

        let page: Page<Post> = r.run(&ctx, "acme/scraper", &json!({}), &Cursor::start(), 10).await.unwrap();
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.next_cursor.offset(), 10);
        assert_eq!(*platform.status_calls.lock(), 3);

        let page: Page<Post> = r.run(&ctx, "acme/scraper", &json!({}), &Cursor::from_offset(20), 10).await.unwrap();
        assert_eq!(page.items, (20..25).map(|id| Post { id }).collect::<Vec<_>>());
        assert!(page.next_cursor.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_items_are_dropped() {
        let mut items = posts(3);
        items.insert(1, json!({ "id": "not-a-number" }));
        let platform = Arc::new(FakePlatform::new(&[RunStatus::Succeeded], items));

        let page: Page<Post> = runner(platform)
            .run(&CancellationToken::new(), "a", &json!({}), &Cursor::start(), 4)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 3);
        // cursor follows raw item count, not parsed count
        assert_eq!(page.next_cursor.offset(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn platform_failure_is_terminal() {
        for status in [RunStatus::Failed, RunStatus::Aborted, RunStatus::TimedOut] {
            let platform = Arc::new(FakePlatform::new(&[status], posts(1)));
            let err = runner(platform)
                .run::<Post>(&CancellationToken::new(), "a", &json!({}), &Cursor::start(), 1)
                .await
                .unwrap_err();
            assert!(matches!(err, ExecError::PlatformTerminal { status: s, .. } if s == status));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_budget_yields_timeout() {
        let platform = Arc::new(FakePlatform::new(&[RunStatus::Running], Vec::new()));
        let started = tokio::time::Instant::now();

        let err = runner(platform.clone())
            .run::<Post>(&CancellationToken::new(), "a", &json!({}), &Cursor::start(), 1)
            .await
            .unwrap_err();

        assert!(matches!(err, ExecError::PollTimeout { polls: 60, .. }));
        assert_eq!(*platform.status_calls.lock(), 60);
        assert!(started.elapsed() <= Duration::from_secs(5 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling() {
        let platform = Arc::new(FakePlatform::new(&[RunStatus::Running], Vec::new()));
        let ctx = CancellationToken::new();
        let cancel = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            cancel.cancel();
        });

        let err = runner(platform.clone())
            .run::<Post>(&ctx, "a", &json!({}), &Cursor::start(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Cancelled));
        assert_eq!(*platform.status_calls.lock(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_runs_are_published() {
        use scout_core::{Subscribe, WorkerEvent};

        #[derive(Default)]
        struct Outcomes(parking_lot::Mutex<Vec<String>>);
        #[async_trait]
        impl Subscribe for Outcomes {
            async fn on_event(&self, event: &WorkerEvent) {
                if let WorkerEvent::ActorRunFinished { outcome, .. } = event {
                    self.0.lock().push(outcome.clone());
                }
            }
            fn name(&self) -> &'static str {
                "outcomes"
            }
        }

        let outcomes = Arc::new(Outcomes::default());
        let bus = EventBus::new(vec![outcomes.clone() as Arc<dyn Subscribe>]);
        let platform = Arc::new(FakePlatform::new(&[RunStatus::Succeeded], posts(1)));
        let r = runner(platform).with_events(bus);

        r.run::<Post>(&CancellationToken::new(), "a", &json!({}), &Cursor::start(), 5)
            .await
            .unwrap();
        // let the delivery task drain its queue
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*outcomes.0.lock(), vec!["succeeded".to_string()]);
    }

    #[tokio::test]
    async fn overfilled_page_is_truncated_and_keeps_paging() {
        let mut platform = FakePlatform::new(&[RunStatus::Succeeded], posts(20));
        platform.overfill = 3;
        let r = runner(Arc::new(platform));

        let page: Page<Post> = r
            .run(&CancellationToken::new(), "a", &json!({}), &Cursor::start(), 5)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.items.last(), Some(&Post { id: 4 }));
        assert_eq!(page.next_cursor.offset(), 5);
    }

    #[test]
    fn config_rejects_zero_budget_or_interval() {
        assert!(ActorConfig::default().validate().is_ok());

        let no_polls = ActorConfig {
            max_polls: 0,
            ..Default::default()
        };
        assert!(matches!(no_polls.validate(), Err(ExecError::InvalidConfig(_))));

        let hot_loop = ActorConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(hot_loop.validate(), Err(ExecError::InvalidConfig(_))));

        let no_pages = ActorConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(matches!(no_pages.validate(), Err(ExecError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn runner_probes_through_platform() {
        let mut platform = FakePlatform::new(&[], Vec::new());
        platform.accessible = false;
        let r = runner(Arc::new(platform));
        assert!(!r.probe_access("a", &json!({})).await.unwrap());
    }
}
