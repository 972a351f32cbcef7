use async_trait::async_trait;
use scout_core::{Subscribe, WorkerEvent};

use crate::subscriber::view::log_event;

/// Writes worker events to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct Journal;

impl Journal {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for Journal {
    async fn on_event(&self, event: &WorkerEvent) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "journal"
    }

    fn queue_capacity(&self) -> usize {
        2048
    }
}
