use std::sync::Arc;

use scout_model::WorkerCapabilities;

use super::CapabilityDetector;

/// Where the advertised capability set comes from.
#[derive(Clone)]
pub enum CapabilitySource {
    /// Detected from held credentials and filtered by health.
    Live(Arc<CapabilityDetector>),
    /// Fixed set, used when detection is disabled and in tests.
    Static(WorkerCapabilities),
}

impl CapabilitySource {
    pub async fn worker_capabilities(&self) -> WorkerCapabilities {
        match self {
            CapabilitySource::Live(detector) => detector.current().await,
            CapabilitySource::Static(caps) => caps.clone(),
        }
    }
}

impl From<Arc<CapabilityDetector>> for CapabilitySource {
    fn from(detector: Arc<CapabilityDetector>) -> Self {
        CapabilitySource::Live(detector)
    }
}

impl From<WorkerCapabilities> for CapabilitySource {
    fn from(caps: WorkerCapabilities) -> Self {
        CapabilitySource::Static(caps)
    }
}
