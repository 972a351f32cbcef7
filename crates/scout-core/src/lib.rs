pub mod error;
pub use error::CoreError;

pub mod config;
pub use config::{HealthConfig, PoolConfig, RetryConfig};

pub mod events;
pub use events::{EventBus, EventKind, Subscribe, WorkerEvent};

pub mod pool;
pub use pool::CredentialPool;

pub mod health;
pub use health::{HealthTracker, Reconciler};

pub mod verify;
pub use verify::{Check, CheckResult, FnCheck, Verifier};

pub mod detect;
pub use detect::{ActorGate, ActorProbe, CapabilityCatalog, CapabilityDetector, CapabilitySource};

pub mod retry;
pub use retry::{DEFAULT_BATCH_SIZE, Page, accumulate};

mod system;
pub use system::*;
