mod credential;
pub use credential::Credential;

mod api_key;
pub use api_key::{ApiKey, KeyTier};

mod capability;
pub use capability::{CapabilityStatus, WorkerCapabilities, capability_key, split_capability_key};

mod cursor;
pub use cursor::{Cursor, decode_cursor, encode_cursor};

mod run;
pub use run::{RunHandle, RunStatus};

mod job_result;
pub use job_result::JobResult;

/// Name of a capability tag advertised under a job type (e.g. `"searchbyquery"`).
pub type Capability = String;

/// Health-tracked capability key, `"<job-type>/<capability>"`.
pub type CapabilityKey = String;
