mod job;
pub use job::{AuthMode, Job, JobArguments, JobType};
