//! Job execution for the scout worker: actor platform protocol, direct
//! clients, key classification and the strategies that tie them to the
//! credential pool.

mod error;
pub use error::{ExecError, ExecResult};

pub mod actor;
#[cfg(feature = "apify")]
pub use actor::ApifyClient;
pub use actor::{ActorConfig, ActorPlatform, ActorRoute, ActorRoutes, ActorRunner, QueryInput};

pub mod classify;
pub use classify::{HttpKeyClassifier, KeyClassifier, classify_keys};

pub mod direct;
#[cfg(feature = "rest")]
pub use direct::RestClient;
pub use direct::{DirectAuth, DirectClient};

pub mod strategy;
pub use strategy::{
    ActorStrategy, BestAvailableStrategy, CredentialStrategy, ExecContext, KeyStrategy, Strategy,
    StrategyRouter, TelemetryStrategy,
};

mod checks;
pub use checks::register_checks;

#[cfg(test)]
mod testing;
