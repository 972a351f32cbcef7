//! Plain data model shared by the scout worker crates.
//!
//! Nothing in here performs I/O or holds locks: pools, trackers and
//! protocols live in `scout-core` and `scout-exec` and pass these values
//! around by clone.

mod error;
pub use error::ModelError;

mod domain;
pub use domain::*;

mod kind;
pub use kind::*;
