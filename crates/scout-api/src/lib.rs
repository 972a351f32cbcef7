mod error;
pub use error::ApiError;

mod handler;
pub use handler::{ApiHandler, WorkerIdentity};

mod adapter;
pub use adapter::WorkerApiAdapter;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpApi;

#[cfg(feature = "http")]
pub use axum;
