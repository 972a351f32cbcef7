use reqwest::StatusCode;
use scout_model::RunStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    /// No account or key could be selected.
    #[error("no usable {0} available")]
    Exhausted(&'static str),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The platform finished the run badly; retrying the same input won't help.
    #[error("actor run {run_id} ended with status {}", .status.as_str())]
    PlatformTerminal { run_id: String, status: RunStatus },

    /// The run never reached a terminal status within the poll budget.
    #[error("actor run {run_id} still unfinished after {polls} polls")]
    PollTimeout { run_id: String, polls: u32 },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cancelled")]
    Cancelled,
}

pub type ExecResult<T> = Result<T, ExecError>;

const RATE_LIMIT_MARKERS: [&str; 3] = ["rate limit", "too many requests", "429"];

impl ExecError {
    /// Whether the error means the backend is throttling the caller.
    ///
    /// Strategies use this as the only signal to cool an account down.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            ExecError::RateLimited(_) => true,
            ExecError::Transport(msg) => {
                let msg = msg.to_ascii_lowercase();
                RATE_LIMIT_MARKERS.iter().any(|m| msg.contains(m))
            }
            _ => false,
        }
    }

    /// Whether the error says the execution path itself is unusable right
    /// now, as opposed to the particular job or input being bad.
    pub fn indicts_path(&self) -> bool {
        self.is_rate_limited()
            || matches!(
                self,
                ExecError::Exhausted(_) | ExecError::Unauthorized(_) | ExecError::Unsupported(_)
            )
    }

    /// Map a non-success HTTP response to an error.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let body = truncate(body, 256);
        match status {
            StatusCode::TOO_MANY_REQUESTS => ExecError::RateLimited(format!("{status}: {body}")),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ExecError::Unauthorized(format!("{status}: {body}"))
            }
            _ => ExecError::Transport(format!("unexpected status {status}: {body}")),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

impl From<reqwest::Error> for ExecError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(StatusCode::TOO_MANY_REQUESTS) => ExecError::RateLimited(e.to_string()),
            _ if e.is_decode() => ExecError::Decode(e.to_string()),
            _ => ExecError::Transport(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ExecError {
    fn from(e: serde_json::Error) -> Self {
        ExecError::Decode(e.to_string())
    }
}
