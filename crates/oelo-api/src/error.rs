use thiserror::Error;

/// Top-level error type for the `oelo-api` crate.
///
/// Every failure a single controller round trip can produce. The transport
/// never retries on its own; callers use [`Error::is_transient`] to decide.
/// `oelo-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// TCP connect failed (host down, wrong IP, refused).
    #[error("Cannot connect to controller at {url}: {reason}")]
    Connect { url: String, reason: String },

    /// Request exceeded the configured timeout.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Any other HTTP transport error (DNS, protocol, body read).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The underlying HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    // ── Controller ──────────────────────────────────────────────────
    /// Non-success HTTP status from the controller.
    #[error("Controller returned HTTP {status}")]
    Http { status: u16, body: String },

    /// Status body is not an array of zone records, with the raw body for debugging.
    #[error("Malformed controller response: {message}")]
    BadResponse { message: String, body: String },
}

/// Coarse classification of an [`Error`], cheap to copy into logs and
/// cloneable error types further up the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connect,
    Timeout,
    BadResponse,
    Http,
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::BadResponse => "bad response",
            Self::Http => "http",
            Self::Other => "transport",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect { .. } => ErrorKind::Connect,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Transport(e) if e.is_timeout() => ErrorKind::Timeout,
            Self::Transport(e) if e.is_connect() => ErrorKind::Connect,
            Self::BadResponse { .. } => ErrorKind::BadResponse,
            Self::Http { .. } => ErrorKind::Http,
            Self::Transport(_) | Self::InvalidUrl(_) | Self::Client(_) => ErrorKind::Other,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } => true,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Classify a `reqwest` failure into the controller taxonomy.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                timeout_secs: timeout.as_secs(),
            }
        } else if err.is_connect() {
            Self::Connect {
                url: err
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
                reason: err.to_string(),
            }
        } else {
            Self::Transport(err)
        }
    }
}
