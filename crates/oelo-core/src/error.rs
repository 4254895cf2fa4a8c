// ── Core error types ──
//
// User-facing errors from oelo-core. Consumers never see reqwest errors or
// raw bodies: the `From<oelo_api::Error>` impl flattens transport failures
// into a kind plus message. Cloneable so one failure can be delivered to
// every waiter of a shared poll.

use oelo_api::ErrorKind;
use thiserror::Error;

use crate::model::ZoneId;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Controller errors ────────────────────────────────────────────
    #[error("Controller {kind} error: {message}")]
    Transport { kind: ErrorKind, message: String },

    #[error("Zone {zone} did not report the commanded state after {attempts} attempt(s)")]
    VerificationFailed { zone: ZoneId, attempts: u32 },

    // ── Effect errors ────────────────────────────────────────────────
    #[error("Cannot capture an effect from zone {zone}: {reason}")]
    Capture { zone: ZoneId, reason: String },

    #[error("Effect not found: {identifier}")]
    NotFound { identifier: String },

    #[error("Effect name '{name}' is ambiguous ({} matches)", matches.len())]
    Ambiguous { name: String, matches: Vec<String> },

    #[error("Another effect is already named '{name}'")]
    NameConflict { name: String },

    #[error("Effect store is full ({capacity} effects); delete one before capturing more")]
    StoreFull { capacity: usize },

    #[error("LED index {index} is outside a zone of {total} LEDs")]
    InvalidPlanMap { index: usize, total: usize },

    // ── Setup errors ─────────────────────────────────────────────────
    #[error("Zone {zone} is not configured on this controller")]
    UnknownZone { zone: u8 },

    #[error("Cannot persist effects to {path}: {message}")]
    Persistence { path: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Controller has been shut down")]
    ControllerStopped,
}

impl CoreError {
    /// Whether retrying the same operation later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::VerificationFailed { .. }
        )
    }

    pub(crate) fn persistence(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::Persistence {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<oelo_api::Error> for CoreError {
    fn from(err: oelo_api::Error) -> Self {
        match err {
            oelo_api::Error::InvalidUrl(e) => Self::Config {
                message: format!("Invalid controller URL: {e}"),
            },
            oelo_api::Error::Client(reason) => Self::Config {
                message: format!("Cannot build HTTP client: {reason}"),
            },
            other => Self::Transport {
                kind: other.kind(),
                message: other.to_string(),
            },
        }
    }
}
