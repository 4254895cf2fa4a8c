//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use oelo_api::ErrorKind;
use oelo_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the controller: {reason}")]
    #[diagnostic(
        code(oelo::connection_failed),
        help(
            "Check that the controller is powered and on the network.\n\
             Try: oelo --controller <ip> status"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Controller did not answer in time: {reason}")]
    #[diagnostic(
        code(oelo::timeout),
        help("Increase the timeout with --timeout or check controller responsiveness.")
    )]
    Timeout { reason: String },

    #[error("Controller rejected the request: {reason}")]
    #[diagnostic(code(oelo::controller_error))]
    ControllerError { reason: String },

    #[error("Zone {zone} did not show the new state after {attempts} attempt(s)")]
    #[diagnostic(
        code(oelo::verification_failed),
        help("The write may still land. Run: oelo status {zone}")
    )]
    VerificationFailed { zone: u8, attempts: u32 },

    // ── Effects ──────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(oelo::not_found),
        help("Run: oelo {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("More than one effect is named '{name}'")]
    #[diagnostic(
        code(oelo::ambiguous),
        help("Use one of these ids instead: {matches}")
    )]
    Ambiguous { name: String, matches: String },

    #[error("{resource_type} '{identifier}' already exists")]
    #[diagnostic(code(oelo::conflict))]
    Conflict {
        resource_type: String,
        identifier: String,
    },

    #[error("The effect library is full ({capacity} effects)")]
    #[diagnostic(
        code(oelo::store_full),
        help("Delete an effect first: oelo effects delete <id>")
    )]
    StoreFull { capacity: usize },

    #[error("Cannot capture zone {zone}: {reason}")]
    #[diagnostic(
        code(oelo::capture_failed),
        help("Capture only works while the zone is showing a pattern.")
    )]
    Capture { zone: u8, reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(oelo::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(oelo::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No controller configured")]
    #[diagnostic(
        code(oelo::no_config),
        help(
            "Pass --controller <ip>, set OELO_CONTROLLER, or add a profile to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(oelo::config))]
    Config(#[from] oelo_config::ConfigError),

    #[error("{message}")]
    #[diagnostic(code(oelo::internal))]
    Internal { message: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::ControllerError { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Ambiguous { .. } | Self::Conflict { .. } | Self::StoreFull { .. } => {
                exit_code::CONFLICT
            }
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Transport { kind, message } => match kind {
                ErrorKind::Connect => CliError::ConnectionFailed { reason: message },
                ErrorKind::Timeout => CliError::Timeout { reason: message },
                ErrorKind::BadResponse | ErrorKind::Http | ErrorKind::Other => {
                    CliError::ControllerError { reason: message }
                }
            },

            CoreError::VerificationFailed { zone, attempts } => CliError::VerificationFailed {
                zone: zone.get(),
                attempts,
            },

            CoreError::Capture { zone, reason } => CliError::Capture {
                zone: zone.get(),
                reason,
            },

            CoreError::NotFound { identifier } => CliError::NotFound {
                resource_type: "effect".into(),
                identifier,
                list_command: "effects list".into(),
            },

            CoreError::Ambiguous { name, matches } => CliError::Ambiguous {
                name,
                matches: matches.join(", "),
            },

            CoreError::NameConflict { name } => CliError::Conflict {
                resource_type: "effect name".into(),
                identifier: name,
            },

            CoreError::StoreFull { capacity } => CliError::StoreFull { capacity },

            CoreError::UnknownZone { zone } => CliError::NotFound {
                resource_type: "zone".into(),
                identifier: zone.to_string(),
                list_command: "status".into(),
            },

            CoreError::InvalidPlanMap { .. } | CoreError::Config { .. } => {
                CliError::Validation {
                    field: "configuration".into(),
                    reason: err.to_string(),
                }
            }

            CoreError::Persistence { .. } | CoreError::ControllerStopped => CliError::Internal {
                message: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oelo_core::ZoneId;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let timeout = CliError::from(CoreError::Transport {
            kind: ErrorKind::Timeout,
            message: "Request timed out after 10s".into(),
        });
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let missing = CliError::from(CoreError::NotFound {
            identifier: "Party".into(),
        });
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let full = CliError::from(CoreError::StoreFull { capacity: 200 });
        assert_eq!(full.exit_code(), exit_code::CONFLICT);

        let Ok(zone) = ZoneId::new(2) else {
            panic!("zone 2 is valid");
        };
        let capture = CliError::from(CoreError::Capture {
            zone,
            reason: "zone is off".into(),
        });
        assert_eq!(capture.exit_code(), exit_code::GENERAL);
        assert!(capture.to_string().contains("zone 2"));
    }
}
