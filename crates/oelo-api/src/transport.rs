// Transport seam between the sync engine and a physical controller.
//
// The HTTP client and the in-memory mock both implement
// `ControllerTransport`; everything above this crate only sees the trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;
use crate::models::{PatternCommand, ZoneStatus};

/// Shared configuration for building the controller's HTTP client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound on every single request, connect included.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .user_agent(concat!("oelo/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Client(e.to_string()))
    }
}

/// One stateless round trip to a controller.
///
/// Implementations issue exactly one request per call and never retry;
/// retry policy belongs to the caller.
#[async_trait]
pub trait ControllerTransport: Send + Sync {
    /// Fetch the status of every zone in a single request.
    async fn query_status(&self) -> Result<Vec<ZoneStatus>, Error>;

    /// Write a pattern to one zone. The acknowledgement is not authoritative.
    async fn send_command(&self, command: &PatternCommand) -> Result<(), Error>;
}
