// Controller HTTP client
//
// Wraps `reqwest::Client` with the controller's two endpoints. The device
// speaks plain HTTP without authentication; every request carries the
// configured timeout and failures are classified into `Error` variants.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Error;
use crate::models::{PatternCommand, ZoneStatus, parse_status_body};
use crate::transport::{ControllerTransport, TransportConfig};

/// Substring the firmware echoes back after a `/setPattern` request.
const COMMAND_ACK: &str = "Command Received";

/// Raw HTTP client for a single Oelo controller.
pub struct ControllerClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl ControllerClient {
    /// Create a client for the controller at `base_url`
    /// (e.g. `http://192.168.1.100`).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, transport.timeout))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            http,
            base_url,
            timeout,
        }
    }

    /// Parse `raw` into a controller URL, accepting a bare host or IP.
    pub fn parse_url(raw: &str) -> Result<Url, Error> {
        let raw = raw.trim();
        if raw.contains("://") {
            Ok(Url::parse(raw)?)
        } else {
            Ok(Url::parse(&format!("http://{raw}"))?)
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_text(&self, url: Url) -> Result<String, Error> {
        debug!(%url, "GET");
        let resp = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout))?;

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }
        trace!(bytes = body.len(), "response body received");
        Ok(body)
    }
}

#[async_trait]
impl ControllerTransport for ControllerClient {
    async fn query_status(&self) -> Result<Vec<ZoneStatus>, Error> {
        let url = self.endpoint("getController")?;
        let body = self.get_text(url).await?;
        let zones = parse_status_body(&body)?;
        debug!(zones = zones.len(), "status received");
        Ok(zones)
    }

    async fn send_command(&self, command: &PatternCommand) -> Result<(), Error> {
        // The firmware expects literal commas in `colors`, so the query is
        // assembled by hand instead of form-encoded.
        let mut url = self.endpoint("setPattern")?;
        let query = command
            .query_pairs()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));

        let body = self.get_text(url).await?;
        if !body.contains(COMMAND_ACK) {
            warn!(
                zone = command.zone,
                body = %body.chars().take(128).collect::<String>(),
                "controller did not acknowledge command"
            );
        }
        Ok(())
    }
}
