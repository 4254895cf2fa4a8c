// ── Runtime controller configuration ──
//
// Describes one physical controller: where it lives, which zones it
// exposes and how the sync engine paces itself. Core never reads config
// files; the CLI builds a `ControllerConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::CoreError;
use crate::model::ZoneId;
use crate::spotlight::{DEFAULT_MAX_LEDS, SpotlightPlanMap};

/// Default controller address on a fresh install.
pub const DEFAULT_URL: &str = "http://192.168.1.100";

/// Hard cap on captured effects per controller.
pub const MAX_EFFECTS: usize = 200;

/// Per-zone hardware layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneConfig {
    pub id: ZoneId,
    pub led_count: usize,
    /// Which LEDs the controller's 40 reported slots belong to.
    pub spotlight: SpotlightPlanMap,
}

impl ZoneConfig {
    pub fn new(id: ZoneId) -> Self {
        Self::with_leds(id, DEFAULT_MAX_LEDS)
    }

    pub fn with_leds(id: ZoneId, led_count: usize) -> Self {
        Self {
            id,
            led_count,
            spotlight: SpotlightPlanMap::default_for(led_count),
        }
    }
}

/// Configuration for a single controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Controller URL (e.g. `http://192.168.1.100`).
    pub url: Url,
    pub zones: Vec<ZoneConfig>,
    /// Bound on every single request.
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Run the periodic poll task. On-demand refresh works either way.
    pub auto_poll: bool,
    /// Consecutive failed polls before zones turn `unknown`; twice this
    /// many turns them `offline`.
    pub failure_threshold: u32,
    /// Quiet period before a zone's pending command is written.
    pub debounce: Duration,
    pub verify_commands: bool,
    pub verification_retries: u32,
    pub verification_delay: Duration,
    /// Bound on one whole verification phase, retries included.
    pub verification_timeout: Duration,
    /// Where captured effects are persisted. `None` keeps them in memory.
    pub effects_path: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_URL).expect("default controller URL is valid"),
            zones: ZoneId::all().map(ZoneConfig::new).collect(),
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(300),
            auto_poll: true,
            failure_threshold: 3,
            debounce: Duration::from_secs(1),
            verify_commands: false,
            verification_retries: 3,
            verification_delay: Duration::from_secs(2),
            verification_timeout: Duration::from_secs(30),
            effects_path: None,
        }
    }
}

impl ControllerConfig {
    pub fn zone(&self, zone: ZoneId) -> Option<&ZoneConfig> {
        self.zones.iter().find(|z| z.id == zone)
    }

    /// Reject layouts the engine cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.zones.is_empty() {
            return Err(CoreError::Config {
                message: "at least one zone must be configured".into(),
            });
        }
        for (i, zone) in self.zones.iter().enumerate() {
            if self.zones[..i].iter().any(|z| z.id == zone.id) {
                return Err(CoreError::Config {
                    message: format!("zone {} is configured twice", zone.id),
                });
            }
            if zone.led_count == 0 {
                return Err(CoreError::Config {
                    message: format!("zone {} has no LEDs", zone.id),
                });
            }
            zone.spotlight.validate(zone.led_count)?;
        }
        if self.failure_threshold == 0 {
            return Err(CoreError::Config {
                message: "failure_threshold must be at least 1".into(),
            });
        }
        Ok(())
    }
}
