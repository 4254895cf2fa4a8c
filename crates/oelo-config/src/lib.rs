//! Shared configuration for Oelo tools.
//!
//! TOML profiles (one per physical controller), merged with `OELO_`
//! environment overrides, and translation to `oelo_core::ControllerConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use oelo_api::ControllerClient;
use oelo_core::{ControllerConfig, SpotlightPlanMap, ZoneConfig, ZoneId};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    NoProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl ToString) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.to_string(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named controller profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Pick `requested`, else the configured default profile.
    pub fn profile(&self, requested: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name.to_owned(), p))
            .ok_or_else(|| ConfigError::NoProfile {
                profile: name.into(),
            })
    }

    pub fn controller_config(&self, requested: Option<&str>) -> Result<ControllerConfig, ConfigError> {
        let (name, profile) = self.profile(requested)?;
        profile_to_controller_config(profile, &name, &self.defaults)
    }
}

/// Values every profile inherits unless it overrides them.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Defaults {
    pub output: String,
    pub color: String,
    /// Per-request timeout, seconds.
    pub timeout: u64,
    /// Seconds between background polls.
    pub poll_interval: u64,
    pub auto_poll: bool,
    pub failure_threshold: u32,
    pub debounce_ms: u64,
    pub verify_commands: bool,
    pub verification_retries: u32,
    /// Seconds to wait before each verification read.
    pub verification_delay: u64,
    pub verification_timeout: u64,
    pub max_leds: usize,
    /// Comma-separated 1-based LED numbers for spotlight plans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spotlight_lights: Option<String>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: "table".into(),
            color: "auto".into(),
            timeout: 10,
            poll_interval: 300,
            auto_poll: true,
            failure_threshold: 3,
            debounce_ms: 1000,
            verify_commands: false,
            verification_retries: 3,
            verification_delay: 2,
            verification_timeout: 30,
            max_leds: oelo_core::spotlight::DEFAULT_MAX_LEDS,
            spotlight_lights: None,
        }
    }
}

/// A named controller profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Controller address, a URL or a bare host (e.g. "192.168.1.100").
    pub controller: String,

    /// Zones to manage; all six when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<u8>>,

    /// Where captured effects are kept. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_commands: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_leds: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotlight_lights: Option<String>,

    /// Per-zone hardware overrides, keyed by zone number.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub zone: HashMap<String, ZoneOverride>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ZoneOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_leds: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotlight_lights: Option<String>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "oelo", "oelo")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("oelo");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default effect store location for `profile_name`.
pub fn default_effects_path(profile_name: &str) -> PathBuf {
    let file = format!("{profile_name}.json");
    project_dirs().map_or_else(
        || dirs_fallback().join("effects").join(&file),
        |dirs| dirs.data_dir().join("effects").join(&file),
    )
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
///
/// Environment keys nest with a double underscore:
/// `OELO_DEFAULTS__TIMEOUT=5`, `OELO_PROFILES__HOME__CONTROLLER=10.0.0.9`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("OELO_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ControllerConfig` from a profile layered over `defaults`.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ControllerConfig, ConfigError> {
    let url = ControllerClient::parse_url(&profile.controller)
        .map_err(|e| invalid("controller", e))?;

    let zone_ids = match &profile.zones {
        Some(zones) => zones
            .iter()
            .map(|&n| ZoneId::new(n).map_err(|e| invalid("zones", e)))
            .collect::<Result<Vec<_>, _>>()?,
        None => ZoneId::all().collect(),
    };

    for key in profile.zone.keys() {
        let known = key
            .parse::<ZoneId>()
            .is_ok_and(|id| zone_ids.contains(&id));
        if !known {
            return Err(invalid(
                format!("zone.{key}"),
                "override for a zone this profile does not manage",
            ));
        }
    }

    let zones = zone_ids
        .into_iter()
        .map(|id| zone_config(id, profile, defaults))
        .collect::<Result<Vec<_>, _>>()?;

    let config = ControllerConfig {
        url,
        zones,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        poll_interval: Duration::from_secs(profile.poll_interval.unwrap_or(defaults.poll_interval)),
        auto_poll: defaults.auto_poll,
        failure_threshold: defaults.failure_threshold,
        debounce: Duration::from_millis(profile.debounce_ms.unwrap_or(defaults.debounce_ms)),
        verify_commands: profile.verify_commands.unwrap_or(defaults.verify_commands),
        verification_retries: profile
            .verification_retries
            .unwrap_or(defaults.verification_retries),
        verification_delay: Duration::from_secs(defaults.verification_delay),
        verification_timeout: Duration::from_secs(defaults.verification_timeout),
        effects_path: Some(
            profile
                .effects_file
                .clone()
                .unwrap_or_else(|| default_effects_path(profile_name)),
        ),
    };
    config.validate().map_err(|e| invalid("profile", e))?;
    Ok(config)
}

fn zone_config(id: ZoneId, profile: &Profile, defaults: &Defaults) -> Result<ZoneConfig, ConfigError> {
    let overrides = profile.zone.get(&id.to_string());
    let led_count = overrides
        .and_then(|z| z.max_leds)
        .or(profile.max_leds)
        .unwrap_or(defaults.max_leds);
    let lights = overrides
        .and_then(|z| z.spotlight_lights.as_deref())
        .or(profile.spotlight_lights.as_deref())
        .or(defaults.spotlight_lights.as_deref());

    let spotlight = match lights {
        Some(raw) => SpotlightPlanMap::parse(raw, led_count)
            .map_err(|e| invalid(format!("zone {id} spotlight_lights"), e))?,
        None => SpotlightPlanMap::default_for(led_count),
    };
    Ok(ZoneConfig {
        id,
        led_count,
        spotlight,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn load(toml: &str) -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml).unwrap();
        load_config_from(&path).unwrap()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.timeout, 10);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profile_overrides_layer_over_defaults() {
        let cfg = load(
            r#"
            default_profile = "porch"

            [defaults]
            debounce_ms = 250
            max_leds = 300

            [profiles.porch]
            controller = "192.168.4.20"
            zones = [1, 3]
            verify_commands = true
            effects_file = "/tmp/porch-effects.json"

            [profiles.porch.zone.3]
            max_leds = 60
            spotlight_lights = "5,1,3,3"
            "#,
        );

        let controller = cfg.controller_config(None).unwrap();
        assert_eq!(controller.url.as_str(), "http://192.168.4.20/");
        assert_eq!(controller.debounce, Duration::from_millis(250));
        assert!(controller.verify_commands);
        assert_eq!(
            controller.effects_path.as_deref(),
            Some(Path::new("/tmp/porch-effects.json"))
        );

        let ids: Vec<u8> = controller.zones.iter().map(|z| z.id.get()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(controller.zones[0].led_count, 300);
        assert_eq!(controller.zones[1].led_count, 60);
        assert_eq!(controller.zones[1].spotlight.indices(), &[0, 2, 4]);
    }

    #[test]
    fn unknown_profile_is_reported() {
        let cfg = load("[profiles.home]\ncontroller = \"10.0.0.2\"\n");
        assert!(matches!(
            cfg.controller_config(Some("garage")),
            Err(ConfigError::NoProfile { .. })
        ));
        assert!(cfg.controller_config(Some("home")).is_ok());
    }

    #[test]
    fn spotlight_beyond_zone_is_rejected() {
        let cfg = load(
            r#"
            [profiles.default]
            controller = "10.0.0.2"
            max_leds = 10
            spotlight_lights = "1,11"
            "#,
        );
        let err = cfg.controller_config(None).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn bad_zone_numbers_are_rejected() {
        let cfg = load(
            r#"
            [profiles.default]
            controller = "10.0.0.2"
            zones = [1, 9]
            "#,
        );
        assert!(cfg.controller_config(None).is_err());

        let cfg = load(
            r#"
            [profiles.default]
            controller = "10.0.0.2"
            zones = [1]

            [profiles.default.zone.2]
            max_leds = 5
            "#,
        );
        assert!(cfg.controller_config(None).is_err());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                controller: "http://10.1.1.1".into(),
                zones: Some(vec![2]),
                ..Profile::default()
            },
        );

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        let (name, profile) = loaded.profile(None).unwrap();
        assert_eq!(name, "default");
        assert_eq!(profile.controller, "http://10.1.1.1");
        assert_eq!(profile.zones, Some(vec![2]));
    }
}
