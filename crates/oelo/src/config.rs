//! Profile resolution with CLI flag overrides.
//!
//! Core never sees these types -- it receives a pre-built `ControllerConfig`.

use std::time::Duration;

use oelo_api::ControllerClient;
use oelo_config::{Config, ConfigError, Profile};
use oelo_core::ControllerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// How long the process lives, which decides background behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Run one command and exit: no periodic polling, no debounce window.
    OneShot,
    /// Stay up and poll every `interval`.
    Watch { interval: Duration },
}

/// Profile name from `--profile`, else the config default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `ControllerConfig` from the config file, profile, and CLI overrides.
pub fn build_controller_config(global: &GlobalOpts, mode: Mode) -> Result<ControllerConfig, CliError> {
    let cfg = oelo_config::load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    let mut config = match cfg.profiles.get(&profile_name) {
        Some(profile) => to_core(profile, &profile_name, &cfg)?,
        None if global.profile.is_some() => {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => {
            // No profile: run from flags / env alone.
            let controller = global.controller.clone().ok_or_else(|| CliError::NoConfig {
                path: oelo_config::config_path().display().to_string(),
            })?;
            let profile = Profile {
                controller,
                ..Profile::default()
            };
            to_core(&profile, &profile_name, &cfg)?
        }
    };

    if let Some(raw) = &global.controller {
        config.url = ControllerClient::parse_url(raw).map_err(|e| CliError::Validation {
            field: "controller".into(),
            reason: e.to_string(),
        })?;
    }
    if let Some(secs) = global.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(path) = &global.effects_file {
        config.effects_path = Some(path.clone());
    }
    if global.verify {
        config.verify_commands = true;
    }

    match mode {
        Mode::OneShot => {
            config.auto_poll = false;
            config.debounce = Duration::ZERO;
        }
        Mode::Watch { interval } => {
            config.auto_poll = true;
            config.poll_interval = interval;
        }
    }
    Ok(config)
}

fn to_core(profile: &Profile, name: &str, cfg: &Config) -> Result<ControllerConfig, CliError> {
    oelo_config::profile_to_controller_config(profile, name, &cfg.defaults).map_err(|e| match e {
        ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
        other => CliError::Config(other),
    })
}
