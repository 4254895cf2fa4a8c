//! Clap derive structures for the `oelo` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use oelo_api::Rgb;
use oelo_core::Hsv;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// oelo -- drive Oelo lighting controllers from the command line
#[derive(Debug, Parser)]
#[command(
    name = "oelo",
    version,
    about = "Control Oelo multi-zone lighting from the command line",
    long_about = "Control Oelo multi-zone lighting from the command line.\n\n\
        Reads zone state, writes colors and captured effects, and manages\n\
        the effect library shared by every zone of a controller.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Controller profile to use
    #[arg(long, short = 'p', env = "OELO_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Controller address (overrides profile)
    #[arg(long, short = 'c', env = "OELO_CONTROLLER", global = true)]
    pub controller: Option<String>,

    /// Effect library file (overrides profile)
    #[arg(long, env = "OELO_EFFECTS_FILE", global = true)]
    pub effects_file: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "OELO_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Re-read the controller after each write and retry until it matches
    #[arg(long, global = true)]
    pub verify: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "OELO_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show zone state
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Change a zone's power, color, brightness or effect
    Set(SetArgs),

    /// Turn zones on with their last pattern
    On(ZonesArgs),

    /// Turn zones off
    Off(ZonesArgs),

    /// Manage the effect library
    #[command(alias = "fx")]
    Effects(EffectsArgs),

    /// Poll continuously and print zone changes
    Watch(WatchArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Zone commands ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Show a single zone
    pub zone: Option<u8>,
}

#[derive(Debug, Args)]
pub struct ZonesArgs {
    /// Zones to change (all configured zones when omitted)
    pub zones: Vec<u8>,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Zone number (1-6)
    pub zone: u8,

    /// Solid color as "r,g,b" or "#rrggbb"
    #[arg(long, value_parser = parse_rgb, conflicts_with = "hsv")]
    pub color: Option<Rgb>,

    /// Solid color as "hue,saturation,value" (0-360, 0-100, 0-100)
    #[arg(long, value_parser = parse_hsv)]
    pub hsv: Option<Hsv>,

    /// Brightness 0-255; 0 turns the zone off
    #[arg(long, short = 'b')]
    pub brightness: Option<u8>,

    /// Effect id or name
    #[arg(long, short = 'e')]
    pub effect: Option<String>,

    /// Effect name (same as --effect)
    #[arg(long, hide = true)]
    pub effect_name: Option<String>,

    /// Legacy spelling of --effect
    #[arg(long, hide = true)]
    pub pattern_id: Option<String>,

    /// Legacy spelling of --effect
    #[arg(long, hide = true)]
    pub pattern_name: Option<String>,

    /// Turn the zone off
    #[arg(long, conflicts_with_all = ["color", "hsv", "effect", "brightness"])]
    pub off: bool,
}

// ── Effects ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EffectsArgs {
    #[command(subcommand)]
    pub command: EffectsCommand,
}

#[derive(Debug, Subcommand)]
pub enum EffectsCommand {
    /// List captured effects
    #[command(alias = "ls")]
    List,

    /// Show one effect
    Show {
        /// Effect id or name
        effect: String,
    },

    /// Capture the pattern a zone is showing
    Capture {
        /// Zone number (1-6)
        zone: u8,
        /// Name for the new effect
        #[arg(long, short = 'n')]
        name: Option<String>,
    },

    /// Apply an effect to one or more zones
    Apply {
        /// Effect id or name
        effect: String,
        /// Target zones
        #[arg(required = true)]
        zones: Vec<u8>,
        /// Brightness 0-255 for the applied effect
        #[arg(long, short = 'b')]
        brightness: Option<u8>,
    },

    /// Rename an effect
    Rename {
        /// Effect id or current name
        effect: String,
        /// New name
        name: String,
    },

    /// Delete an effect
    #[command(alias = "rm")]
    Delete {
        /// Effect id or name
        effect: String,
    },
}

// ── Watch / completions ──────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Seconds between polls
    #[arg(long, short = 'i', default_value = "30")]
    pub interval: u64,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

// ── Value parsers ────────────────────────────────────────────────────

/// `"r,g,b"` or `"#rrggbb"`.
pub fn parse_rgb(raw: &str) -> Result<Rgb, String> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("expected #rrggbb, got '{raw}'"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| format!("bad hex color '{raw}'"))
        };
        return Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?));
    }

    let parts: Vec<u8> = raw
        .split(',')
        .map(|p| {
            p.trim()
                .parse::<u8>()
                .map_err(|_| format!("'{p}' is not a value between 0 and 255"))
        })
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        &[r, g, b] => Ok(Rgb::new(r, g, b)),
        _ => Err(format!("expected r,g,b, got '{raw}'")),
    }
}

/// `"hue,saturation,value"`.
pub fn parse_hsv(raw: &str) -> Result<Hsv, String> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|_| format!("'{p}' is not a number")))
        .collect::<Result<_, _>>()?;
    let &[hue, saturation, value] = parts.as_slice() else {
        return Err(format!("expected hue,saturation,value, got '{raw}'"));
    };
    if !(0.0..=360.0).contains(&hue)
        || !(0.0..=100.0).contains(&saturation)
        || !(0.0..=100.0).contains(&value)
    {
        return Err("hue must be 0-360, saturation and value 0-100".into());
    }
    Ok(Hsv {
        hue,
        saturation,
        value,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn rgb_accepts_triples_and_hex() {
        assert_eq!(parse_rgb("255, 92,0").unwrap(), Rgb::new(255, 92, 0));
        assert_eq!(parse_rgb("#FF5c00").unwrap(), Rgb::new(255, 92, 0));
        assert!(parse_rgb("256,0,0").is_err());
        assert!(parse_rgb("1,2").is_err());
        assert!(parse_rgb("#12345").is_err());
    }

    #[test]
    fn hsv_is_range_checked() {
        let hsv = parse_hsv("240,50,100").unwrap();
        assert!((hsv.hue - 240.0).abs() < f64::EPSILON);
        assert!(parse_hsv("400,0,0").is_err());
        assert!(parse_hsv("1,2").is_err());
    }
}
