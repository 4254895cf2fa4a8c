//! Zone command handlers: status, set, on, off.

use std::collections::HashMap;
use std::sync::Arc;

use tabled::Tabled;

use oelo_core::{Color, Controller, EffectRef, ZoneRequest, ZoneState};

use crate::cli::{GlobalOpts, SetArgs, StatusArgs, ZonesArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ZoneRow {
    #[tabled(rename = "Zone")]
    zone: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Pattern")]
    pattern: String,
    #[tabled(rename = "Color")]
    color: String,
    #[tabled(rename = "Brightness")]
    brightness: String,
    #[tabled(rename = "Effect")]
    effect: String,
    #[tabled(rename = "State")]
    availability: String,
}

fn zone_row(state: &ZoneState, names: &HashMap<String, String>, color: bool) -> ZoneRow {
    let mut availability = output::availability(state.availability, color);
    if state.unverified {
        availability.push_str(" (unverified)");
    }
    ZoneRow {
        zone: state.zone.to_string(),
        power: if state.is_on { "on" } else { "off" }.into(),
        pattern: state.pattern_type.clone(),
        color: state.color.to_string(),
        brightness: state.brightness.to_string(),
        effect: effect_label(state, names),
        availability,
    }
}

fn effect_label(state: &ZoneState, names: &HashMap<String, String>) -> String {
    state
        .effect
        .as_ref()
        .map(|id| {
            names
                .get(id.as_str())
                .cloned()
                .unwrap_or_else(|| id.to_string())
        })
        .unwrap_or_default()
}

fn detail(state: &ZoneState, names: &HashMap<String, String>, color: bool) -> String {
    let row = zone_row(state, names, color);
    let updated = state
        .last_updated
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".into());
    [
        format!("Zone:        {}", row.zone),
        format!("Power:       {}", row.power),
        format!("Pattern:     {}", row.pattern),
        format!("Color:       {}", row.color),
        format!("Brightness:  {}", row.brightness),
        format!("Speed:       {}", state.speed),
        format!("Direction:   {}", state.direction),
        format!("LEDs:        {}", state.led_count),
        format!("Effect:      {}", row.effect),
        format!("State:       {}", row.availability),
        format!("Updated:     {updated}"),
    ]
    .join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn status(
    controller: &Controller,
    args: &StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let names: HashMap<String, String> = controller
        .list_effects()
        .await
        .into_iter()
        .map(|e| (e.id.to_string(), e.name))
        .collect();

    let out = match args.zone {
        Some(zone) => {
            let state = controller.get_zone_state(util::zone_id(zone)?)?;
            output::render_single(
                &global.output,
                &state,
                |s| detail(s, &names, color),
                |s| s.zone.to_string(),
            )
        }
        None => {
            let zones: Vec<Arc<ZoneState>> = controller.zones().values().cloned().collect();
            output::render_list(
                &global.output,
                &zones,
                |s| zone_row(s, &names, color),
                |s| format!("{} {}", s.zone, if s.is_on { "on" } else { "off" }),
            )
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn set(
    controller: &Controller,
    args: &SetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let zone = util::zone_id(args.zone)?;
    let request = request_from_args(args)?;
    let outcome = controller.set_zone(zone, request).await?;
    util::report(zone, outcome, global);
    Ok(())
}

pub async fn power(
    controller: &Controller,
    args: &ZonesArgs,
    on: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let zones = util::zones_or_all(controller, &args.zones)?;
    let request = if on {
        ZoneRequest::on()
    } else {
        ZoneRequest::off()
    };
    util::apply_to_zones(controller, zones, &request, global).await
}

// ── Request building ────────────────────────────────────────────────

fn request_from_args(args: &SetArgs) -> Result<ZoneRequest, CliError> {
    if args.off {
        return Ok(ZoneRequest::off());
    }

    let effect = resolve_effect_ref(args)?;
    let color = args.color.map(Color::from).or(args.hsv.map(Color::from));
    if color.is_some() && effect.is_some() {
        return Err(CliError::Validation {
            field: "set".into(),
            reason: "pass either a color or an effect, not both".into(),
        });
    }

    Ok(ZoneRequest {
        power: Some(true),
        color,
        brightness: args.brightness,
        effect,
    })
}

/// Fold the accepted spellings of the effect flag into one lookup key.
fn resolve_effect_ref(args: &SetArgs) -> Result<Option<EffectRef>, CliError> {
    let mut given: Vec<&str> = [
        &args.effect,
        &args.effect_name,
        &args.pattern_id,
        &args.pattern_name,
    ]
    .into_iter()
    .filter_map(|v| v.as_deref())
    .map(str::trim)
    .collect();
    given.sort_unstable();
    given.dedup();

    match given.as_slice() {
        [] => Ok(None),
        [one] => Ok(Some(EffectRef::from(*one))),
        _ => Err(CliError::Validation {
            field: "effect".into(),
            reason: format!("conflicting effect identifiers: {}", given.join(", ")),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use oelo_api::Rgb;

    fn args() -> SetArgs {
        SetArgs {
            zone: 1,
            color: None,
            hsv: None,
            brightness: None,
            effect: None,
            effect_name: None,
            pattern_id: None,
            pattern_name: None,
            off: false,
        }
    }

    #[test]
    fn legacy_effect_flags_resolve_to_one_key() {
        let legacy = SetArgs {
            pattern_name: Some("Party".into()),
            ..args()
        };
        let request = request_from_args(&legacy).unwrap();
        assert_eq!(request.effect, Some(EffectRef::from("Party")));
        assert_eq!(request.power, Some(true));

        let same = SetArgs {
            effect: Some("Party".into()),
            effect_name: Some("Party".into()),
            ..args()
        };
        assert!(request_from_args(&same).is_ok());

        let conflicting = SetArgs {
            effect: Some("Party".into()),
            pattern_id: Some("chase-0011223344556677".into()),
            ..args()
        };
        assert!(matches!(
            request_from_args(&conflicting),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn color_and_effect_together_are_rejected() {
        let both = SetArgs {
            color: Some(Rgb::new(1, 2, 3)),
            effect: Some("Party".into()),
            ..args()
        };
        assert!(request_from_args(&both).is_err());
    }

    #[test]
    fn off_flag_wins() {
        let off = SetArgs {
            off: true,
            ..args()
        };
        assert_eq!(request_from_args(&off).unwrap(), ZoneRequest::off());
    }

    #[test]
    fn brightness_alone_turns_zone_on() {
        let dim = SetArgs {
            brightness: Some(40),
            ..args()
        };
        let request = request_from_args(&dim).unwrap();
        assert_eq!(request.brightness, Some(40));
        assert_eq!(request.color, None);
        assert_eq!(request.effect, None);
    }
}
