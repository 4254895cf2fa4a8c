// ── Zone intents ──
//
// What a caller wants a zone to become, kept unscaled until the moment of
// sending so coalesced requests can be merged field by field.

use oelo_api::{PatternCommand, Rgb};

use crate::model::{Color, EffectId, EffectRef, ZoneState};

/// Adapter-facing request for `set_zone`. Every field is optional; an
/// empty request turns the zone on with whatever it showed last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneRequest {
    pub power: Option<bool>,
    pub color: Option<Color>,
    pub brightness: Option<u8>,
    pub effect: Option<EffectRef>,
}

impl ZoneRequest {
    pub fn off() -> Self {
        Self {
            power: Some(false),
            ..Self::default()
        }
    }

    pub fn on() -> Self {
        Self {
            power: Some(true),
            ..Self::default()
        }
    }

    pub fn color(color: impl Into<Color>) -> Self {
        Self {
            color: Some(color.into()),
            ..Self::default()
        }
    }

    pub fn brightness(brightness: u8) -> Self {
        Self {
            brightness: Some(brightness),
            ..Self::default()
        }
    }

    pub fn effect(effect: impl Into<EffectRef>) -> Self {
        Self {
            effect: Some(effect.into()),
            ..Self::default()
        }
    }

    pub fn with_brightness(mut self, brightness: u8) -> Self {
        self.brightness = Some(brightness);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Target {
    Off,
    Pattern {
        base: PatternCommand,
        effect: Option<EffectId>,
    },
    /// Power on with the zone's last pattern.
    Resume,
}

/// A request with its effect already resolved against the store.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ZoneIntent {
    pub target: Target,
    pub brightness: Option<u8>,
}

/// The write for one dispatch cycle plus what to record once it lands.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Rendered {
    pub send: PatternCommand,
    /// Unscaled pattern, `None` when the zone goes dark.
    pub base: Option<PatternCommand>,
    pub brightness: u8,
    pub effect: Option<EffectId>,
}

impl ZoneIntent {
    pub fn new(target: Target, brightness: Option<u8>) -> Self {
        Self { target, brightness }
    }

    /// Fold a newer intent over this one. The newer target wins unless it
    /// only asks to resume, which keeps a pending pattern.
    pub fn merge(self, newer: Self) -> Self {
        let target = match (self.target, newer.target) {
            (Target::Pattern { base, effect }, Target::Resume) => Target::Pattern { base, effect },
            (_, target) => target,
        };
        Self {
            target,
            brightness: newer.brightness.or(self.brightness),
        }
    }

    pub fn render(&self, state: &ZoneState) -> Rendered {
        let zone = state.zone.get();
        let brightness = self.brightness.unwrap_or(state.brightness);

        let (base, effect) = match &self.target {
            Target::Off => (None, None),
            _ if brightness == 0 => (None, None),
            Target::Pattern { base, effect } => (Some(base.clone()), effect.clone()),
            Target::Resume => match &state.last_pattern {
                Some(last) => (Some(last.clone()), state.effect.clone()),
                None => (Some(PatternCommand::solid(zone, Rgb::WHITE)), None),
            },
        };

        let Some(mut base) = base else {
            return Rendered {
                send: PatternCommand::off(zone),
                base: None,
                brightness: state.brightness,
                effect: None,
            };
        };
        base.zone = zone;

        let mut send = base.clone();
        if brightness < u8::MAX {
            for color in &mut send.colors {
                *color = color.scaled(brightness);
            }
        }
        Rendered {
            send,
            base: Some(base),
            brightness,
            effect,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::ZoneId;
    use pretty_assertions::assert_eq;

    fn state() -> ZoneState {
        ZoneState::new(ZoneId::new(2).unwrap(), 500)
    }

    fn solid(c: Rgb) -> Target {
        Target::Pattern {
            base: PatternCommand::solid(2, c),
            effect: None,
        }
    }

    #[test]
    fn resume_without_history_is_solid_white() {
        let rendered = ZoneIntent::new(Target::Resume, None).render(&state());
        assert_eq!(rendered.send, PatternCommand::solid(2, Rgb::WHITE));
        assert_eq!(rendered.brightness, 255);
    }

    #[test]
    fn resume_replays_last_pattern_scaled() {
        let red = PatternCommand::solid(2, Rgb::new(200, 0, 0));
        let zone = state().commanded(Some(&red), 255, None);

        let rendered = ZoneIntent::new(Target::Resume, Some(128)).render(&zone);

        assert_eq!(rendered.send.colors, vec![Rgb::new(100, 0, 0)]);
        assert_eq!(rendered.base, Some(red));
        assert_eq!(rendered.brightness, 128);
    }

    #[test]
    fn zero_brightness_turns_the_zone_off() {
        let rendered = ZoneIntent::new(solid(Rgb::WHITE), Some(0)).render(&state());
        assert!(rendered.send.is_off());
        assert_eq!(rendered.base, None);
    }

    #[test]
    fn merge_keeps_latest_target_and_brightness() {
        let merged = ZoneIntent::new(solid(Rgb::new(1, 0, 0)), Some(10))
            .merge(ZoneIntent::new(solid(Rgb::new(0, 1, 0)), None));
        assert_eq!(merged.target, solid(Rgb::new(0, 1, 0)));
        assert_eq!(merged.brightness, Some(10));

        let resumed = merged.merge(ZoneIntent::new(Target::Resume, Some(50)));
        assert_eq!(resumed.target, solid(Rgb::new(0, 1, 0)));
        assert_eq!(resumed.brightness, Some(50));

        let off = resumed.merge(ZoneIntent::new(Target::Off, None));
        assert_eq!(off.target, Target::Off);
    }
}
