// ── Zone domain types ──
//
// ZoneId, Availability, Color and the ZoneState snapshot. A ZoneState is
// immutable once published; the registry swaps whole snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use oelo_api::{PatternCommand, Rgb, ZoneStatus};
use serde::{Deserialize, Serialize};

use super::EffectId;
use crate::error::CoreError;

// ── ZoneId ──────────────────────────────────────────────────────────

/// A controller zone index, always within `1..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ZoneId(u8);

impl ZoneId {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 6;

    pub fn new(zone: u8) -> Result<Self, CoreError> {
        if (Self::MIN..=Self::MAX).contains(&zone) {
            Ok(Self(zone))
        } else {
            Err(CoreError::UnknownZone { zone })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every zone a controller can expose.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(Self)
    }
}

impl TryFrom<u8> for ZoneId {
    type Error = CoreError;

    fn try_from(zone: u8) -> Result<Self, Self::Error> {
        Self::new(zone)
    }
}

impl From<ZoneId> for u8 {
    fn from(zone: ZoneId) -> Self {
        zone.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ZoneId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let zone = s.trim().parse::<u8>().map_err(|_| CoreError::Config {
            message: format!("'{s}' is not a zone number"),
        })?;
        Self::new(zone)
    }
}

// ── Availability ────────────────────────────────────────────────────

/// Whether the last polls could see this zone.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Availability {
    Online,
    Offline,
    #[default]
    Unknown,
}

// ── Color ───────────────────────────────────────────────────────────

/// Hue in degrees, saturation and value in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsv {
    pub hue: f64,
    pub saturation: f64,
    pub value: f64,
}

impl Hsv {
    pub fn to_rgb(self) -> Rgb {
        let h = self.hue.rem_euclid(360.0) / 60.0;
        let s = (self.saturation / 100.0).clamp(0.0, 1.0);
        let v = (self.value / 100.0).clamp(0.0, 1.0);

        let c = v * s;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let m = v - c;
        let (r, g, b) = match h {
            h if h < 1.0 => (c, x, 0.0),
            h if h < 2.0 => (x, c, 0.0),
            h if h < 3.0 => (0.0, c, x),
            h if h < 4.0 => (0.0, x, c),
            h if h < 5.0 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        Rgb::new(channel(r + m), channel(g + m), channel(b + m))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn channel(unit: f64) -> u8 {
    (unit * 255.0).round().clamp(0.0, 255.0) as u8
}

/// A requested zone color. HSV is converted before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Rgb(Rgb),
    Hsv(Hsv),
}

impl Color {
    pub fn to_rgb(self) -> Rgb {
        match self {
            Self::Rgb(rgb) => rgb,
            Self::Hsv(hsv) => hsv.to_rgb(),
        }
    }
}

impl From<Rgb> for Color {
    fn from(rgb: Rgb) -> Self {
        Self::Rgb(rgb)
    }
}

impl From<Hsv> for Color {
    fn from(hsv: Hsv) -> Self {
        Self::Hsv(hsv)
    }
}

// ── ZoneState ───────────────────────────────────────────────────────

/// Last-known state of one zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneState {
    pub zone: ZoneId,
    pub is_on: bool,
    /// Representative color: the first lit color the zone reports.
    pub color: Rgb,
    /// Last commanded brightness. The controller does not report one.
    pub brightness: u8,
    pub effect: Option<EffectId>,
    pub led_count: usize,
    pub availability: Availability,
    /// Raw pattern type as reported, `"off"` when dark.
    pub pattern_type: String,
    pub speed: u32,
    pub direction: String,
    #[serde(skip)]
    pub last_status: Option<ZoneStatus>,
    pub last_updated: Option<DateTime<Utc>>,
    /// The last pattern written to the zone, before brightness scaling.
    #[serde(skip)]
    pub last_pattern: Option<PatternCommand>,
    /// Set when the last write could not be confirmed on the device.
    pub unverified: bool,
}

impl ZoneState {
    pub fn new(zone: ZoneId, led_count: usize) -> Self {
        Self {
            zone,
            is_on: false,
            color: Rgb::WHITE,
            brightness: u8::MAX,
            effect: None,
            led_count,
            availability: Availability::Unknown,
            pattern_type: oelo_api::models::PATTERN_OFF.into(),
            speed: 0,
            direction: "F".into(),
            last_status: None,
            last_updated: None,
            last_pattern: None,
            unverified: false,
        }
    }

    /// Fold a successful status report into a new snapshot. Fields the
    /// controller does not report are carried over.
    pub(crate) fn observed(&self, status: &ZoneStatus, recognized: Option<EffectId>) -> Self {
        let is_on = status.is_lit();
        let colors = status.colors();
        let color = colors
            .iter()
            .copied()
            .find(|c| !c.is_off())
            .filter(|_| is_on)
            .unwrap_or(self.color);

        let effect = if !is_on {
            None
        } else if recognized.is_some() {
            recognized
        } else if self
            .last_pattern
            .as_ref()
            .is_some_and(|p| p.pattern_type == status.pattern_type())
        {
            self.effect.clone()
        } else {
            None
        };

        Self {
            is_on,
            color,
            effect,
            availability: if status.pattern.is_some() {
                Availability::Online
            } else {
                Availability::Offline
            },
            pattern_type: status.pattern_type().to_owned(),
            speed: status.speed,
            direction: status.direction().to_owned(),
            last_status: Some(status.clone()),
            last_updated: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// Record a write that the transport accepted.
    pub(crate) fn commanded(
        &self,
        base: Option<&PatternCommand>,
        brightness: u8,
        effect: Option<EffectId>,
    ) -> Self {
        let Some(base) = base else {
            return Self {
                is_on: false,
                effect: None,
                pattern_type: oelo_api::models::PATTERN_OFF.into(),
                unverified: false,
                last_updated: Some(Utc::now()),
                ..self.clone()
            };
        };

        Self {
            is_on: true,
            color: base
                .colors
                .iter()
                .copied()
                .find(|c| !c.is_off())
                .unwrap_or(self.color),
            brightness,
            effect,
            pattern_type: base.pattern_type.clone(),
            speed: base.speed,
            direction: base.direction.clone(),
            last_pattern: Some(base.clone()),
            unverified: false,
            last_updated: Some(Utc::now()),
            ..self.clone()
        }
    }

    /// A successful report left this zone out. Nothing previously read
    /// from the device describes it any more.
    pub(crate) fn missing(&self) -> Self {
        Self {
            availability: Availability::Offline,
            last_status: None,
            ..self.clone()
        }
    }

    pub(crate) fn with_availability(&self, availability: Availability) -> Self {
        Self {
            availability,
            ..self.clone()
        }
    }
}
