// ── Wire models ──
//
// Shapes exchanged with the controller: the per-zone status record from
// `/getController` and the query parameters of `/setPattern`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Error;

/// The controller never reports more than this many color slots per zone,
/// regardless of the zone's LED count.
pub const MAX_REPORTED_COLORS: usize = 40;

/// Pattern type string the controller uses for a dark zone.
pub const PATTERN_OFF: &str = "off";

// ── Rgb ─────────────────────────────────────────────────────────────

/// A single 8-bit RGB color, serialized as a `[r, g, b]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn is_off(self) -> bool {
        self == Self::OFF
    }

    /// Scale every channel by `brightness / 255`, rounding to nearest.
    pub fn scaled(self, brightness: u8) -> Self {
        let scale = |c: u8| -> u8 {
            let v = (u32::from(c) * u32::from(brightness) + 127) / 255;
            u8::try_from(v).unwrap_or(u8::MAX)
        };
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(c: Rgb) -> Self {
        [c.r, c.g, c.b]
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

/// Parse the controller's comma-separated `r,g,b,r,g,b,...` form.
///
/// Channel values are clamped to 0..=255. A triple containing a
/// non-numeric token is skipped; a trailing incomplete triple is dropped.
pub fn parse_color_list(raw: &str) -> Vec<Rgb> {
    let tokens: Vec<&str> = raw.split(',').map(str::trim).collect();
    tokens
        .chunks_exact(3)
        .filter_map(|triple| {
            let mut channels = [0u8; 3];
            for (slot, token) in channels.iter_mut().zip(triple) {
                let value: i64 = token.parse().ok()?;
                *slot = u8::try_from(value.clamp(0, 255)).unwrap_or(u8::MAX);
            }
            Some(Rgb::from(channels))
        })
        .collect()
}

/// Format colors in the controller's comma-separated form.
pub fn format_color_list(colors: &[Rgb]) -> String {
    colors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

// ── ZoneStatus ──────────────────────────────────────────────────────

/// One element of the `/getController` array.
///
/// Field names follow the controller firmware; aliases cover the variants
/// seen across firmware revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStatus {
    pub num: u8,
    #[serde(default, alias = "patternType")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub is_on: Option<bool>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub speed: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub gap: u32,
    #[serde(default, deserialize_with = "lenient_string")]
    pub direction: Option<String>,
    #[serde(default, alias = "num_colors", deserialize_with = "lenient_opt_u32")]
    pub number_of_colors: Option<u32>,
    #[serde(default, alias = "colors", deserialize_with = "lenient_string")]
    pub color_str: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    pub led_cnt: Option<u32>,
}

impl ZoneStatus {
    /// An empty record for `zone` that reports the zone dark.
    pub fn off(zone: u8) -> Self {
        Self {
            num: zone,
            pattern: Some(PATTERN_OFF.into()),
            is_on: Some(false),
            speed: 0,
            gap: 0,
            direction: Some("F".into()),
            number_of_colors: Some(1),
            color_str: Some("0,0,0".into()),
            led_cnt: None,
        }
    }

    /// The active pattern type, `"off"` if the controller omitted it.
    pub fn pattern_type(&self) -> &str {
        self.pattern.as_deref().unwrap_or(PATTERN_OFF)
    }

    /// Whether the zone is lit: a non-`off` pattern and no explicit `isOn=false`.
    pub fn is_lit(&self) -> bool {
        self.pattern_type() != PATTERN_OFF && self.is_on != Some(false)
    }

    pub fn direction(&self) -> &str {
        self.direction.as_deref().unwrap_or("F")
    }

    /// Reported colors, at most [`MAX_REPORTED_COLORS`] slots.
    pub fn colors(&self) -> Vec<Rgb> {
        let mut colors = self
            .color_str
            .as_deref()
            .map(parse_color_list)
            .unwrap_or_default();
        colors.truncate(MAX_REPORTED_COLORS);
        colors
    }
}

/// Parse a `/getController` body, rejecting anything that is not an array
/// of objects each carrying an integer `num`.
pub fn parse_status_body(body: &str) -> Result<Vec<ZoneStatus>, Error> {
    let bad = |message: String| Error::BadResponse {
        message,
        body: body.chars().take(512).collect(),
    };

    let value: Value =
        serde_json::from_str(body).map_err(|e| bad(format!("invalid JSON: {e}")))?;
    let Value::Array(items) = value else {
        return Err(bad("expected a JSON array of zone records".into()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            if !item.get("num").is_some_and(Value::is_u64) {
                return Err(bad(format!("record {i} has no integer `num` field")));
            }
            serde_json::from_value::<ZoneStatus>(item)
                .map_err(|e| bad(format!("record {i} does not match zone shape: {e}")))
        })
        .collect()
}

fn lenient_u32<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
    Ok(lenient_opt_u32(de)?.unwrap_or(0))
}

fn lenient_opt_u32<'de, D: Deserializer<'de>>(de: D) -> Result<Option<u32>, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(de)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ── PatternCommand ──────────────────────────────────────────────────

/// Parameters of a single `/setPattern` request targeting one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternCommand {
    pub zone: u8,
    pub pattern_type: String,
    pub num_colors: u32,
    pub colors: Vec<Rgb>,
    pub direction: String,
    pub speed: u32,
    pub gap: u32,
    pub other: u32,
    pub pause: u32,
}

impl PatternCommand {
    /// Turn `zone` dark.
    pub fn off(zone: u8) -> Self {
        Self {
            zone,
            pattern_type: PATTERN_OFF.into(),
            num_colors: 1,
            colors: vec![Rgb::OFF],
            direction: "F".into(),
            speed: 0,
            gap: 0,
            other: 0,
            pause: 0,
        }
    }

    /// A static single color across the whole zone.
    pub fn solid(zone: u8, color: Rgb) -> Self {
        Self {
            pattern_type: "custom".into(),
            colors: vec![color],
            ..Self::off(zone)
        }
    }

    pub fn is_off(&self) -> bool {
        self.pattern_type == PATTERN_OFF
    }

    /// Query parameters in the order the controller firmware documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("patternType", self.pattern_type.clone()),
            ("num_zones", "1".into()),
            ("zones", self.zone.to_string()),
            ("num_colors", self.num_colors.to_string()),
            ("colors", format_color_list(&self.colors)),
            ("direction", self.direction.clone()),
            ("speed", self.speed.to_string()),
            ("gap", self.gap.to_string()),
            ("other", self.other.to_string()),
            ("pause", self.pause.to_string()),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_color_list_clamps_and_drops_partial_triples() {
        let colors = parse_color_list("255,92,0, 300,-4,7, 1,2");
        assert_eq!(colors, vec![Rgb::new(255, 92, 0), Rgb::new(255, 0, 7)]);
    }

    #[test]
    fn parse_color_list_skips_garbage_triples() {
        let colors = parse_color_list("1,x,3,4,5,6");
        assert_eq!(colors, vec![Rgb::new(4, 5, 6)]);
    }

    #[test]
    fn scaled_rounds_to_nearest() {
        assert_eq!(Rgb::new(255, 128, 1).scaled(128), Rgb::new(128, 64, 1));
        assert_eq!(Rgb::WHITE.scaled(255), Rgb::WHITE);
        assert_eq!(Rgb::WHITE.scaled(0), Rgb::OFF);
    }

    #[test]
    fn status_body_parses_firmware_fields() {
        let body = r#"[{"num":1,"isOn":true,"pattern":"march","speed":3,"direction":"R",
            "numberOfColors":2,"colorStr":"255,92,0,0,0,255","extra":"ignored"}]"#;
        let zones = parse_status_body(body).unwrap();
        assert_eq!(zones.len(), 1);
        let z = &zones[0];
        assert_eq!(z.num, 1);
        assert_eq!(z.pattern_type(), "march");
        assert_eq!(z.speed, 3);
        assert_eq!(z.direction(), "R");
        assert_eq!(z.number_of_colors, Some(2));
        assert_eq!(z.colors(), vec![Rgb::new(255, 92, 0), Rgb::new(0, 0, 255)]);
        assert!(z.is_lit());
    }

    #[test]
    fn status_body_accepts_aliases_and_string_numbers() {
        let body = r#"[{"num":2,"patternType":"chase","speed":"5","num_colors":"1","colors":"9,9,9"}]"#;
        let zones = parse_status_body(body).unwrap();
        assert_eq!(zones[0].pattern_type(), "chase");
        assert_eq!(zones[0].speed, 5);
        assert_eq!(zones[0].number_of_colors, Some(1));
        assert_eq!(zones[0].colors(), vec![Rgb::new(9, 9, 9)]);
    }

    #[test]
    fn status_body_rejects_non_array() {
        let err = parse_status_body(r#"{"num":1}"#).unwrap_err();
        assert!(matches!(err, Error::BadResponse { .. }));
    }

    #[test]
    fn status_body_rejects_records_without_num() {
        let err = parse_status_body(r#"[{"pattern":"off"}]"#).unwrap_err();
        assert!(matches!(err, Error::BadResponse { .. }));
        let err = parse_status_body("[1, 2]").unwrap_err();
        assert!(matches!(err, Error::BadResponse { .. }));
    }

    #[test]
    fn off_pattern_or_explicit_flag_means_dark() {
        let mut z = ZoneStatus::off(1);
        assert!(!z.is_lit());
        z.pattern = Some("twinkle".into());
        assert!(!z.is_lit());
        z.is_on = None;
        assert!(z.is_lit());
    }

    #[test]
    fn colors_are_truncated_to_reported_slots() {
        let mut z = ZoneStatus::off(1);
        z.color_str = Some(vec!["1,1,1"; 60].join(","));
        assert_eq!(z.colors().len(), MAX_REPORTED_COLORS);
    }

    #[test]
    fn query_pairs_encode_solid_color() {
        let cmd = PatternCommand::solid(3, Rgb::new(10, 20, 30));
        let pairs = cmd.query_pairs();
        assert_eq!(pairs[0], ("patternType", "custom".to_string()));
        assert_eq!(pairs[2], ("zones", "3".to_string()));
        assert_eq!(pairs[4], ("colors", "10,20,30".to_string()));
        assert_eq!(pairs.len(), 10);
    }
}
