// ── Effect domain types ──
//
// An effect is a captured pattern. Its id is derived from the canonical
// parameter payload, so equal payloads always share an id.

use std::fmt;

use chrono::{DateTime, Utc};
use oelo_api::{PatternCommand, Rgb};
use serde::{Deserialize, Serialize};

/// Hex digits of the content hash kept in an effect id.
const ID_HASH_LEN: usize = 16;

// ── PlanType ────────────────────────────────────────────────────────

/// The pattern families the controller knows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PlanType {
    March,
    Stationary,
    River,
    Chase,
    Twinkle,
    Split,
    Fade,
    Sprinkle,
    Takeover,
    Streak,
    Bolt,
    Custom,
    Spotlight,
}

impl PlanType {
    /// Classify a raw device pattern string. `off` is not a plan; unknown
    /// patterns are treated as custom.
    pub fn from_pattern(pattern: &str) -> Option<Self> {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern.eq_ignore_ascii_case(oelo_api::models::PATTERN_OFF) {
            return None;
        }
        Some(pattern.parse().unwrap_or(Self::Custom))
    }

    /// Display form used in generated names, e.g. `Chase`.
    pub fn title(self) -> String {
        let raw: &'static str = self.into();
        let mut chars = raw.chars();
        chars.next().map_or_else(String::new, |first| {
            first.to_ascii_uppercase().to_string() + chars.as_str()
        })
    }
}

// ── EffectId / EffectRef ────────────────────────────────────────────

/// Content-derived effect identifier, `"{plan_type}-{16 hex digits}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectId(String);

impl EffectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EffectId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for EffectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lookup key for an effect: either its id or its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EffectRef(String);

impl EffectRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EffectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EffectRef {
    fn from(s: &str) -> Self {
        Self(s.trim().to_owned())
    }
}

impl From<String> for EffectRef {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<&EffectId> for EffectRef {
    fn from(id: &EffectId) -> Self {
        Self(id.0.clone())
    }
}

// ── EffectParams ────────────────────────────────────────────────────

/// Canonical payload of a captured pattern.
///
/// Field order is part of the id derivation; reordering fields changes
/// every id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectParams {
    pub plan_type: PlanType,
    /// Raw device pattern string, replayed verbatim.
    pub pattern: String,
    pub direction: String,
    pub speed: u32,
    pub gap: u32,
    pub other: u32,
    pub pause: u32,
    pub num_colors: u32,
    pub colors: Vec<Rgb>,
    /// 0-based LED indices the colors were reconstructed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Vec<usize>>,
}

impl EffectParams {
    pub fn id(&self) -> EffectId {
        // Serializing plain owned data into a Vec has no failure path.
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let hash = blake3::hash(&canonical).to_hex();
        EffectId(format!("{}-{}", self.plan_type, &hash.as_str()[..ID_HASH_LEN]))
    }

    /// The write that replays these parameters on `zone` unchanged.
    pub fn to_command(&self, zone: u8) -> PatternCommand {
        PatternCommand {
            zone,
            pattern_type: self.pattern.clone(),
            num_colors: self.num_colors,
            colors: self.colors.clone(),
            direction: self.direction.clone(),
            speed: self.speed,
            gap: self.gap,
            other: self.other,
            pause: self.pause,
        }
    }
}

// ── Effect ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub id: EffectId,
    pub name: String,
    pub params: EffectParams,
    pub captured_at: DateTime<Utc>,
}

impl Effect {
    pub fn plan_type(&self) -> PlanType {
        self.params.plan_type
    }
}
