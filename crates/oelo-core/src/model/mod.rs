// ── Domain model ──

pub mod effect;
pub mod zone;

pub use effect::{Effect, EffectId, EffectParams, EffectRef, PlanType};
pub use zone::{Availability, Color, Hsv, ZoneId, ZoneState};
