// ── State stores ──
//
// Zone snapshots (lock-free, swapped per poll) and the persisted effect
// collection (one mutex around every mutation).

mod effects;
mod zones;

pub use effects::{EffectStore, derive_params, expand};
pub use zones::{ZoneRegistry, ZoneSnapshot};
