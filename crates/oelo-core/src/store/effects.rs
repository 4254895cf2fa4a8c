// ── Effect store ──
//
// Content-addressed, deduplicating collection of captured effects, shared
// by every zone of one controller. All mutations run under one async
// mutex and are written to disk before they become visible.

use std::path::{Path, PathBuf};

use chrono::Utc;
use indexmap::IndexMap;
use oelo_api::{PatternCommand, ZoneStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ZoneConfig;
use crate::error::CoreError;
use crate::model::{Effect, EffectId, EffectParams, EffectRef, PlanType};
use crate::spotlight::{SpotlightPlanMap, compress, reconstruct};

const FILE_VERSION: u32 = 1;

/// On-disk layout: `{"version": 1, "effects": {id: {...}}}`.
#[derive(Debug, Serialize, Deserialize)]
struct EffectsFile {
    version: u32,
    effects: IndexMap<EffectId, StoredEffect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEffect {
    name: String,
    plan_type: PlanType,
    params: EffectParams,
    captured_at: chrono::DateTime<Utc>,
}

impl StoredEffect {
    fn into_effect(self, id: EffectId) -> Effect {
        Effect {
            id,
            name: self.name,
            params: self.params,
            captured_at: self.captured_at,
        }
    }
}

impl From<&Effect> for StoredEffect {
    fn from(effect: &Effect) -> Self {
        Self {
            name: effect.name.clone(),
            plan_type: effect.plan_type(),
            params: effect.params.clone(),
            captured_at: effect.captured_at,
        }
    }
}

type Effects = IndexMap<EffectId, Effect>;

pub struct EffectStore {
    effects: Mutex<Effects>,
    path: Option<PathBuf>,
    capacity: usize,
}

impl EffectStore {
    /// A store that never touches disk.
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            effects: Mutex::new(IndexMap::new()),
            path: None,
            capacity,
        }
    }

    /// Load the store persisted at `path`; a missing file is an empty store.
    pub async fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, CoreError> {
        let path = path.into();
        let effects = match tokio::fs::read(&path).await {
            Ok(bytes) => decode(&path, &bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexMap::new(),
            Err(e) => return Err(CoreError::persistence(&path, e)),
        };
        debug!(path = %path.display(), count = effects.len(), "effect store loaded");
        Ok(Self {
            effects: Mutex::new(effects),
            path: Some(path),
            capacity,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// All effects in insertion order.
    pub async fn list(&self) -> Vec<Effect> {
        self.effects.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.effects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.effects.lock().await.is_empty()
    }

    pub async fn get(&self, key: &EffectRef) -> Result<Effect, CoreError> {
        let effects = self.effects.lock().await;
        let id = resolve(&effects, key)?;
        effects
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(key))
    }

    pub async fn contains(&self, id: &EffectId) -> bool {
        self.effects.lock().await.contains_key(id)
    }

    /// Expand an effect into the write that reproduces it on `zone`.
    pub async fn command_for(
        &self,
        key: &EffectRef,
        zone: &ZoneConfig,
    ) -> Result<(EffectId, PatternCommand), CoreError> {
        let effect = self.get(key).await?;
        let command = expand(&effect.params, zone)?;
        Ok((effect.id, command))
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Insert the effect for `params`, or return the existing one when an
    /// identical payload was captured before (its name is left alone).
    pub async fn capture(
        &self,
        params: EffectParams,
        name: Option<String>,
    ) -> Result<Effect, CoreError> {
        let id = params.id();
        let mut effects = self.effects.lock().await;

        if let Some(existing) = effects.get(&id) {
            debug!(id = %id, "capture matched an existing effect");
            return Ok(existing.clone());
        }
        if effects.len() >= self.capacity {
            return Err(CoreError::StoreFull {
                capacity: self.capacity,
            });
        }

        let name = match name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty()) {
            Some(name) => name,
            None => auto_name(&effects, params.plan_type),
        };
        let effect = Effect {
            id: id.clone(),
            name,
            params,
            captured_at: Utc::now(),
        };

        let mut next = effects.clone();
        next.insert(id, effect.clone());
        self.persist(&next).await?;
        *effects = next;

        info!(id = %effect.id, name = %effect.name, "effect captured");
        Ok(effect)
    }

    pub async fn rename(&self, key: &EffectRef, new_name: &str) -> Result<Effect, CoreError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(CoreError::Config {
                message: "effect name cannot be empty".into(),
            });
        }

        let mut effects = self.effects.lock().await;
        let id = resolve(&effects, key)?;
        if effects
            .values()
            .any(|e| e.id != id && e.name == new_name)
        {
            return Err(CoreError::NameConflict {
                name: new_name.to_owned(),
            });
        }

        let mut next = effects.clone();
        let effect = next.get_mut(&id).ok_or_else(|| not_found(key))?;
        effect.name = new_name.to_owned();
        let renamed = effect.clone();
        self.persist(&next).await?;
        *effects = next;

        info!(id = %id, name = %new_name, "effect renamed");
        Ok(renamed)
    }

    pub async fn delete(&self, key: &EffectRef) -> Result<Effect, CoreError> {
        let mut effects = self.effects.lock().await;
        let id = resolve(&effects, key)?;

        let mut next = effects.clone();
        let removed = next.shift_remove(&id).ok_or_else(|| not_found(key))?;
        self.persist(&next).await?;
        *effects = next;

        info!(id = %id, name = %removed.name, "effect deleted");
        Ok(removed)
    }

    // ── Persistence ──────────────────────────────────────────────────

    async fn persist(&self, effects: &Effects) -> Result<(), CoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let file = EffectsFile {
            version: FILE_VERSION,
            effects: effects
                .iter()
                .map(|(id, e)| (id.clone(), StoredEffect::from(e)))
                .collect(),
        };
        let bytes =
            serde_json::to_vec_pretty(&file).map_err(|e| CoreError::persistence(path, e))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::persistence(path, e))?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| CoreError::persistence(path, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| CoreError::persistence(path, e))?;

        debug!(path = %path.display(), count = effects.len(), "effect store saved");
        Ok(())
    }
}

fn decode(path: &Path, bytes: &[u8]) -> Result<Effects, CoreError> {
    let file: EffectsFile =
        serde_json::from_slice(bytes).map_err(|e| CoreError::persistence(path, e))?;
    if file.version != FILE_VERSION {
        return Err(CoreError::persistence(
            path,
            format!("unsupported effects file version {}", file.version),
        ));
    }

    // The stored key is not trusted; ids are re-derived from the payload.
    let mut effects = Effects::with_capacity(file.effects.len());
    for (key, stored) in file.effects {
        let id = stored.params.id();
        if stored.plan_type != stored.params.plan_type {
            warn!(
                effect = %key,
                stored = %stored.plan_type,
                params = %stored.params.plan_type,
                "effect plan type disagrees with its parameters"
            );
        }
        if id != key {
            warn!(effect = %key, derived = %id, "effect id does not match its parameters, re-keying");
        }
        if let Some(kept) = effects.get(&id) {
            warn!(effect = %key, duplicate_of = %kept.id, "dropping duplicate effect");
            continue;
        }
        effects.insert(id.clone(), stored.into_effect(id));
    }
    Ok(effects)
}

// ── Lookup ───────────────────────────────────────────────────────────

fn not_found(key: &EffectRef) -> CoreError {
    CoreError::NotFound {
        identifier: key.to_string(),
    }
}

/// Id match first, then a unique name match.
fn resolve(effects: &Effects, key: &EffectRef) -> Result<EffectId, CoreError> {
    let id = EffectId::from(key.as_str());
    if effects.contains_key(&id) {
        return Ok(id);
    }

    let matches: Vec<&EffectId> = effects
        .values()
        .filter(|e| e.name == key.as_str())
        .map(|e| &e.id)
        .collect();
    match matches.as_slice() {
        [] => Err(not_found(key)),
        [only] => Ok((*only).clone()),
        many => Err(CoreError::Ambiguous {
            name: key.to_string(),
            matches: many.iter().map(ToString::to_string).collect(),
        }),
    }
}

/// `"{Plan} {n}"` with the smallest unused `n`.
fn auto_name(effects: &Effects, plan: PlanType) -> String {
    let title = plan.title();
    (1..)
        .map(|n| format!("{title} {n}"))
        .find(|candidate| !effects.values().any(|e| &e.name == candidate))
        .unwrap_or(title)
}

// ── Capture / apply transforms ───────────────────────────────────────

/// Derive the canonical payload from a zone's reported status.
pub fn derive_params(status: &ZoneStatus, zone: &ZoneConfig) -> Result<EffectParams, CoreError> {
    let capture_error = |reason: &str| CoreError::Capture {
        zone: zone.id,
        reason: reason.into(),
    };

    if !status.is_lit() {
        return Err(capture_error("zone is off"));
    }
    let plan_type = PlanType::from_pattern(status.pattern_type())
        .ok_or_else(|| capture_error("controller reported no active pattern"))?;
    let reported = status.colors();
    if reported.is_empty() {
        return Err(capture_error("controller reported no colors"));
    }

    let (colors, layout) = if plan_type == PlanType::Spotlight {
        let buffer = reconstruct(&reported, &zone.spotlight, zone.led_count)?;
        (buffer, Some(zone.spotlight.indices().to_vec()))
    } else {
        (reported, None)
    };

    Ok(EffectParams {
        plan_type,
        pattern: status.pattern_type().to_owned(),
        direction: status.direction().to_owned(),
        speed: status.speed,
        gap: status.gap,
        other: 0,
        pause: 0,
        num_colors: status.number_of_colors.unwrap_or(1),
        colors,
        layout,
    })
}

/// Turn stored params into a write for `zone`, re-deriving the spotlight
/// buffer for that zone's own layout and LED count.
pub fn expand(params: &EffectParams, zone: &ZoneConfig) -> Result<PatternCommand, CoreError> {
    let mut command = params.to_command(zone.id.get());
    if let Some(layout) = &params.layout {
        let slots = compress(&params.colors, &SpotlightPlanMap::new(layout.clone()));
        command.colors = reconstruct(&slots, &zone.spotlight, zone.led_count)?;
    }
    Ok(command)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::ZoneId;
    use oelo_api::Rgb;
    use pretty_assertions::assert_eq;

    fn params(speed: u32) -> EffectParams {
        EffectParams {
            plan_type: PlanType::March,
            pattern: "march".into(),
            direction: "F".into(),
            speed,
            gap: 0,
            other: 0,
            pause: 0,
            num_colors: 1,
            colors: vec![Rgb::new(0, 255, 0)],
            layout: None,
        }
    }

    fn zone(leds: usize) -> ZoneConfig {
        ZoneConfig::with_leds(ZoneId::new(1).unwrap(), leds)
    }

    fn lit(pattern: &str, colors: &str) -> ZoneStatus {
        ZoneStatus {
            pattern: Some(pattern.into()),
            is_on: Some(true),
            color_str: Some(colors.into()),
            number_of_colors: Some(1),
            ..ZoneStatus::off(1)
        }
    }

    #[tokio::test]
    async fn auto_names_fill_the_smallest_gap() {
        let store = EffectStore::in_memory(10);
        let a = store.capture(params(1), None).await.unwrap();
        let b = store.capture(params(2), None).await.unwrap();
        assert_eq!(a.name, "March 1");
        assert_eq!(b.name, "March 2");

        store.delete(&EffectRef::from("March 1")).await.unwrap();
        let c = store.capture(params(3), None).await.unwrap();
        assert_eq!(c.name, "March 1");
    }

    #[tokio::test]
    async fn duplicate_capture_keeps_first_name() {
        let store = EffectStore::in_memory(10);
        let first = store.capture(params(1), Some("Garden".into())).await.unwrap();
        let again = store.capture(params(1), Some("Porch".into())).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_names_make_lookup_ambiguous() {
        let store = EffectStore::in_memory(10);
        store.capture(params(1), Some("Party".into())).await.unwrap();
        let second = store.capture(params(2), Some("Party".into())).await.unwrap();

        let err = store.get(&EffectRef::from("Party")).await.unwrap_err();
        assert!(matches!(err, CoreError::Ambiguous { ref matches, .. } if matches.len() == 2));

        // The id still resolves uniquely.
        let by_id = store.get(&EffectRef::from(&second.id)).await.unwrap();
        assert_eq!(by_id.id, second.id);
    }

    #[tokio::test]
    async fn rename_rejects_a_name_owned_by_another_effect() {
        let store = EffectStore::in_memory(10);
        let a = store.capture(params(1), Some("A".into())).await.unwrap();
        store.capture(params(2), Some("B".into())).await.unwrap();

        let err = store.rename(&EffectRef::from(&a.id), "B").await.unwrap_err();
        assert!(matches!(err, CoreError::NameConflict { .. }));

        // Renaming to its own name is fine.
        store.rename(&EffectRef::from("A"), "A").await.unwrap();
    }

    #[tokio::test]
    async fn missing_effects_are_not_found() {
        let store = EffectStore::in_memory(10);
        let key = EffectRef::from("nope");
        assert!(matches!(store.delete(&key).await, Err(CoreError::NotFound { .. })));
        assert!(matches!(
            store.rename(&key, "x").await,
            Err(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn capacity_is_enforced_without_eviction() {
        let store = EffectStore::in_memory(3);
        for speed in 0..3 {
            store.capture(params(speed), None).await.unwrap();
        }
        let err = store.capture(params(99), None).await.unwrap_err();
        assert!(matches!(err, CoreError::StoreFull { capacity: 3 }));
        assert_eq!(store.len().await, 3);

        // A duplicate of a stored effect is still accepted when full.
        assert!(store.capture(params(0), None).await.is_ok());
    }

    #[test]
    fn derive_refuses_dark_zones() {
        let err = derive_params(&ZoneStatus::off(1), &zone(500)).unwrap_err();
        assert!(matches!(err, CoreError::Capture { .. }));
    }

    #[test]
    fn derive_refuses_empty_color_reports() {
        let err = derive_params(&lit("chase", ""), &zone(500)).unwrap_err();
        assert!(matches!(err, CoreError::Capture { .. }));
    }

    #[test]
    fn spotlight_capture_reconstructs_full_buffer() {
        let zone = zone(500);
        let colors = vec!["9,9,9"; 40].join(",");
        let params = derive_params(&lit("spotlight", &colors), &zone).unwrap();

        assert_eq!(params.plan_type, PlanType::Spotlight);
        assert_eq!(params.colors.len(), 500);
        assert_eq!(params.colors.iter().filter(|c| !c.is_off()).count(), 40);
        assert_eq!(params.layout.as_deref(), Some(zone.spotlight.indices()));
    }

    #[test]
    fn spotlight_expand_follows_target_zone_layout() {
        let source = zone(500);
        let colors = vec!["9,9,9"; 40].join(",");
        let params = derive_params(&lit("spotlight", &colors), &source).unwrap();

        let mut target = ZoneConfig::with_leds(ZoneId::new(2).unwrap(), 20);
        target.spotlight = SpotlightPlanMap::new(vec![0, 19]);
        let command = expand(&params, &target).unwrap();

        assert_eq!(command.zone, 2);
        assert_eq!(command.colors.len(), 20);
        assert_eq!(command.colors[0], Rgb::new(9, 9, 9));
        assert_eq!(command.colors[19], Rgb::new(9, 9, 9));
        assert_eq!(command.colors.iter().filter(|c| !c.is_off()).count(), 2);
    }

    #[test]
    fn plain_expand_keeps_colors() {
        let command = expand(&params(5), &zone(100)).unwrap();
        assert_eq!(command.pattern_type, "march");
        assert_eq!(command.speed, 5);
        assert_eq!(command.colors, vec![Rgb::new(0, 255, 0)]);
    }

    #[tokio::test]
    async fn loading_rekeys_entries_by_their_parameters() {
        let stored = |name: &str, plan_type: PlanType, params: EffectParams| StoredEffect {
            name: name.into(),
            plan_type,
            params,
            captured_at: Utc::now(),
        };
        let file = EffectsFile {
            version: FILE_VERSION,
            effects: IndexMap::from([
                (
                    EffectId::from("march-0000000000000000"),
                    stored("Edited", PlanType::Chase, params(3)),
                ),
                (params(3).id(), stored("Same payload", PlanType::March, params(3))),
                (EffectId::from("renamed"), stored("Slow", PlanType::March, params(4))),
            ]),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("effects.json");
        std::fs::write(&path, serde_json::to_vec(&file).unwrap()).unwrap();

        let store = EffectStore::open(&path, 10).await.unwrap();
        let effects = store.list().await;

        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0].id, params(3).id());
        assert_eq!(effects[0].name, "Edited");
        assert_eq!(effects[0].plan_type(), PlanType::March);
        assert_eq!(effects[1].id, params(4).id());
        assert!(store.contains(&params(4).id()).await);
    }
}
