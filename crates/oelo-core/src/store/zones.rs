// ── Zone registry ──
//
// Lock-free holder of every zone's last-known state. Readers load an
// `Arc` snapshot; writers swap in a whole new map, so a poll cycle lands
// for all zones at once or not at all.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;

use crate::config::ZoneConfig;
use crate::model::{ZoneId, ZoneState};

/// Immutable view of every configured zone.
pub type ZoneSnapshot = Arc<BTreeMap<ZoneId, Arc<ZoneState>>>;

pub struct ZoneRegistry {
    zones: ArcSwap<BTreeMap<ZoneId, Arc<ZoneState>>>,
    changes: watch::Sender<ZoneSnapshot>,
}

impl ZoneRegistry {
    pub fn new(configs: &[ZoneConfig]) -> Self {
        let map: BTreeMap<_, _> = configs
            .iter()
            .map(|cfg| (cfg.id, Arc::new(ZoneState::new(cfg.id, cfg.led_count))))
            .collect();
        let map = Arc::new(map);
        let (changes, _) = watch::channel(Arc::clone(&map));
        Self {
            zones: ArcSwap::new(map),
            changes,
        }
    }

    pub fn get(&self, zone: ZoneId) -> Option<Arc<ZoneState>> {
        self.zones.load().get(&zone).cloned()
    }

    pub fn snapshot(&self) -> ZoneSnapshot {
        self.zones.load_full()
    }

    pub fn ids(&self) -> Vec<ZoneId> {
        self.zones.load().keys().copied().collect()
    }

    /// Receive a new snapshot every time any zone changes.
    pub fn subscribe(&self) -> watch::Receiver<ZoneSnapshot> {
        self.changes.subscribe()
    }

    /// Replace one zone's state. `f` may run more than once under
    /// contention and must not have side effects.
    pub(crate) fn update_zone(&self, zone: ZoneId, f: impl Fn(&ZoneState) -> ZoneState) {
        self.update_all(|zones| {
            let mut next = zones.clone();
            if let Some(state) = next.get_mut(&zone) {
                *state = Arc::new(f(state));
            }
            next
        });
    }

    /// Replace every zone in one swap.
    pub(crate) fn update_all(
        &self,
        f: impl Fn(&BTreeMap<ZoneId, Arc<ZoneState>>) -> BTreeMap<ZoneId, Arc<ZoneState>>,
    ) {
        self.zones.rcu(|current| Arc::new(f(current)));
        self.changes.send_replace(self.zones.load_full());
    }
}
