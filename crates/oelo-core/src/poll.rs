// ── Poll coordination ──
//
// One `/getController` round trip refreshes every zone. Concurrent
// triggers share the in-flight request; results land in the registry in a
// single swap. Failures are counted and only ever show up as availability
// changes on the zones.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use oelo_api::{ControllerTransport, ZoneStatus};
use tracing::{debug, info, warn};

use crate::config::ZoneConfig;
use crate::error::CoreError;
use crate::model::{Availability, EffectId, ZoneId};
use crate::store::{EffectStore, ZoneRegistry, derive_params};

type PollFuture = Shared<BoxFuture<'static, Result<(), CoreError>>>;

/// Observable poller state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStatus {
    pub polling: bool,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct PollState {
    /// Sequence number of the most recently started poll.
    started: u64,
    /// Sequence number of the most recently applied successful poll.
    applied: u64,
    in_flight: Option<(u64, PollFuture)>,
    consecutive_failures: u32,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Single-flight poller shared by the periodic task, refresh requests and
/// command verification. Cheap to clone.
#[derive(Clone)]
pub struct PollCoordinator {
    inner: Arc<PollInner>,
}

struct PollInner {
    transport: Arc<dyn ControllerTransport>,
    zones: Arc<ZoneRegistry>,
    effects: Arc<EffectStore>,
    configs: HashMap<ZoneId, ZoneConfig>,
    failure_threshold: u32,
    state: Mutex<PollState>,
}

impl PollCoordinator {
    pub fn new(
        transport: Arc<dyn ControllerTransport>,
        zones: Arc<ZoneRegistry>,
        effects: Arc<EffectStore>,
        configs: &[ZoneConfig],
        failure_threshold: u32,
    ) -> Self {
        Self {
            inner: Arc::new(PollInner {
                transport,
                zones,
                effects,
                configs: configs.iter().map(|c| (c.id, c.clone())).collect(),
                failure_threshold: failure_threshold.max(1),
                state: Mutex::new(PollState::default()),
            }),
        }
    }

    /// Poll now, or wait on the poll already in flight.
    pub async fn poll(&self) -> Result<(), CoreError> {
        let future = self.join_or_start(0);
        future.await
    }

    /// Poll with a request that starts after this call. An older
    /// in-flight poll may have read the device before a write landed, so
    /// it is never joined.
    pub async fn poll_fresh(&self) -> Result<(), CoreError> {
        let min_seq = self.inner.lock().started + 1;
        let future = self.join_or_start(min_seq);
        future.await
    }

    pub fn status(&self) -> PollStatus {
        let state = self.inner.lock();
        PollStatus {
            polling: state
                .in_flight
                .as_ref()
                .is_some_and(|(_, f)| f.peek().is_none()),
            consecutive_failures: state.consecutive_failures,
            last_success: state.last_success,
            last_error: state.last_error.clone(),
        }
    }

    fn join_or_start(&self, min_seq: u64) -> PollFuture {
        let mut state = self.inner.lock();
        if let Some((seq, future)) = &state.in_flight {
            if *seq >= min_seq && future.peek().is_none() {
                debug!(seq, "joining in-flight poll");
                return future.clone();
            }
        }

        state.started += 1;
        let seq = state.started;
        let future = PollInner::run(Arc::clone(&self.inner), seq).boxed().shared();
        state.in_flight = Some((seq, future.clone()));
        future
    }
}

impl PollInner {
    fn lock(&self) -> MutexGuard<'_, PollState> {
        self.state.lock().expect("poll state lock poisoned")
    }

    async fn run(self: Arc<Self>, seq: u64) -> Result<(), CoreError> {
        debug!(seq, "polling controller");
        match self.transport.query_status().await {
            Ok(statuses) => {
                self.apply_success(seq, statuses).await;
                Ok(())
            }
            Err(e) => {
                let err = CoreError::from(e);
                self.record_failure(seq, &err);
                Err(err)
            }
        }
    }

    async fn apply_success(&self, seq: u64, statuses: Vec<ZoneStatus>) {
        let by_zone: BTreeMap<ZoneId, ZoneStatus> = statuses
            .into_iter()
            .filter_map(|s| ZoneId::new(s.num).ok().map(|id| (id, s)))
            .filter(|(id, _)| self.configs.contains_key(id))
            .collect();

        let mut recognized: HashMap<ZoneId, EffectId> = HashMap::new();
        for (id, status) in &by_zone {
            let Some(config) = self.configs.get(id) else {
                continue;
            };
            if let Ok(params) = derive_params(status, config) {
                let effect_id = params.id();
                if self.effects.contains(&effect_id).await {
                    recognized.insert(*id, effect_id);
                }
            }
        }

        let mut state = self.lock();
        if seq < state.applied {
            debug!(seq, applied = state.applied, "discarding stale poll result");
            return;
        }
        state.applied = seq;
        if state.consecutive_failures > 0 {
            info!(
                failures = state.consecutive_failures,
                "controller reachable again"
            );
        }
        state.consecutive_failures = 0;
        state.last_success = Some(Utc::now());
        state.last_error = None;

        self.zones.update_all(|zones| {
            zones
                .iter()
                .map(|(id, current)| {
                    let next = match by_zone.get(id) {
                        Some(status) => current.observed(status, recognized.get(id).cloned()),
                        None => current.missing(),
                    };
                    (*id, Arc::new(next))
                })
                .collect()
        });

        for id in self.configs.keys() {
            if !by_zone.contains_key(id) {
                warn!(zone = %id, "zone missing from controller status");
            }
        }
        debug!(seq, zones = by_zone.len(), "poll applied");
    }

    fn record_failure(&self, seq: u64, err: &CoreError) {
        let mut state = self.lock();
        if seq < state.applied {
            debug!(seq, applied = state.applied, error = %err, "ignoring stale poll failure");
            return;
        }
        state.consecutive_failures += 1;
        state.last_error = Some(err.to_string());
        let failures = state.consecutive_failures;
        warn!(error = %err, failures, "controller poll failed");

        let downgrade = if failures >= self.failure_threshold.saturating_mul(2) {
            Some(Availability::Offline)
        } else if failures >= self.failure_threshold {
            Some(Availability::Unknown)
        } else {
            None
        };
        let Some(target) = downgrade else {
            return;
        };

        // Unknown never upgrades a zone that is already offline.
        let needs_change = |current: Availability| {
            current != target
                && !(target == Availability::Unknown && current == Availability::Offline)
        };
        if !self
            .zones
            .snapshot()
            .values()
            .any(|z| needs_change(z.availability))
        {
            return;
        }

        info!(failures, availability = %target, "downgrading zone availability");
        self.zones.update_all(|zones| {
            zones
                .iter()
                .map(|(id, zone)| {
                    let next = if needs_change(zone.availability) {
                        Arc::new(zone.with_availability(target))
                    } else {
                        Arc::clone(zone)
                    };
                    (*id, next)
                })
                .collect()
        });
    }
}
