// ── Controller context ──
//
// One `Controller` per physical device. It owns the transport, the zone
// registry, the effect store, the poller and the per-zone workers, and it
// is the only surface adapters talk to.

use std::sync::Arc;
use std::time::Duration;

use oelo_api::{ControllerClient, ControllerTransport, PatternCommand, TransportConfig};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ControllerConfig, MAX_EFFECTS, ZoneConfig};
use crate::dispatch::{
    CommandDispatcher, CommandOutcome, DispatchSettings, Target, ZoneIntent, ZoneRequest,
};
use crate::error::CoreError;
use crate::model::{Availability, Effect, EffectRef, ZoneId, ZoneState};
use crate::poll::{PollCoordinator, PollStatus};
use crate::store::{EffectStore, ZoneRegistry, ZoneSnapshot, derive_params};

/// Entry point for adapters.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Background tasks run
/// until [`shutdown()`](Self::shutdown) or until the last clone is dropped.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    zones: Arc<ZoneRegistry>,
    effects: Arc<EffectStore>,
    poll: PollCoordinator,
    dispatcher: CommandDispatcher,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Controller {
    /// Talk to the controller at `config.url` over HTTP.
    pub async fn connect(config: ControllerConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig::with_timeout(config.timeout);
        let client = ControllerClient::new(config.url.clone(), &transport)?;
        Self::with_transport(config, Arc::new(client)).await
    }

    /// Build the engine over any transport, load the effect store, run a
    /// first poll and start the background tasks.
    ///
    /// A failed first poll is not an error: zones stay `unknown` until a
    /// later poll succeeds.
    pub async fn with_transport(
        config: ControllerConfig,
        transport: Arc<dyn ControllerTransport>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let effects = Arc::new(match &config.effects_path {
            Some(path) => EffectStore::open(path, MAX_EFFECTS).await?,
            None => EffectStore::in_memory(MAX_EFFECTS),
        });
        let zones = Arc::new(ZoneRegistry::new(&config.zones));
        let poll = PollCoordinator::new(
            Arc::clone(&transport),
            Arc::clone(&zones),
            Arc::clone(&effects),
            &config.zones,
            config.failure_threshold,
        );

        let cancel = CancellationToken::new();
        let (dispatcher, mut handles) = CommandDispatcher::spawn(
            transport,
            Arc::clone(&zones),
            poll.clone(),
            &config.zones,
            &DispatchSettings::from(&config),
            &cancel,
        );

        if let Err(e) = poll.poll().await {
            warn!(error = %e, "initial poll failed");
        }
        if config.auto_poll && !config.poll_interval.is_zero() {
            handles.push(tokio::spawn(poll_task(
                poll.clone(),
                config.poll_interval,
                cancel.clone(),
            )));
        }

        info!(url = %config.url, zones = config.zones.len(), "controller started");
        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                zones,
                effects,
                poll,
                dispatcher,
                cancel,
                task_handles: Mutex::new(handles),
            }),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    // ── Zone reads ───────────────────────────────────────────────────

    /// Last-known state of `zone`. Never touches the network.
    pub fn get_zone_state(&self, zone: ZoneId) -> Result<Arc<ZoneState>, CoreError> {
        self.inner
            .zones
            .get(zone)
            .ok_or(CoreError::UnknownZone { zone: zone.get() })
    }

    pub fn zones(&self) -> ZoneSnapshot {
        self.inner.zones.snapshot()
    }

    /// Receive every new zone snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ZoneSnapshot> {
        self.inner.zones.subscribe()
    }

    pub fn poll_status(&self) -> PollStatus {
        self.inner.poll.status()
    }

    /// Poll now, joining a poll already in flight.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.ensure_running()?;
        self.inner.poll.poll().await
    }

    // ── Zone writes ──────────────────────────────────────────────────

    /// Queue a change for `zone`. Resolves once the coalesced write has
    /// been sent (and verified, if enabled) or superseded.
    pub async fn set_zone(
        &self,
        zone: ZoneId,
        request: ZoneRequest,
    ) -> Result<CommandOutcome, CoreError> {
        self.ensure_running()?;
        let zone_config = self.zone_config(zone)?;

        let target = if request.power == Some(false) {
            Target::Off
        } else if let Some(color) = request.color {
            Target::Pattern {
                base: PatternCommand::solid(zone.get(), color.to_rgb()),
                effect: None,
            }
        } else if let Some(key) = &request.effect {
            let (id, base) = self.inner.effects.command_for(key, zone_config).await?;
            Target::Pattern {
                base,
                effect: Some(id),
            }
        } else {
            Target::Resume
        };

        self.inner
            .dispatcher
            .submit(zone, ZoneIntent::new(target, request.brightness))
            .await
    }

    pub async fn apply_effect(
        &self,
        zone: ZoneId,
        effect: impl Into<EffectRef>,
    ) -> Result<CommandOutcome, CoreError> {
        self.set_zone(zone, ZoneRequest::effect(effect)).await
    }

    /// Apply an effect and make sure the zone ends up on, even when it
    /// was switched off while the request was pending.
    pub async fn on_and_apply_effect(
        &self,
        zone: ZoneId,
        effect: impl Into<EffectRef>,
    ) -> Result<CommandOutcome, CoreError> {
        let request = ZoneRequest {
            power: Some(true),
            ..ZoneRequest::effect(effect)
        };
        self.set_zone(zone, request).await
    }

    // ── Effects ──────────────────────────────────────────────────────

    /// Read the zone's current pattern from the controller and store it.
    /// Capturing an unchanged pattern again returns the stored effect.
    pub async fn capture_effect(
        &self,
        zone: ZoneId,
        name: Option<String>,
    ) -> Result<Effect, CoreError> {
        self.ensure_running()?;
        let zone_config = self.zone_config(zone)?;

        self.inner.poll.poll_fresh().await?;
        let state = self.get_zone_state(zone)?;
        let status = Some(state)
            .filter(|s| s.availability == Availability::Online)
            .and_then(|s| s.last_status.clone())
            .ok_or_else(|| CoreError::Capture {
                zone,
                reason: "controller did not report this zone".into(),
            })?;

        let params = derive_params(&status, zone_config)?;
        let effect = self.inner.effects.capture(params, name).await?;

        // The zone is showing this effect right now.
        let id = effect.id.clone();
        self.inner.zones.update_zone(zone, |s| ZoneState {
            effect: Some(id.clone()),
            ..s.clone()
        });
        Ok(effect)
    }

    pub async fn rename_effect(
        &self,
        effect: impl Into<EffectRef>,
        new_name: &str,
    ) -> Result<Effect, CoreError> {
        self.inner.effects.rename(&effect.into(), new_name).await
    }

    pub async fn delete_effect(&self, effect: impl Into<EffectRef>) -> Result<Effect, CoreError> {
        let removed = self.inner.effects.delete(&effect.into()).await?;
        self.inner.zones.update_all(|zones| {
            zones
                .iter()
                .map(|(id, state)| {
                    let next = if state.effect.as_ref() == Some(&removed.id) {
                        Arc::new(ZoneState {
                            effect: None,
                            ..(**state).clone()
                        })
                    } else {
                        Arc::clone(state)
                    };
                    (*id, next)
                })
                .collect()
        });
        Ok(removed)
    }

    pub async fn list_effects(&self) -> Vec<Effect> {
        self.inner.effects.list().await
    }

    pub async fn get_effect(&self, effect: impl Into<EffectRef>) -> Result<Effect, CoreError> {
        self.inner.effects.get(&effect.into()).await
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Stop every background task. Pending commands resolve with
    /// [`CoreError::ControllerStopped`].
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("controller stopped");
    }

    fn ensure_running(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            Err(CoreError::ControllerStopped)
        } else {
            Ok(())
        }
    }

    fn zone_config(&self, zone: ZoneId) -> Result<&ZoneConfig, CoreError> {
        self.inner
            .config
            .zone(zone)
            .ok_or(CoreError::UnknownZone { zone: zone.get() })
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Poll on a fixed interval.
async fn poll_task(poll: PollCoordinator, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // the first tick is immediate; startup already polled

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    result = poll.poll() => {
                        if let Err(e) = result {
                            debug!(error = %e, "scheduled poll failed");
                        }
                    }
                }
            }
        }
    }
}
