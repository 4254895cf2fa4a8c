// ── Command dispatch ──
//
// One worker task per zone. Requests for a zone are funnelled through its
// queue, debounced into a single write, sent, and optionally verified by
// re-reading the controller. A zone never has two writes in flight.
//
//   Idle ──request──▶ Debouncing ──quiet period──▶ Sending ──▶ Verifying
//                      ▲    │ request: supersede       │            │
//                      └────┘                          ▼            ▼
//                                                  Applied   Verified / Failed

mod intent;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use oelo_api::{ControllerTransport, MAX_REPORTED_COLORS, PatternCommand, Rgb, ZoneStatus};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use intent::ZoneRequest;
pub(crate) use intent::{Target, ZoneIntent};

use crate::config::{ControllerConfig, ZoneConfig};
use crate::error::CoreError;
use crate::model::{Availability, ZoneId, ZoneState};
use crate::poll::PollCoordinator;
use crate::spotlight::{SpotlightPlanMap, compress};
use crate::store::ZoneRegistry;

const ZONE_QUEUE_SIZE: usize = 32;

/// How a `set_zone` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Written; verification is disabled.
    Applied,
    /// Written and observed on the controller.
    Verified { attempts: u32 },
    /// Replaced by a newer request before it was sent. Nothing was written.
    Superseded,
}

/// Pacing for the zone workers.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub debounce: Duration,
    pub verify: bool,
    pub retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl From<&ControllerConfig> for DispatchSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            debounce: config.debounce,
            verify: config.verify_commands,
            retries: config.verification_retries,
            retry_delay: config.verification_delay,
            timeout: config.verification_timeout,
        }
    }
}

type Responder = oneshot::Sender<Result<CommandOutcome, CoreError>>;

struct Envelope {
    intent: ZoneIntent,
    respond: Responder,
}

/// Routes requests to the per-zone workers. Cheap to clone.
#[derive(Clone)]
pub struct CommandDispatcher {
    senders: Arc<HashMap<ZoneId, mpsc::Sender<Envelope>>>,
}

impl CommandDispatcher {
    /// Spawn one worker per configured zone. Workers stop when `cancel`
    /// fires or every dispatcher clone is dropped.
    pub fn spawn(
        transport: Arc<dyn ControllerTransport>,
        zones: Arc<ZoneRegistry>,
        poll: PollCoordinator,
        configs: &[ZoneConfig],
        settings: &DispatchSettings,
        cancel: &CancellationToken,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let mut senders = HashMap::new();
        let mut handles = Vec::new();

        for config in configs {
            let (tx, rx) = mpsc::channel(ZONE_QUEUE_SIZE);
            let worker = ZoneWorker {
                zone: config.clone(),
                transport: Arc::clone(&transport),
                zones: Arc::clone(&zones),
                poll: poll.clone(),
                settings: settings.clone(),
            };
            handles.push(tokio::spawn(worker.run(rx, cancel.clone())));
            senders.insert(config.id, tx);
        }

        (
            Self {
                senders: Arc::new(senders),
            },
            handles,
        )
    }

    pub(crate) async fn submit(
        &self,
        zone: ZoneId,
        intent: ZoneIntent,
    ) -> Result<CommandOutcome, CoreError> {
        let tx = self
            .senders
            .get(&zone)
            .ok_or(CoreError::UnknownZone { zone: zone.get() })?;

        let (respond, response) = oneshot::channel();
        tx.send(Envelope { intent, respond })
            .await
            .map_err(|_| CoreError::ControllerStopped)?;
        response.await.map_err(|_| CoreError::ControllerStopped)?
    }
}

// ── Zone worker ──────────────────────────────────────────────────────

/// The coalesced request waiting out its quiet period.
struct Pending {
    intent: ZoneIntent,
    respond: Responder,
    deadline: Instant,
}

impl Pending {
    fn supersede(self, newer: Envelope, deadline: Instant) -> Self {
        let _ = self.respond.send(Ok(CommandOutcome::Superseded));
        Self {
            intent: self.intent.merge(newer.intent),
            respond: newer.respond,
            deadline,
        }
    }
}

enum VerifyStop {
    Exhausted,
    Transport(CoreError),
}

struct ZoneWorker {
    zone: ZoneConfig,
    transport: Arc<dyn ControllerTransport>,
    zones: Arc<ZoneRegistry>,
    poll: PollCoordinator,
    settings: DispatchSettings,
}

impl ZoneWorker {
    async fn run(self, mut rx: mpsc::Receiver<Envelope>, cancel: CancellationToken) {
        let zone = self.zone.id;
        let mut pending: Option<Pending> = None;

        loop {
            let Some(deadline) = pending.as_ref().map(|p| p.deadline) else {
                // Idle
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    envelope = rx.recv() => {
                        let Some(envelope) = envelope else { break };
                        debug!(zone = %zone, "debouncing command");
                        pending = Some(Pending {
                            intent: envelope.intent,
                            respond: envelope.respond,
                            deadline: Instant::now() + self.settings.debounce,
                        });
                    }
                }
                continue;
            };

            // Debouncing
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                envelope = rx.recv() => {
                    let Some(envelope) = envelope else { break };
                    debug!(zone = %zone, "command superseded");
                    pending = pending
                        .take()
                        .map(|p| p.supersede(envelope, Instant::now() + self.settings.debounce));
                }
                () = tokio::time::sleep_until(deadline) => {
                    let Some(job) = pending.take() else { continue };
                    // Sending / Verifying. New requests queue in `rx`.
                    let result = tokio::select! {
                        biased;
                        () = cancel.cancelled() => Err(CoreError::ControllerStopped),
                        result = self.execute(&job.intent) => result,
                    };
                    if let Err(e) = &result {
                        warn!(zone = %zone, error = %e, "command failed");
                    }
                    let _ = job.respond.send(result);
                }
            }
        }

        if let Some(job) = pending.take() {
            let _ = job.respond.send(Err(CoreError::ControllerStopped));
        }
        rx.close();
        while let Ok(envelope) = rx.try_recv() {
            let _ = envelope.respond.send(Err(CoreError::ControllerStopped));
        }
        debug!(zone = %zone, "zone worker stopped");
    }

    async fn execute(&self, intent: &ZoneIntent) -> Result<CommandOutcome, CoreError> {
        let zone = self.zone.id;
        let state = self
            .zones
            .get(zone)
            .ok_or(CoreError::UnknownZone { zone: zone.get() })?;
        let rendered = intent.render(&state);

        info!(
            zone = %zone,
            pattern = %rendered.send.pattern_type,
            brightness = rendered.brightness,
            "sending command"
        );
        self.transport.send_command(&rendered.send).await?;
        self.zones.update_zone(zone, |s| {
            s.commanded(
                rendered.base.as_ref(),
                rendered.brightness,
                rendered.effect.clone(),
            )
        });

        if !self.settings.verify {
            return Ok(CommandOutcome::Applied);
        }
        self.verify(&rendered.send).await
    }

    async fn verify(&self, command: &PatternCommand) -> Result<CommandOutcome, CoreError> {
        let zone = self.zone.id;
        let mut attempts = 1u32;

        let verification = async {
            loop {
                tokio::time::sleep(self.settings.retry_delay).await;
                match self.poll.poll_fresh().await {
                    Ok(()) if self.observed_matches(command) => return Ok(()),
                    Ok(()) => debug!(zone = %zone, attempts, "controller state does not match"),
                    Err(e) => debug!(zone = %zone, error = %e, "verification poll failed"),
                }
                if attempts > self.settings.retries {
                    return Err(VerifyStop::Exhausted);
                }
                attempts += 1;
                warn!(zone = %zone, attempt = attempts, "resending unverified command");
                if let Err(e) = self.transport.send_command(command).await {
                    return Err(VerifyStop::Transport(e.into()));
                }
            }
        };
        let result = tokio::time::timeout(self.settings.timeout, verification).await;

        match result {
            Ok(Ok(())) => {
                info!(zone = %zone, attempts, "command verified");
                Ok(CommandOutcome::Verified { attempts })
            }
            Ok(Err(VerifyStop::Transport(e))) => {
                self.mark_unverified();
                Err(e)
            }
            Ok(Err(VerifyStop::Exhausted)) | Err(_) => {
                self.mark_unverified();
                warn!(zone = %zone, attempts, "command could not be verified");
                Err(CoreError::VerificationFailed { zone, attempts })
            }
        }
    }

    /// Only a zone present in the latest report counts as evidence.
    fn observed_matches(&self, command: &PatternCommand) -> bool {
        self.zones
            .get(self.zone.id)
            .filter(|state| state.availability == Availability::Online)
            .and_then(|state| state.last_status.clone())
            .is_some_and(|status| matches_command(&status, command, &self.zone.spotlight))
    }

    fn mark_unverified(&self) {
        self.zones.update_zone(self.zone.id, |s| ZoneState {
            unverified: true,
            ..s.clone()
        });
    }
}

/// Whether a reported status shows `command` in effect. Spotlight writes
/// are compared through the zone's plan map, since the controller only
/// reports the mapped slots.
pub(crate) fn matches_command(
    status: &ZoneStatus,
    command: &PatternCommand,
    spotlight: &SpotlightPlanMap,
) -> bool {
    if command.is_off() {
        return !status.is_lit();
    }
    if !status.is_lit()
        || status.pattern_type() != command.pattern_type
        || status.speed != command.speed
        || status.direction() != command.direction
    {
        return false;
    }

    let expected: Vec<Rgb> = if command.pattern_type == "spotlight" {
        compress(&command.colors, spotlight)
    } else {
        command.colors.clone()
    };
    let observed = status.colors();
    let n = expected.len().min(observed.len()).min(MAX_REPORTED_COLORS);
    if n == 0 {
        return expected.is_empty();
    }
    observed[..n] == expected[..n]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reported(pattern: &str, colors: &str) -> ZoneStatus {
        ZoneStatus {
            pattern: Some(pattern.into()),
            is_on: Some(true),
            color_str: Some(colors.into()),
            ..ZoneStatus::off(1)
        }
    }

    #[test]
    fn off_matches_dark_zone() {
        let map = SpotlightPlanMap::new(vec![]);
        assert!(matches_command(
            &ZoneStatus::off(1),
            &PatternCommand::off(1),
            &map
        ));
        assert!(!matches_command(
            &reported("custom", "1,1,1"),
            &PatternCommand::off(1),
            &map
        ));
    }

    #[test]
    fn solid_color_must_match_reported_prefix() {
        let map = SpotlightPlanMap::new(vec![]);
        let cmd = PatternCommand::solid(1, Rgb::new(10, 20, 30));
        assert!(matches_command(&reported("custom", "10,20,30"), &cmd, &map));
        assert!(!matches_command(&reported("custom", "10,20,31"), &cmd, &map));
        assert!(!matches_command(&reported("chase", "10,20,30"), &cmd, &map));
        assert!(!matches_command(&reported("custom", ""), &cmd, &map));
    }

    #[test]
    fn spotlight_compares_mapped_slots() {
        let map = SpotlightPlanMap::new(vec![1, 3]);
        let mut colors = vec![Rgb::OFF; 5];
        colors[1] = Rgb::new(5, 5, 5);
        colors[3] = Rgb::new(6, 6, 6);
        let cmd = PatternCommand {
            pattern_type: "spotlight".into(),
            colors,
            ..PatternCommand::off(1)
        };
        assert!(matches_command(&reported("spotlight", "5,5,5,6,6,6"), &cmd, &map));
        assert!(!matches_command(&reported("spotlight", "0,0,0,5,5,5"), &cmd, &map));
    }
}
