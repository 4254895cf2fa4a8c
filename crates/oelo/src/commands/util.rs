//! Shared helpers for command handlers.

use oelo_core::{CommandOutcome, Controller, ZoneId, ZoneRequest};
use tokio::task::JoinSet;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Validate a zone number from the command line.
pub fn zone_id(zone: u8) -> Result<ZoneId, CliError> {
    ZoneId::new(zone).map_err(|_| CliError::Validation {
        field: "zone".into(),
        reason: format!("{zone} is not a zone number (1-{})", ZoneId::MAX),
    })
}

/// The requested zones, or every configured zone when none were given.
pub fn zones_or_all(controller: &Controller, zones: &[u8]) -> Result<Vec<ZoneId>, CliError> {
    if zones.is_empty() {
        return Ok(controller.config().zones.iter().map(|z| z.id).collect());
    }
    zones.iter().map(|&z| zone_id(z)).collect()
}

/// Send `request` to every zone at once and report each result. The first
/// failure is returned after all zones have finished.
pub async fn apply_to_zones(
    controller: &Controller,
    zones: Vec<ZoneId>,
    request: &ZoneRequest,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut tasks = JoinSet::new();
    for zone in zones {
        let controller = controller.clone();
        let request = request.clone();
        tasks.spawn(async move { (zone, controller.set_zone(zone, request).await) });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((zone, Ok(outcome))) => report(zone, outcome, global),
            Ok((zone, Err(e))) => {
                tracing::debug!(zone = %zone, error = %e, "zone command failed");
                first_error.get_or_insert(CliError::from(e));
            }
            Err(e) => {
                first_error.get_or_insert(CliError::Internal {
                    message: format!("zone task failed: {e}"),
                });
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

pub fn report(zone: ZoneId, outcome: CommandOutcome, global: &GlobalOpts) {
    if global.quiet {
        return;
    }
    match outcome {
        CommandOutcome::Applied => eprintln!("Zone {zone} updated"),
        CommandOutcome::Verified { attempts } => {
            eprintln!("Zone {zone} updated and verified ({attempts} attempt(s))");
        }
        CommandOutcome::Superseded => eprintln!("Zone {zone}: replaced by a newer command"),
    }
}
