//! `oelo watch`: follow zone changes until interrupted.

use std::sync::Arc;

use chrono::Local;

use oelo_core::{Controller, ZoneState};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub async fn run(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut rx = controller.subscribe();

    let mut last = rx.borrow_and_update().clone();
    for state in last.values() {
        print_state(state, global, color);
    }

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                for (zone, state) in snapshot.iter() {
                    if last.get(zone).is_none_or(|prev| visible_change(prev, state)) {
                        print_state(state, global, color);
                    }
                }
                last = snapshot;
            }
        }
    }
    Ok(())
}

/// Ignore snapshots that only moved the timestamp.
fn visible_change(prev: &ZoneState, next: &ZoneState) -> bool {
    prev.is_on != next.is_on
        || prev.color != next.color
        || prev.pattern_type != next.pattern_type
        || prev.brightness != next.brightness
        || prev.effect != next.effect
        || prev.availability != next.availability
}

fn print_state(state: &Arc<ZoneState>, global: &GlobalOpts, color: bool) {
    if global.quiet {
        return;
    }
    let line = match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            output::render_single(&OutputFormat::JsonCompact, state, |_| String::new(), |_| {
                String::new()
            })
        }
        OutputFormat::Table | OutputFormat::Plain => format!(
            "{} zone {} {:<3} {:<10} {:<11} {}",
            Local::now().format("%H:%M:%S"),
            state.zone,
            if state.is_on { "on" } else { "off" },
            state.pattern_type,
            state.color.to_string(),
            output::availability(state.availability, color),
        ),
    };
    output::print_output(&line, false);
}
