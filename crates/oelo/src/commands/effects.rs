//! Effect library command handlers.

use tabled::Tabled;

use oelo_core::{Controller, Effect, ZoneRequest};

use crate::cli::{EffectsArgs, EffectsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EffectRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Plan")]
    plan: String,
    #[tabled(rename = "Colors")]
    colors: String,
    #[tabled(rename = "Captured")]
    captured: String,
}

impl From<&Effect> for EffectRow {
    fn from(e: &Effect) -> Self {
        Self {
            id: e.id.to_string(),
            name: e.name.clone(),
            plan: e.plan_type().to_string(),
            colors: lit_colors(e).to_string(),
            captured: e.captured_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

fn lit_colors(effect: &Effect) -> usize {
    effect.params.colors.iter().filter(|c| !c.is_off()).count()
}

fn detail(e: &Effect) -> String {
    let mut lines = vec![
        format!("ID:          {}", e.id),
        format!("Name:        {}", e.name),
        format!("Plan:        {}", e.plan_type()),
        format!("Direction:   {}", e.params.direction),
        format!("Speed:       {}", e.params.speed),
        format!("Gap:         {}", e.params.gap),
        format!(
            "Colors:      {} ({} lit)",
            e.params.colors.len(),
            lit_colors(e)
        ),
    ];
    if let Some(layout) = &e.params.layout {
        lines.push(format!("Spotlight:   {} mapped LEDs", layout.len()));
    }
    lines.push(format!(
        "Captured:    {}",
        e.captured_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: EffectsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        EffectsCommand::List => {
            let effects = controller.list_effects().await;
            let out = output::render_list(
                &global.output,
                &effects,
                |e| EffectRow::from(e),
                |e| e.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EffectsCommand::Show { effect } => {
            let effect = controller.get_effect(effect.as_str()).await?;
            let out = output::render_single(&global.output, &effect, detail, |e| e.id.to_string());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EffectsCommand::Capture { zone, name } => {
            let effect = controller
                .capture_effect(util::zone_id(zone)?, name)
                .await?;
            let out = output::render_single(&global.output, &effect, detail, |e| e.id.to_string());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        EffectsCommand::Apply {
            effect,
            zones,
            brightness,
        } => {
            let zones = util::zones_or_all(controller, &zones)?;
            // Resolve once so a bad name fails before anything is sent.
            let effect = controller.get_effect(effect.as_str()).await?;
            let request = ZoneRequest {
                power: Some(true),
                brightness,
                ..ZoneRequest::effect(&effect.id)
            };
            util::apply_to_zones(controller, zones, &request, global).await
        }

        EffectsCommand::Rename { effect, name } => {
            let renamed = controller.rename_effect(effect.as_str(), &name).await?;
            if !global.quiet {
                eprintln!("Effect {} renamed to '{}'", renamed.id, renamed.name);
            }
            Ok(())
        }

        EffectsCommand::Delete { effect } => {
            let removed = controller.delete_effect(effect.as_str()).await?;
            if !global.quiet {
                eprintln!("Effect '{}' deleted", removed.name);
            }
            Ok(())
        }
    }
}
