mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use oelo_core::Controller;

use crate::cli::{Cli, Command, EffectsCommand};
use crate::config::Mode;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "oelo", &mut std::io::stdout());
            Ok(())
        }

        // All other commands run against a controller
        cmd => {
            let mode = match &cmd {
                Command::Watch(args) => Mode::Watch {
                    interval: Duration::from_secs(args.interval.max(1)),
                },
                _ => Mode::OneShot,
            };
            let controller_config = config::build_controller_config(&cli.global, mode)?;
            let controller = Controller::connect(controller_config).await?;

            // The startup poll only logs failures. Commands that act on the
            // device retry once so the real error reaches the user.
            if needs_device(&cmd) && controller.poll_status().last_success.is_none() {
                if let Err(e) = controller.refresh().await {
                    controller.shutdown().await;
                    return Err(e.into());
                }
            }

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &controller, &cli.global).await;
            controller.shutdown().await;
            result
        }
    }
}

/// Library maintenance works without a reachable controller.
fn needs_device(cmd: &Command) -> bool {
    !matches!(
        cmd,
        Command::Watch(_)
            | Command::Effects(cli::EffectsArgs {
                command: EffectsCommand::List
                    | EffectsCommand::Show { .. }
                    | EffectsCommand::Rename { .. }
                    | EffectsCommand::Delete { .. }
            })
    )
}
