//! Command handlers, one module per command group.

pub mod effects;
pub mod watch;
pub mod zones;

mod util;

use oelo_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status(args) => zones::status(controller, &args, global).await,
        Command::Set(args) => zones::set(controller, &args, global).await,
        Command::On(args) => zones::power(controller, &args, true, global).await,
        Command::Off(args) => zones::power(controller, &args, false, global).await,
        Command::Effects(args) => effects::handle(controller, args, global).await,
        Command::Watch(_) => watch::run(controller, global).await,
        // Generated before a controller is built.
        Command::Completions(_) => Ok(()),
    }
}
