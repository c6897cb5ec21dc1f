//! Command dispatch: bridges CLI args to the reconciliation engine and output formatting.

pub mod apply;
pub mod config_cmd;
pub mod delete;
pub mod import;
pub mod plan;
pub mod read;
pub mod state_cmd;
pub mod util;

use filterctl_config::Config;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a manifest, state, or router command to its handler.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Plan(args) => plan::handle(&args, global, cfg),
        Command::Apply(args) => apply::handle(&args, global, cfg).await,
        Command::Read(args) => read::handle(&args, global, cfg).await,
        Command::Delete(args) => delete::handle(&args, global, cfg).await,
        Command::Import(args) => import::handle(&args, global, cfg).await,
        Command::State(args) => state_cmd::handle(&args, global, cfg),
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
