//! Command dispatch: bridges CLI args -> workflow steps -> output formatting.

pub mod check;
pub mod script;
pub mod settings_cmd;
pub mod steps;

use sir_core::Step;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a document-bound command to the appropriate handler.
pub fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Key => steps::handle(Step::Key, global),
        Command::Cert => steps::handle(Step::Cert, global),
        Command::AddTlsa => steps::handle(Step::AddTlsa, global),
        Command::Rollover => steps::handle(Step::Rollover, global),
        Command::UpdateTlsa => steps::handle(Step::UpdateTlsa, global),
        Command::Phase1 => steps::handle(Step::Phase1, global),
        Command::Phase2 => steps::handle(Step::Phase2, global),
        Command::Full => steps::handle(Step::Full, global),
        Command::Check => check::handle(global),
        Command::Script(args) => script::handle(&args, global),
        // Settings and Completions are handled before dispatch
        Command::Settings(_) | Command::Completions(_) => unreachable!(),
    }
}
