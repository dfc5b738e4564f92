// Copyright 2018-2024 the Deno authors. MIT license.

mod args;
mod cd;
mod exit;
mod help;

use std::collections::HashMap;
use std::rc::Rc;

pub use args::parse_arg_kinds;
pub use args::ArgKind;

use super::types::ExecuteResult;
use super::types::ShellPipeReader;
use super::types::ShellPipeWriter;
use super::types::ShellState;

pub fn builtin_commands() -> HashMap<String, Rc<dyn ShellCommand>> {
  HashMap::from([
    (
      "cd".to_string(),
      Rc::new(cd::CdCommand) as Rc<dyn ShellCommand>,
    ),
    (
      "exit".to_string(),
      Rc::new(exit::ExitCommand) as Rc<dyn ShellCommand>,
    ),
    (
      "help".to_string(),
      Rc::new(help::HelpCommand) as Rc<dyn ShellCommand>,
    ),
  ])
}

/// Everything an in-process command may touch. The streams already have
/// the stage's redirections applied.
pub struct ShellCommandContext {
  pub args: Vec<String>,
  pub state: ShellState,
  pub stdin: ShellPipeReader,
  pub stdout: ShellPipeWriter,
  pub stderr: ShellPipeWriter,
}

/// A command that runs inside the shell process.
///
/// Execution is synchronous: the shell does not read its next line until
/// the command returns, and any directory change it reports is applied by
/// the caller.
pub trait ShellCommand {
  fn execute(&self, context: ShellCommandContext) -> ExecuteResult;

  /// Arguments shown after the name by `help`, ex. `[dir]`.
  fn usage(&self) -> &str {
    ""
  }

  /// One line shown by `help`.
  fn description(&self) -> &str {
    ""
  }
}
