// Copyright 2018-2024 the Deno authors. MIT license.

use crate::shell::types::ExecuteResult;

use super::ShellCommand;
use super::ShellCommandContext;

pub struct HelpCommand;

impl ShellCommand for HelpCommand {
  fn description(&self) -> &str {
    "Show this help"
  }

  fn execute(&self, mut context: ShellCommandContext) -> ExecuteResult {
    let mut text = String::from(concat!(
      "pipesh: a minimal shell\n",
      "Type program names and arguments, and hit enter.\n",
      "Stages are joined with `|`, `< file` and `> file` redirect a stage,\n",
      "and a trailing `&` runs the pipeline in the background.\n",
      "The following are built in:\n",
    ));
    for name in context.state.command_names() {
      if let Some(command) = context.state.resolve_command(name) {
        text.push_str(&help_line(name, command.as_ref()));
      }
    }
    text.push_str("Use the man command for information on other programs.\n");

    match context.stdout.write_all(text.as_bytes()) {
      Ok(()) => ExecuteResult::from_exit_code(0),
      Err(err) => {
        let _ = context.stderr.write_line(&format!("help: {err}"));
        ExecuteResult::from_exit_code(1)
      }
    }
  }
}

/// `  name usage   - description`, with the descriptions aligned.
fn help_line(name: &str, command: &dyn ShellCommand) -> String {
  let synopsis = match command.usage() {
    "" => name.to_string(),
    usage => format!("{name} {usage}"),
  };
  match command.description() {
    "" => format!("  {synopsis}\n"),
    description => format!("  {synopsis:<15} - {description}\n"),
  }
}
