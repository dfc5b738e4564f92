// Copyright 2018-2024 the Deno authors. MIT license.

use miette::bail;
use miette::Result;

use crate::shell::types::ExecuteResult;

use super::args::parse_arg_kinds;
use super::args::ArgKind;
use super::ShellCommand;
use super::ShellCommandContext;

pub struct ExitCommand;

impl ShellCommand for ExitCommand {
  fn usage(&self) -> &str {
    "[code]"
  }

  fn description(&self) -> &str {
    "Leave the shell"
  }

  fn execute(&self, mut context: ShellCommandContext) -> ExecuteResult {
    match parse_args(&context.args) {
      Ok(code) => ExecuteResult::Exit(code, Vec::new()),
      Err(ExitArgError::TooMany) => {
        let _ = context.stderr.write_line("exit: too many arguments");
        ExecuteResult::from_exit_code(1)
      }
      Err(ExitArgError::Invalid(err)) => {
        let _ = context.stderr.write_line(&format!("exit: {err}"));
        ExecuteResult::Exit(2, Vec::new())
      }
    }
  }
}

#[derive(Debug)]
enum ExitArgError {
  /// The shell keeps running.
  TooMany,
  /// The shell still exits, with status 2.
  Invalid(miette::Report),
}

fn parse_args(args: &[String]) -> Result<i32, ExitArgError> {
  let mut codes = Vec::new();
  for arg in parse_arg_kinds(args) {
    match arg {
      ArgKind::Arg(arg) => codes.push(arg),
      _ => arg.bail_unsupported().map_err(ExitArgError::Invalid)?,
    }
  }

  match codes.as_slice() {
    [] => Ok(0),
    [code] => parse_code(code).map_err(ExitArgError::Invalid),
    _ => Err(ExitArgError::TooMany),
  }
}

fn parse_code(code: &str) -> Result<i32> {
  match code.parse::<i64>() {
    // exit statuses are truncated to a byte, like other shells do
    Ok(value) => Ok((value & 0xff) as i32),
    Err(_) => bail!("{}: numeric argument required", code),
  }
}
