// Copyright 2018-2024 the Deno authors. MIT license.

use std::path::Path;
use std::path::PathBuf;

use miette::bail;
use miette::Result;
use path_dedot::ParseDot;

use crate::shell::types::EnvChange;
use crate::shell::types::ExecuteResult;

use super::args::parse_arg_kinds;
use super::args::ArgKind;
use super::ShellCommand;
use super::ShellCommandContext;

pub struct CdCommand;

/// Home directory used by `cd` without arguments. Falls back to
/// `/home/$USER` when the platform lookup fails.
fn home_dir(user: Option<&String>) -> Result<PathBuf> {
  if let Some(home) = dirs::home_dir() {
    return Ok(home);
  }
  match user {
    Some(user) if !user.is_empty() => Ok(Path::new("/home").join(user)),
    _ => bail!("Home directory not found"),
  }
}

fn resolve_directory(
  dir: &str,
  cwd: &Path,
  prev_cwd: Option<&PathBuf>,
  user: Option<&String>,
) -> Result<PathBuf> {
  match dir {
    "-" => Ok(
      prev_cwd
        .ok_or_else(|| miette::miette!("No previous directory"))?
        .to_path_buf(),
    ),
    "~" => home_dir(user),
    _ if dir.starts_with("~/") => Ok(home_dir(user)?.join(&dir[2..])),
    _ => Ok(cwd.join(dir)),
  }
}

fn execute_cd(
  cwd: &Path,
  prev_cwd: Option<&PathBuf>,
  user: Option<&String>,
  args: &[String],
) -> Result<PathBuf> {
  let mut paths = Vec::new();
  for arg in parse_arg_kinds(args) {
    match arg {
      ArgKind::Arg(path) => paths.push(path),
      _ => arg.bail_unsupported()?,
    }
  }
  let path = match paths.as_slice() {
    [] => "~",
    [path] => *path,
    _ => bail!("too many arguments"),
  };

  let new_dir = resolve_directory(path, cwd, prev_cwd, user)?;
  let new_dir = match new_dir.parse_dot() {
    Ok(normalized) => normalized.to_path_buf(),
    Err(_) => new_dir,
  };

  if !new_dir.is_dir() {
    bail!("{}: Not a directory", path)
  }
  Ok(new_dir)
}

impl ShellCommand for CdCommand {
  fn usage(&self) -> &str {
    "[dir]"
  }

  fn description(&self) -> &str {
    "Change the working directory"
  }

  fn execute(&self, mut context: ShellCommandContext) -> ExecuteResult {
    match execute_cd(
      context.state.cwd(),
      context.state.previous_cwd(),
      context.state.get_var("USER"),
      &context.args,
    ) {
      Ok(new_dir) => {
        ExecuteResult::Continue(0, vec![EnvChange::Cd(new_dir)], Vec::new())
      }
      Err(err) => {
        let _ = context.stderr.write_line(&format!("cd: {err}"));
        ExecuteResult::from_exit_code(1)
      }
    }
  }
}
