// Copyright 2018-2024 the Deno authors. MIT license.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::rc::Rc;

use thiserror::Error;
use tokio::process::Child;
use tokio::task::JoinHandle;

use crate::parser::Pipeline;
use crate::parser::SimpleCommand;

use super::commands::ShellCommand;
use super::commands::ShellCommandContext;
use super::types::pipe;
use super::types::ExecuteResult;
use super::types::ShellPipeReader;
use super::types::ShellPipeWriter;
use super::types::ShellState;
use super::types::COMMAND_NOT_FOUND_EXIT_CODE;
use super::types::PERMISSION_DENIED_EXIT_CODE;

/// Executes a `Pipeline` using the standard streams of this process.
///
/// Builds a `ShellState` from the given environment, working directory and
/// custom commands, runs the pipeline and waits for every process it
/// started, including those of a background pipeline.
///
/// # Returns
/// The exit code of the pipeline.
pub async fn execute(
  pipeline: &Pipeline,
  env_vars: HashMap<String, String>,
  cwd: &Path,
  custom_commands: HashMap<String, Rc<dyn ShellCommand>>,
) -> i32 {
  let state = ShellState::new(env_vars, cwd, custom_commands);
  let stdin = match ShellPipeReader::stdin() {
    Ok(stdin) => stdin,
    Err(err) => {
      let _ = ShellPipeWriter::stderr()
        .write_line(&format!("pipesh: failed to open stdin: {err}"));
      return 1;
    }
  };
  let result = execute_with_pipes(
    pipeline,
    &state,
    stdin,
    ShellPipeWriter::stdout(),
    ShellPipeWriter::stderr(),
  )
  .await;

  let (exit_code, handles) = result.into_exit_code_and_handles();
  for handle in handles {
    let _ = handle.await;
  }
  exit_code
}

/// Executes a `Pipeline` with the specified input and output streams.
///
/// A pipeline made of a single in-process command is run directly, without
/// spawning anything. Otherwise every stage is spawned as a child process,
/// connected to its neighbours with pipes. A foreground pipeline is waited
/// for; a background one hands its children to a reaper task whose handle
/// is part of the result.
///
/// The pipeline is only read, so it can be displayed or run again after.
///
/// # Arguments
///
/// * `pipeline` - The stages to run.
/// * `state` - Environment variables, working directory and in-process
///   commands.
/// * `stdin` - Read by the first stage.
/// * `stdout` - Written by the last stage.
/// * `stderr` - Shared by every stage, also receives the diagnostics.
pub async fn execute_with_pipes(
  pipeline: &Pipeline,
  state: &ShellState,
  stdin: ShellPipeReader,
  stdout: ShellPipeWriter,
  mut stderr: ShellPipeWriter,
) -> ExecuteResult {
  let Some(first) = pipeline.front() else {
    return ExecuteResult::from_exit_code(0);
  };

  if state.is_builtin_alone(pipeline) {
    if let Some(command) = first.front().and_then(|n| state.resolve_command(n))
    {
      return execute_builtin(first, command, state, stdin, stdout, stderr);
    }
  }

  match spawn_stages(pipeline, state, stdin, stdout, &mut stderr) {
    Ok(stages) if pipeline.wait() => {
      let exit_code = wait_stages(stages).await;
      ExecuteResult::from_exit_code(exit_code)
    }
    Ok(stages) => {
      let handle = reap_in_background(pipeline, stages, None);
      ExecuteResult::Continue(0, Vec::new(), vec![handle])
    }
    // the remaining stages were never started, but the ones that were
    // still need to be reaped
    Err(stages) if pipeline.wait() => {
      wait_stages(stages).await;
      ExecuteResult::from_exit_code(1)
    }
    Err(stages) => {
      let handle = reap_in_background(pipeline, stages, Some(1));
      ExecuteResult::Continue(1, Vec::new(), vec![handle])
    }
  }
}

/// Hands the stages of a background pipeline to a task that waits for
/// them. The task resolves to the last stage's exit code, or to
/// `exit_code` when one is given.
fn reap_in_background(
  pipeline: &Pipeline,
  stages: Vec<Stage>,
  exit_code: Option<i32>,
) -> JoinHandle<i32> {
  let description = pipeline.to_string();
  tokio::spawn(async move {
    let last_exit_code = wait_stages(stages).await;
    let exit_code = exit_code.unwrap_or(last_exit_code);
    tracing::debug!(pipeline = %description, exit_code, "reaped background pipeline");
    exit_code
  })
}

fn execute_builtin(
  command: &SimpleCommand,
  handler: Rc<dyn ShellCommand>,
  state: &ShellState,
  stdin: ShellPipeReader,
  stdout: ShellPipeWriter,
  mut stderr: ShellPipeWriter,
) -> ExecuteResult {
  let streams = redirect_streams(command, state, stdin, stdout);
  let (stdin, stdout) = match streams {
    Ok(streams) => streams,
    Err(err) => {
      let _ = stderr.write_line(&err.to_string());
      return ExecuteResult::from_exit_code(1);
    }
  };
  tracing::debug!(command = %command, "running in-process command");
  handler.execute(ShellCommandContext {
    args: command.args().skip(1).cloned().collect(),
    state: state.clone(),
    stdin,
    stdout,
    stderr,
  })
}

/// Outcome of launching one stage.
#[derive(Debug)]
enum Stage {
  Running(Child),
  /// The stage failed before running, with this exit code.
  Failed(i32),
}

#[derive(Debug, Error)]
enum SpawnError {
  #[error("{0}: command not found")]
  NotFound(String),
  #[error("{0}: permission denied")]
  PermissionDenied(String),
  #[error("error opening file for redirect ({}). {source}", .path.display())]
  Redirect { path: PathBuf, source: io::Error },
  #[error("{0}: builtin commands cannot be used in a pipeline")]
  BuiltinInPipeline(String),
  #[error("pipesh: failed to create pipe: {0}")]
  Pipe(io::Error),
  #[error("pipesh: working directory {} no longer exists", .0.display())]
  MissingCwd(PathBuf),
  #[error("{name}: {source}")]
  Spawn { name: String, source: io::Error },
}

impl SpawnError {
  /// Exit code of a failure that only affects its own stage, or `None`
  /// when the rest of the pipeline has to be abandoned.
  fn stage_exit_code(&self) -> Option<i32> {
    match self {
      SpawnError::NotFound(_) => Some(COMMAND_NOT_FOUND_EXIT_CODE),
      SpawnError::PermissionDenied(_) => Some(PERMISSION_DENIED_EXIT_CODE),
      SpawnError::Redirect { .. } => Some(1),
      SpawnError::BuiltinInPipeline(_)
      | SpawnError::Pipe(_)
      | SpawnError::MissingCwd(_)
      | SpawnError::Spawn { .. } => None,
    }
  }
}

/// Launches every stage from left to right. On an abort, the stages that
/// were already launched are returned as the error.
fn spawn_stages(
  pipeline: &Pipeline,
  state: &ShellState,
  stdin: ShellPipeReader,
  stdout: ShellPipeWriter,
  stderr: &mut ShellPipeWriter,
) -> Result<Vec<Stage>, Vec<Stage>> {
  let mut stages = Vec::with_capacity(pipeline.len());
  let mut stdin = Some(stdin);
  let mut stdout = Some(stdout);
  let last_index = pipeline.len() - 1;

  for (index, command) in pipeline.iter().enumerate() {
    let Some(stage_stdin) = stdin.take() else {
      break;
    };
    let launched = if index == last_index {
      match stdout.take() {
        Some(stage_stdout) => {
          spawn_stage(command, state, stage_stdin, stage_stdout, stderr)
        }
        None => break,
      }
    } else {
      match pipe() {
        Ok((reader, writer)) => {
          stdin = Some(reader);
          spawn_stage(command, state, stage_stdin, writer, stderr)
        }
        // dropping `stage_stdin` closes the previous read end
        Err(err) => Err(SpawnError::Pipe(err)),
      }
    };

    match launched {
      Ok(child) => {
        tracing::debug!(stage = index, command = %command, pid = child.id(), "spawned stage");
        stages.push(Stage::Running(child));
      }
      Err(err) => {
        let _ = stderr.write_line(&err.to_string());
        match err.stage_exit_code() {
          Some(exit_code) => stages.push(Stage::Failed(exit_code)),
          None => {
            tracing::warn!(stage = index, command = %command, error = %err, "abandoning pipeline");
            return Err(stages);
          }
        }
      }
    }
  }
  Ok(stages)
}

/// Spawns one stage. The streams are moved into the child's command, which
/// is dropped before returning so this process keeps none of them open.
fn spawn_stage(
  command: &SimpleCommand,
  state: &ShellState,
  stdin: ShellPipeReader,
  stdout: ShellPipeWriter,
  stderr: &ShellPipeWriter,
) -> Result<Child, SpawnError> {
  let mut args = command.args();
  let Some(name) = args.next() else {
    return Err(SpawnError::Spawn {
      name: String::new(),
      source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
    });
  };
  if state.is_builtin(command) {
    return Err(SpawnError::BuiltinInPipeline(name.clone()));
  }
  // spawning reports a missing working directory as `NotFound` too
  if !state.cwd().is_dir() {
    return Err(SpawnError::MissingCwd(state.cwd().clone()));
  }

  let (stdin, stdout) = redirect_streams(command, state, stdin, stdout)?;
  let stderr = stderr.try_clone().map_err(|source| SpawnError::Spawn {
    name: name.clone(),
    source,
  })?;

  let mut child = tokio::process::Command::new(name);
  child
    .args(args)
    .current_dir(state.cwd())
    .env_clear()
    .envs(state.env_vars())
    .stdin(stdin.into_stdio())
    .stdout(stdout.into_stdio())
    .stderr(stderr.into_stdio());
  child.spawn().map_err(|err| match err.kind() {
    io::ErrorKind::NotFound => SpawnError::NotFound(name.clone()),
    io::ErrorKind::PermissionDenied => {
      SpawnError::PermissionDenied(name.clone())
    }
    _ => SpawnError::Spawn {
      name: name.clone(),
      source: err,
    },
  })
}

/// Replaces the stage's streams with its redirection files, if any.
/// Paths are relative to the shell's working directory.
fn redirect_streams(
  command: &SimpleCommand,
  state: &ShellState,
  stdin: ShellPipeReader,
  stdout: ShellPipeWriter,
) -> Result<(ShellPipeReader, ShellPipeWriter), SpawnError> {
  let stdin = match command.redirect_in() {
    Some(path) => {
      let path = state.cwd().join(path);
      match std::fs::OpenOptions::new().read(true).open(&path) {
        Ok(file) => ShellPipeReader::from_std(file),
        Err(source) => return Err(SpawnError::Redirect { path, source }),
      }
    }
    None => stdin,
  };
  let stdout = match command.redirect_out() {
    Some(path) => {
      let path = state.cwd().join(path);
      let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path);
      match file {
        Ok(file) => ShellPipeWriter::from_std(file),
        Err(source) => return Err(SpawnError::Redirect { path, source }),
      }
    }
    None => stdout,
  };
  Ok((stdin, stdout))
}

/// Waits for every running stage, in whatever order they finish, and
/// returns the exit code of the last one.
async fn wait_stages(stages: Vec<Stage>) -> i32 {
  let waits = stages.into_iter().map(|stage| async move {
    match stage {
      Stage::Running(mut child) => {
        let pid = child.id();
        match child.wait().await {
          Ok(status) => {
            let exit_code = status_exit_code(status);
            tracing::debug!(pid, exit_code, "reaped stage");
            exit_code
          }
          Err(err) => {
            tracing::warn!(pid, error = %err, "failed waiting for stage");
            1
          }
        }
      }
      Stage::Failed(exit_code) => exit_code,
    }
  });
  let exit_codes = futures::future::join_all(waits).await;
  exit_codes.last().copied().unwrap_or(1)
}

fn status_exit_code(status: ExitStatus) -> i32 {
  if let Some(code) = status.code() {
    return code;
  }
  #[cfg(unix)]
  {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = status.signal() {
      return 128 + signal;
    }
  }
  1
}
