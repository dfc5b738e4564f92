// Copyright 2018-2024 the Deno authors. MIT license.

use std::collections::HashMap;
use std::io;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use tokio::task::JoinHandle;

use crate::parser::Pipeline;
use crate::parser::SimpleCommand;

use super::commands::builtin_commands;
use super::commands::ShellCommand;

#[derive(Clone)]
pub struct ShellState {
  /// Environment variables that are passed down to spawned processes.
  env_vars: HashMap<String, String>,
  /// The current working directory of the shell
  cwd: PathBuf,
  /// The directory before the last `cd`, for `cd -`
  previous_cwd: Option<PathBuf>,
  /// Commands that run inside the shell process instead of being spawned
  commands: Rc<HashMap<String, Rc<dyn ShellCommand>>>,
}

impl ShellState {
  pub fn new(
    env_vars: HashMap<String, String>,
    cwd: &Path,
    custom_commands: HashMap<String, Rc<dyn ShellCommand>>,
  ) -> Self {
    assert!(cwd.is_absolute());
    let mut commands = builtin_commands();
    commands.extend(custom_commands);
    let mut result = Self {
      env_vars: Default::default(),
      cwd: PathBuf::new(),
      previous_cwd: None,
      commands: Rc::new(commands),
    };
    for (name, value) in env_vars {
      result.apply_env_var(&name, &value);
    }
    result.set_cwd(cwd);
    result
  }

  pub fn cwd(&self) -> &PathBuf {
    &self.cwd
  }

  pub fn previous_cwd(&self) -> Option<&PathBuf> {
    self.previous_cwd.as_ref()
  }

  pub fn env_vars(&self) -> &HashMap<String, String> {
    &self.env_vars
  }

  pub fn get_var(&self, name: &str) -> Option<&String> {
    self.env_vars.get(name)
  }

  /// Set the current working directory of this shell
  pub fn set_cwd(&mut self, cwd: &Path) {
    self.cwd = cwd.to_path_buf();
    // $PWD holds the current working directory, so we keep cwd and $PWD in sync
    self
      .env_vars
      .insert("PWD".to_string(), self.cwd.display().to_string());
  }

  pub fn apply_changes(&mut self, changes: &[EnvChange]) {
    for change in changes {
      self.apply_change(change);
    }
  }

  pub fn apply_change(&mut self, change: &EnvChange) {
    match change {
      EnvChange::Cd(new_dir) => {
        self.previous_cwd = Some(self.cwd.clone());
        self.set_cwd(new_dir);
      }
    }
  }

  pub fn apply_env_var(&mut self, name: &str, value: &str) {
    if name == "PWD" {
      let cwd = PathBuf::from(value);
      if cwd.is_absolute() {
        self.set_cwd(&cwd);
      }
    } else {
      self.env_vars.insert(name.to_string(), value.to_string());
    }
  }

  /// Resolves a command that runs inside the shell process.
  pub fn resolve_command(&self, name: &str) -> Option<Rc<dyn ShellCommand>> {
    // uses an Rc to allow resolving a command without borrowing from self
    self.commands.get(name).cloned()
  }

  /// Names of every in-process command, sorted.
  pub fn command_names(&self) -> Vec<&str> {
    let mut names = self.commands.keys().map(String::as_str).collect::<Vec<_>>();
    names.sort_unstable();
    names
  }

  /// Whether the first argument of `command` names an in-process command.
  pub fn is_builtin(&self, command: &SimpleCommand) -> bool {
    command
      .front()
      .map(|name| self.commands.contains_key(name))
      .unwrap_or(false)
  }

  /// Whether `pipeline` is a single in-process command, which is run
  /// without spawning anything.
  pub fn is_builtin_alone(&self, pipeline: &Pipeline) -> bool {
    pipeline.len() == 1
      && pipeline
        .front()
        .map(|command| self.is_builtin(command))
        .unwrap_or(false)
  }
}

#[derive(Debug, PartialEq, Eq, Clone, PartialOrd)]
pub enum EnvChange {
  /// Set the current working directory to the new Path
  Cd(PathBuf),
}

/// Exit code of a stage whose program could not be found.
pub const COMMAND_NOT_FOUND_EXIT_CODE: i32 = 127;
/// Exit code of a stage whose program could not be executed.
pub const PERMISSION_DENIED_EXIT_CODE: i32 = 126;

#[derive(Debug)]
pub enum ExecuteResult {
  /// The shell should stop with the given exit code.
  Exit(i32, Vec<JoinHandle<i32>>),
  /// Handles belong to background pipelines that are still being reaped.
  Continue(i32, Vec<EnvChange>, Vec<JoinHandle<i32>>),
}

impl ExecuteResult {
  pub fn from_exit_code(exit_code: i32) -> ExecuteResult {
    ExecuteResult::Continue(exit_code, Vec::new(), Vec::new())
  }

  pub fn exit_code(&self) -> i32 {
    match self {
      ExecuteResult::Exit(code, _) => *code,
      ExecuteResult::Continue(code, _, _) => *code,
    }
  }

  pub fn handles(&self) -> &[JoinHandle<i32>] {
    match self {
      ExecuteResult::Exit(_, handles) => handles,
      ExecuteResult::Continue(_, _, handles) => handles,
    }
  }

  pub fn into_exit_code_and_handles(self) -> (i32, Vec<JoinHandle<i32>>) {
    match self {
      ExecuteResult::Exit(code, handles) => (code, handles),
      ExecuteResult::Continue(code, _, handles) => (code, handles),
    }
  }

  pub fn into_handles(self) -> Vec<JoinHandle<i32>> {
    self.into_exit_code_and_handles().1
  }
}

/// Reader side of a pipe.
#[derive(Debug)]
pub enum ShellPipeReader {
  OsPipe(os_pipe::PipeReader),
  StdFile(std::fs::File),
}

impl ShellPipeReader {
  pub fn stdin() -> io::Result<ShellPipeReader> {
    Ok(ShellPipeReader::from_raw(os_pipe::dup_stdin()?))
  }

  pub fn from_raw(reader: os_pipe::PipeReader) -> Self {
    Self::OsPipe(reader)
  }

  pub fn from_std(std_file: std::fs::File) -> Self {
    Self::StdFile(std_file)
  }

  pub fn try_clone(&self) -> io::Result<Self> {
    Ok(match self {
      Self::OsPipe(pipe) => Self::OsPipe(pipe.try_clone()?),
      Self::StdFile(file) => Self::StdFile(file.try_clone()?),
    })
  }

  pub fn into_stdio(self) -> std::process::Stdio {
    match self {
      Self::OsPipe(pipe) => pipe.into(),
      Self::StdFile(file) => file.into(),
    }
  }

  /// Pipe everything to the specified writer
  pub fn pipe_to(mut self, writer: &mut dyn Write) -> io::Result<()> {
    let mut buffer = [0; 4096];
    loop {
      let size = self.read(&mut buffer)?;
      if size == 0 {
        break;
      }
      writer.write_all(&buffer[0..size])?;
    }
    writer.flush()
  }

  /// Pipes the reader to a string handle that is resolved when the pipe's
  /// writer is closed.
  pub fn pipe_to_string_handle(self) -> JoinHandle<String> {
    tokio::task::spawn_blocking(|| {
      let mut buf = Vec::new();
      if let Err(err) = self.pipe_to(&mut buf) {
        tracing::warn!(%err, "failed reading pipe");
      }
      String::from_utf8_lossy(&buf).to_string()
    })
  }

  pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    match self {
      ShellPipeReader::OsPipe(pipe) => pipe.read(buf),
      ShellPipeReader::StdFile(file) => file.read(buf),
    }
  }
}

/// Writer side of a pipe.
///
/// Ensure that all of these are dropped when complete in order to
/// prevent deadlocks where the reader hangs waiting for a read.
#[derive(Debug)]
pub enum ShellPipeWriter {
  OsPipe(os_pipe::PipeWriter),
  StdFile(std::fs::File),
  // Rust's stdout() and stderr() wrappers are used instead of duplicated
  // descriptors so in-process commands share the process buffers. Spawned
  // processes inherit the real descriptors.
  Stdout,
  Stderr,
  Null,
}

impl ShellPipeWriter {
  pub fn stdout() -> Self {
    Self::Stdout
  }

  pub fn stderr() -> Self {
    Self::Stderr
  }

  pub fn null() -> Self {
    Self::Null
  }

  pub fn from_std(std_file: std::fs::File) -> Self {
    Self::StdFile(std_file)
  }

  pub fn try_clone(&self) -> io::Result<Self> {
    Ok(match self {
      Self::OsPipe(pipe) => Self::OsPipe(pipe.try_clone()?),
      Self::StdFile(file) => Self::StdFile(file.try_clone()?),
      Self::Stdout => Self::Stdout,
      Self::Stderr => Self::Stderr,
      Self::Null => Self::Null,
    })
  }

  pub fn into_stdio(self) -> std::process::Stdio {
    match self {
      Self::OsPipe(pipe) => pipe.into(),
      Self::StdFile(file) => file.into(),
      Self::Stdout => std::process::Stdio::inherit(),
      Self::Stderr => std::process::Stdio::inherit(),
      Self::Null => std::process::Stdio::null(),
    }
  }

  pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
    match self {
      Self::OsPipe(pipe) => pipe.write_all(bytes)?,
      Self::StdFile(file) => file.write_all(bytes)?,
      // For both stdout & stderr, we want to flush after each
      // write in order to bypass Rust's internal buffer.
      Self::Stdout => {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(bytes)?;
        stdout.flush()?;
      }
      Self::Stderr => {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(bytes)?;
        stderr.flush()?;
      }
      Self::Null => {}
    }
    Ok(())
  }

  pub fn write_line(&mut self, line: &str) -> io::Result<()> {
    let bytes = format!("{line}\n");
    self.write_all(bytes.as_bytes())
  }
}

/// Used to connect adjacent stages. Both ends are close-on-exec, so a
/// spawned process only keeps the end it receives as a standard stream.
pub fn pipe() -> io::Result<(ShellPipeReader, ShellPipeWriter)> {
  let (reader, writer) = os_pipe::pipe()?;
  Ok((
    ShellPipeReader::OsPipe(reader),
    ShellPipeWriter::OsPipe(writer),
  ))
}
