// Copyright 2018-2024 the Deno authors. MIT license.

use std::collections::VecDeque;
use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::lexer::Lexer;
use crate::lexer::TokenKind;
use crate::lexer::TokenSource;

/// Rendered in place of a stage that has no arguments.
const EMPTY_COMMAND_MARKER: &str = "<empty command>";

/// `cmd_name <args...> [< input] [> output]`
#[cfg_attr(feature = "serialization", derive(serde::Serialize))]
#[cfg_attr(feature = "serialization", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleCommand {
  args: VecDeque<String>,
  redirect_in: Option<String>,
  redirect_out: Option<String>,
}

impl SimpleCommand {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push_back(&mut self, arg: impl Into<String>) {
    self.args.push_back(arg.into());
  }

  /// Removes the first argument. Returns `None` if there are no arguments.
  pub fn pop_front(&mut self) -> Option<String> {
    self.args.pop_front()
  }

  pub fn front(&self) -> Option<&str> {
    self.args.front().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.args.len()
  }

  pub fn is_empty(&self) -> bool {
    self.args.is_empty()
  }

  pub fn args(&self) -> impl Iterator<Item = &String> {
    self.args.iter()
  }

  /// Copies the arguments into an argument vector without modifying the
  /// command.
  pub fn to_args(&self) -> Vec<String> {
    self.args.iter().cloned().collect()
  }

  pub fn set_redirect_in(&mut self, path: Option<String>) {
    self.redirect_in = path;
  }

  pub fn set_redirect_out(&mut self, path: Option<String>) {
    self.redirect_out = path;
  }

  pub fn redirect_in(&self) -> Option<&str> {
    self.redirect_in.as_deref()
  }

  pub fn redirect_out(&self) -> Option<&str> {
    self.redirect_out.as_deref()
  }

  fn has_redirects(&self) -> bool {
    self.redirect_in.is_some() || self.redirect_out.is_some()
  }
}

impl fmt::Display for SimpleCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for arg in &self.args {
      if !first {
        f.write_str(" ")?;
      }
      f.write_str(arg)?;
      first = false;
    }
    // output is always rendered before input
    if let Some(output) = &self.redirect_out {
      write!(f, " > {output}")?;
    }
    if let Some(input) = &self.redirect_in {
      write!(f, " < {input}")?;
    }
    Ok(())
  }
}

/// `cmd1 | cmd2 | ... [&]`
#[cfg_attr(feature = "serialization", derive(serde::Serialize))]
#[cfg_attr(feature = "serialization", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
  commands: VecDeque<SimpleCommand>,
  /// `false` when the pipeline runs in the background (`cmd &`).
  wait: bool,
}

impl Default for Pipeline {
  fn default() -> Self {
    Pipeline {
      commands: VecDeque::new(),
      wait: true,
    }
  }
}

impl Pipeline {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push_back(&mut self, command: SimpleCommand) {
    self.commands.push_back(command);
  }

  pub fn pop_front(&mut self) -> Option<SimpleCommand> {
    self.commands.pop_front()
  }

  pub fn front(&self) -> Option<&SimpleCommand> {
    self.commands.front()
  }

  pub fn get(&self, index: usize) -> Option<&SimpleCommand> {
    self.commands.get(index)
  }

  pub fn iter(&self) -> impl Iterator<Item = &SimpleCommand> {
    self.commands.iter()
  }

  pub fn len(&self) -> usize {
    self.commands.len()
  }

  pub fn is_empty(&self) -> bool {
    self.commands.is_empty()
  }

  pub fn set_wait(&mut self, wait: bool) {
    self.wait = wait;
  }

  pub fn wait(&self) -> bool {
    self.wait
  }
}

impl From<SimpleCommand> for Pipeline {
  fn from(command: SimpleCommand) -> Self {
    let mut pipeline = Pipeline::new();
    pipeline.push_back(command);
    pipeline
  }
}

impl fmt::Display for Pipeline {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.commands.is_empty() {
      return f.write_str(if self.wait { "" } else { "&" });
    }
    for (index, command) in self.commands.iter().enumerate() {
      if index > 0 {
        f.write_str(" | ")?;
      }
      let text = command.to_string();
      if text.is_empty() {
        f.write_str(EMPTY_COMMAND_MARKER)?;
      } else {
        f.write_str(&text)?;
      }
    }
    if !self.wait {
      f.write_str(" &")?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ParseError {
  #[error("end of input")]
  EndOfInput,
  #[error("empty command line")]
  EmptyLine,
  #[error("expected a file name after '{op}'")]
  #[diagnostic(help("redirections need a target, ex. `cmd > file.txt`"))]
  MissingRedirectTarget { op: char },
  #[error("expected a command after '|'")]
  MissingCommandAfterPipe,
  #[error("redirection without a command")]
  RedirectWithoutCommand,
  #[error("unexpected input: {0}")]
  TrailingInput(String),
  #[error("{0}")]
  Lex(String),
}

/// Parses a single line into a pipeline.
pub fn parse(input: &str) -> Result<Pipeline, ParseError> {
  let mut lexer = Lexer::new(input)?;
  parse_pipeline(&mut lexer)
}

/// Pulls arguments and redirections until something else shows up.
///
/// Returns `Ok(None)` when nothing was collected, which is how blank input
/// and stray operators are told apart from malformed redirections.
pub fn parse_simple_command(
  source: &mut impl TokenSource,
) -> Result<Option<SimpleCommand>, ParseError> {
  let mut command = SimpleCommand::new();
  loop {
    source.skip_blanks();
    let token = source.next_argument();
    match (token.kind, token.text) {
      (TokenKind::Normal, Some(text)) => command.push_back(unquote(text)),
      (TokenKind::InputRedirect, Some(path)) => {
        command.set_redirect_in(Some(unquote(path)))
      }
      (TokenKind::OutputRedirect, Some(path)) => {
        command.set_redirect_out(Some(unquote(path)))
      }
      (TokenKind::InputRedirect, None) => {
        return Err(ParseError::MissingRedirectTarget { op: '<' })
      }
      (TokenKind::OutputRedirect, None) => {
        return Err(ParseError::MissingRedirectTarget { op: '>' })
      }
      _ => break,
    }
  }

  if command.is_empty() && !command.has_redirects() {
    Ok(None)
  } else {
    Ok(Some(command))
  }
}

/// Builds one pipeline out of the next line of `source`.
///
/// The rest of the line is always consumed, so after an error the source is
/// positioned at the start of the following line.
pub fn parse_pipeline(
  source: &mut impl TokenSource,
) -> Result<Pipeline, ParseError> {
  if source.at_eof() {
    return Err(ParseError::EndOfInput);
  }

  let result = parse_stages(source);
  let trailing = if source.at_eof() {
    None
  } else {
    source.garbage()
  };

  let pipeline = match (result, trailing) {
    (Err(err), _) => Err(err),
    (Ok(_), Some(text)) => Err(ParseError::TrailingInput(text)),
    (Ok(pipeline), None) if pipeline.is_empty() => Err(ParseError::EmptyLine),
    (Ok(pipeline), None) => Ok(pipeline),
  };
  match &pipeline {
    Ok(pipeline) => tracing::debug!(%pipeline, "parsed pipeline"),
    Err(err) => tracing::debug!(%err, "discarded pipeline"),
  }
  pipeline
}

fn parse_stages(
  source: &mut impl TokenSource,
) -> Result<Pipeline, ParseError> {
  let mut pipeline = Pipeline::new();
  match parse_simple_command(source)? {
    Some(command) => push_stage(&mut pipeline, command)?,
    // left for the trailing input check
    None => return Ok(pipeline),
  }

  loop {
    source.skip_blanks();
    if !source.op_pipe() {
      break;
    }
    match parse_simple_command(source)? {
      Some(command) => push_stage(&mut pipeline, command)?,
      None => return Err(ParseError::MissingCommandAfterPipe),
    }
  }

  source.skip_blanks();
  let is_background = source.op_background();
  pipeline.set_wait(!is_background);
  Ok(pipeline)
}

fn push_stage(
  pipeline: &mut Pipeline,
  command: SimpleCommand,
) -> Result<(), ParseError> {
  if command.is_empty() {
    return Err(ParseError::RedirectWithoutCommand);
  }
  pipeline.push_back(command);
  Ok(())
}

/// Strips one matching pair of surrounding quotes.
fn unquote(text: String) -> String {
  let is_quoted = text.len() >= 2
    && ((text.starts_with('"') && text.ends_with('"'))
      || (text.starts_with('\'') && text.ends_with('\'')));
  if is_quoted {
    text[1..text.len() - 1].to_string()
  } else {
    text
  }
}
