// Copyright 2018-2024 the Deno authors. MIT license.

use miette::bail;
use miette::Result;

#[derive(Debug, PartialEq, Eq)]
pub enum ArgKind<'a> {
  ShortFlag(char),
  LongFlag(&'a str),
  Arg(&'a str),
}

impl<'a> ArgKind<'a> {
  pub fn bail_unsupported(&self) -> Result<()> {
    match self {
      ArgKind::Arg(arg) => {
        bail!("unsupported argument: {}", arg)
      }
      ArgKind::LongFlag(name) => {
        bail!("unsupported flag: --{}", name)
      }
      ArgKind::ShortFlag(name) => {
        bail!("unsupported flag: -{}", name)
      }
    }
  }
}

/// Splits builtin arguments into flags and plain arguments. A lone `-` and
/// negative numbers are plain arguments; everything after `--` is too.
pub fn parse_arg_kinds(flags: &[String]) -> Vec<ArgKind> {
  let mut result = Vec::new();
  let mut had_dash_dash = false;
  for arg in flags {
    if had_dash_dash {
      result.push(ArgKind::Arg(arg));
    } else if arg == "-" {
      result.push(ArgKind::Arg("-"));
    } else if arg == "--" {
      had_dash_dash = true;
    } else if let Some(name) = arg.strip_prefix("--") {
      result.push(ArgKind::LongFlag(name));
    } else if let Some(chars) = arg.strip_prefix('-') {
      if arg.parse::<f64>().is_ok() {
        result.push(ArgKind::Arg(arg));
      } else {
        for c in chars.chars() {
          result.push(ArgKind::ShortFlag(c));
        }
      }
    } else {
      result.push(ArgKind::Arg(arg));
    }
  }
  result
}
