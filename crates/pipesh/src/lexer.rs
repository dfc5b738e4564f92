// Copyright 2018-2024 the Deno authors. MIT license.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::parser::ParseError;

/// Classification of a token handed to the pipeline builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  /// A plain argument (ex. `ls`, `"hello world"`).
  Normal,
  /// `< file`
  InputRedirect,
  /// `> file`
  OutputRedirect,
  /// `|`
  Pipe,
  /// `&`
  Background,
  /// Text that cannot start any other token.
  Garbage,
  /// End of the current line or of the whole input.
  End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  /// Argument text, or the redirection target. `None` for operators and for
  /// a redirection operator that is not followed by a word.
  pub text: Option<String>,
}

impl Token {
  fn new(kind: TokenKind, text: Option<String>) -> Self {
    Token { kind, text }
  }
}

/// A source of classified tokens for the pipeline builder.
///
/// Operators are only consumed by the method that tests for them, so the
/// builder can stop at a `|` or `&` and leave it for the caller.
pub trait TokenSource {
  /// Whether the whole input has been consumed.
  fn at_eof(&self) -> bool;

  fn skip_blanks(&mut self);

  /// Returns the next argument or redirection, consuming it. Any other
  /// classification is reported without being consumed.
  fn next_argument(&mut self) -> Token;

  /// Consumes a `|` if it is the next token.
  fn op_pipe(&mut self) -> bool;

  /// Consumes a `&` if it is the next token.
  fn op_background(&mut self) -> bool;

  /// Consumes the rest of the current line including its line break and
  /// returns whatever non-blank text was left on it.
  fn garbage(&mut self) -> Option<String>;
}

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct LineParser;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lexeme {
  Blank,
  Newline,
  Word(String),
  InputRedirect(Option<String>),
  OutputRedirect(Option<String>),
  Pipe,
  Background,
  Garbage(String),
}

impl Lexeme {
  fn source_text(&self) -> String {
    match self {
      Lexeme::Blank => " ".to_string(),
      Lexeme::Newline => String::new(),
      Lexeme::Word(text) | Lexeme::Garbage(text) => text.clone(),
      Lexeme::InputRedirect(target) => {
        format!("<{}", target.as_deref().unwrap_or_default())
      }
      Lexeme::OutputRedirect(target) => {
        format!(">{}", target.as_deref().unwrap_or_default())
      }
      Lexeme::Pipe => "|".to_string(),
      Lexeme::Background => "&".to_string(),
    }
  }
}

/// Token source over an in-memory text that may span several lines.
#[derive(Debug, Clone)]
pub struct Lexer {
  lexemes: Vec<Lexeme>,
  position: usize,
}

impl Lexer {
  pub fn new(input: &str) -> Result<Self, ParseError> {
    let mut pairs = LineParser::parse(Rule::FILE, input)
      .map_err(|err| ParseError::Lex(err.to_string()))?;
    let file = pairs
      .next()
      .ok_or_else(|| ParseError::Lex("empty parse tree".to_string()))?;
    let lexemes = file.into_inner().filter_map(parse_lexeme).collect();
    Ok(Lexer {
      lexemes,
      position: 0,
    })
  }

  fn peek(&self) -> Option<&Lexeme> {
    self.lexemes.get(self.position)
  }
}

fn parse_lexeme(pair: Pair<Rule>) -> Option<Lexeme> {
  let target = |pair: Pair<Rule>| {
    pair
      .into_inner()
      .find(|inner| inner.as_rule() == Rule::word)
      .map(|word| word.as_str().to_string())
  };
  match pair.as_rule() {
    Rule::blank => Some(Lexeme::Blank),
    Rule::newline => Some(Lexeme::Newline),
    Rule::pipe => Some(Lexeme::Pipe),
    Rule::background => Some(Lexeme::Background),
    Rule::redirect_in => Some(Lexeme::InputRedirect(target(pair))),
    Rule::redirect_out => Some(Lexeme::OutputRedirect(target(pair))),
    Rule::word => Some(Lexeme::Word(pair.as_str().to_string())),
    Rule::garbage => Some(Lexeme::Garbage(pair.as_str().to_string())),
    _ => None,
  }
}

impl TokenSource for Lexer {
  fn at_eof(&self) -> bool {
    self.position >= self.lexemes.len()
  }

  fn skip_blanks(&mut self) {
    while let Some(Lexeme::Blank) = self.peek() {
      self.position += 1;
    }
  }

  fn next_argument(&mut self) -> Token {
    self.skip_blanks();
    let token = match self.peek() {
      Some(Lexeme::Word(text)) => {
        Token::new(TokenKind::Normal, Some(text.clone()))
      }
      Some(Lexeme::InputRedirect(target)) => {
        Token::new(TokenKind::InputRedirect, target.clone())
      }
      Some(Lexeme::OutputRedirect(target)) => {
        Token::new(TokenKind::OutputRedirect, target.clone())
      }
      Some(Lexeme::Pipe) => return Token::new(TokenKind::Pipe, None),
      Some(Lexeme::Background) => {
        return Token::new(TokenKind::Background, None)
      }
      Some(Lexeme::Garbage(_)) => return Token::new(TokenKind::Garbage, None),
      Some(Lexeme::Blank) | Some(Lexeme::Newline) | None => {
        return Token::new(TokenKind::End, None)
      }
    };
    self.position += 1;
    token
  }

  fn op_pipe(&mut self) -> bool {
    let found = matches!(self.peek(), Some(Lexeme::Pipe));
    if found {
      self.position += 1;
    }
    found
  }

  fn op_background(&mut self) -> bool {
    let found = matches!(self.peek(), Some(Lexeme::Background));
    if found {
      self.position += 1;
    }
    found
  }

  fn garbage(&mut self) -> Option<String> {
    let mut text = String::new();
    while let Some(lexeme) = self.lexemes.get(self.position) {
      self.position += 1;
      if *lexeme == Lexeme::Newline {
        break;
      }
      text.push_str(&lexeme.source_text());
    }
    let text = text.trim();
    if text.is_empty() {
      None
    } else {
      Some(text.to_string())
    }
  }
}
