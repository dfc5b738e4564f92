use std::borrow::Cow;
use std::path::Path;

use rustyline::highlight::Highlighter;
use rustyline::validate::MatchingBracketValidator;
use rustyline::{Completer, Helper, Hinter, Validator};

use crate::completion::ShellCompleter;

#[derive(Helper, Completer, Hinter, Validator)]
pub(crate) struct ShellPromptHelper {
    #[rustyline(Completer)]
    completer: ShellCompleter,

    #[rustyline(Validator)]
    validator: MatchingBracketValidator,

    colored_prompt: String,
}

impl ShellPromptHelper {
    pub fn new(builtin_commands: Vec<String>) -> Self {
        Self {
            completer: ShellCompleter::new(builtin_commands),
            validator: MatchingBracketValidator::new(),
            colored_prompt: String::new(),
        }
    }

    /// Builds the prompt for `cwd` and returns its plain version. The
    /// colored version is kept for the terminal.
    pub fn update_prompt(&mut self, cwd: &Path, home: Option<&Path>) -> String {
        let display_cwd = display_cwd(cwd, home);
        self.colored_prompt = format!("\x1b[34m{display_cwd}\x1b[0m$ ");
        format!("{display_cwd}$ ")
    }
}

/// Shows `cwd` with the home directory abbreviated to `~`.
fn display_cwd(cwd: &Path, home: Option<&Path>) -> String {
    match home.and_then(|home| cwd.strip_prefix(home).ok()) {
        Some(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Some(rest) => format!("~/{}", rest.display()),
        None => cwd.display().to_string(),
    }
}

impl Highlighter for ShellPromptHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        default: bool,
    ) -> Cow<'b, str> {
        if default {
            Cow::Borrowed(&self.colored_prompt)
        } else {
            Cow::Borrowed(prompt)
        }
    }
}
