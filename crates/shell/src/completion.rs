use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::Context;
use std::env;
use std::fs;
use std::path::Path;

/// Completes in-process command names and programs on `PATH` for the first
/// word of a line, and file names everywhere.
pub struct ShellCompleter {
    builtin_commands: Vec<String>,
}

impl ShellCompleter {
    pub fn new(builtin_commands: Vec<String>) -> Self {
        Self { builtin_commands }
    }
}

impl Completer for ShellCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> Result<(usize, Vec<Pair>), ReadlineError> {
        let mut matches = Vec::new();
        let (start, word) = extract_word(line, pos);

        let is_start = line[..start].trim().is_empty();
        complete_filenames(word, &mut matches);
        if is_start {
            self.complete_builtin_commands(word, &mut matches);
            complete_executables_in_path(word, &mut matches);
        }

        matches.sort_by(|a, b| a.display.cmp(&b.display));
        matches.dedup_by(|a, b| a.display == b.display);
        Ok((start, matches))
    }
}

impl ShellCompleter {
    fn complete_builtin_commands(&self, word: &str, matches: &mut Vec<Pair>) {
        for name in &self.builtin_commands {
            if name.starts_with(word) {
                matches.push(Pair {
                    display: name.clone(),
                    replacement: name.clone(),
                });
            }
        }
    }
}

/// Returns the start and text of the word that ends at `pos`. Words are
/// separated by blanks and by the shell's operators.
fn extract_word(line: &str, pos: usize) -> (usize, &str) {
    let head = &line[..pos];
    let start = head
        .rfind(|c: char| c.is_whitespace() || matches!(c, '|' | '&' | '<' | '>'))
        .map(|index| index + 1)
        .unwrap_or(0);
    (start, &head[start..])
}

fn complete_filenames(word: &str, matches: &mut Vec<Pair>) {
    // split the word into directory path and partial filename
    let (dir_path, partial_name) = match word.rfind('/') {
        Some(last_slash) => (&word[..=last_slash], &word[last_slash + 1..]),
        None => ("", word),
    };

    let search_dir = if dir_path.starts_with('/') {
        dir_path.to_string()
    } else {
        format!("./{}", dir_path)
    };

    let Ok(entries) = fs::read_dir(Path::new(&search_dir)) else {
        return;
    };
    for entry in entries.flatten() {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.starts_with(partial_name) {
            continue;
        }
        let mut full_path = format!("{}{}", dir_path, name);
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            full_path.push('/');
        }
        matches.push(Pair {
            display: full_path.clone(),
            replacement: full_path,
        });
    }
}

fn complete_executables_in_path(word: &str, matches: &mut Vec<Pair>) {
    if word.is_empty() || word.contains('/') {
        return;
    }
    let Some(paths) = env::var_os("PATH") else {
        return;
    };
    for path in env::split_paths(&paths) {
        let Ok(entries) = fs::read_dir(path) else {
            continue;
        };
        for entry in entries.flatten() {
            if let Ok(name) = entry.file_name().into_string() {
                if name.starts_with(word) && entry.path().is_file() {
                    matches.push(Pair {
                        display: name.clone(),
                        replacement: name,
                    });
                }
            }
        }
    }
}
