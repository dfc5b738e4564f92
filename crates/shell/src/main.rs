use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;
use miette::{Context, IntoDiagnostic};
use pipesh::lexer::Lexer;
use pipesh::parser::{parse_pipeline, ParseError};
use pipesh::{ShellPipeReader, ShellPipeWriter, ShellState};
use rustyline::error::ReadlineError;
use rustyline::{CompletionType, Config, Editor};
use shell::execute::{execute_and_wait, execute_script};
use tracing_subscriber::EnvFilter;

mod completion;
mod helper;

/// Exit code reported after Ctrl-C at the prompt.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Parser)]
#[clap(name = "pipesh", version, about = "A minimal line-oriented shell")]
struct Options {
    /// Run the pipelines of a script file, one per line
    #[clap(short, long, conflicts_with = "command")]
    file: Option<PathBuf>,

    /// Run the given text and exit
    #[clap(short, long)]
    command: Option<String>,

    /// Print each parsed pipeline instead of running it
    #[clap(short, long)]
    debug: bool,
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_env("PIPESH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn init_state() -> miette::Result<ShellState> {
    let env_vars = std::env::vars().collect();
    let cwd = std::env::current_dir()
        .into_diagnostic()
        .context("Failed to get the current directory")?;
    Ok(ShellState::new(env_vars, &cwd, HashMap::new()))
}

fn debug_parse(text: &str) -> miette::Result<()> {
    let mut lexer = Lexer::new(text)?;
    loop {
        match parse_pipeline(&mut lexer) {
            Ok(pipeline) => {
                println!("{pipeline}");
                println!("{pipeline:#?}");
            }
            Err(ParseError::EndOfInput) => break,
            Err(ParseError::EmptyLine) => continue,
            Err(err) => println!("syntax error: {err}"),
        }
    }
    Ok(())
}

async fn run_script(text: &str, state: &mut ShellState) -> miette::Result<i32> {
    let stdin = ShellPipeReader::stdin().into_diagnostic()?;
    let (exit_code, _) = execute_and_wait(
        text,
        state,
        stdin,
        ShellPipeWriter::stdout(),
        ShellPipeWriter::stderr(),
    )
    .await?;
    Ok(exit_code)
}

async fn interactive(state: &mut ShellState) -> miette::Result<i32> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::Circular)
        .build();

    let mut rl = Editor::with_config(config).into_diagnostic()?;
    let builtin_commands = state.command_names().into_iter().map(String::from).collect();
    rl.set_helper(Some(helper::ShellPromptHelper::new(builtin_commands)));

    let home = dirs::home_dir();
    let mut exit_code = 0;
    loop {
        let prompt = match rl.helper_mut() {
            Some(helper) => helper.update_prompt(state.cwd(), home.as_deref()),
            None => "$ ".to_string(),
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());

                let stdin = ShellPipeReader::stdin().into_diagnostic()?;
                let result = execute_script(
                    &line,
                    state,
                    stdin,
                    ShellPipeWriter::stdout(),
                    ShellPipeWriter::stderr(),
                )
                .await?;
                // background pipelines keep being reaped by their own tasks
                let is_exit = matches!(result, pipesh::ExecuteResult::Exit(..));
                exit_code = result.exit_code();

                std::env::set_current_dir(state.cwd())
                    .into_diagnostic()
                    .context("Failed to set CWD")?;
                if is_exit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                exit_code = INTERRUPTED_EXIT_CODE;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err).into_diagnostic(),
        }
    }

    Ok(exit_code)
}

async fn run(options: Options) -> miette::Result<i32> {
    let script_text = if let Some(file) = &options.file {
        Some(
            std::fs::read_to_string(file)
                .into_diagnostic()
                .with_context(|| format!("Failed to read {}", file.display()))?,
        )
    } else if let Some(command) = options.command {
        Some(command)
    } else if !std::io::stdin().is_terminal() {
        Some(
            std::io::read_to_string(std::io::stdin())
                .into_diagnostic()
                .context("Failed to read the script from stdin")?,
        )
    } else {
        None
    };

    if options.debug {
        if let Some(text) = &script_text {
            debug_parse(text)?;
        }
        return Ok(0);
    }

    let mut state = init_state()?;
    tracing::debug!(cwd = %state.cwd().display(), interactive = script_text.is_none(), "starting");
    match script_text {
        Some(text) => run_script(&text, &mut state).await,
        None => interactive(&mut state).await,
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let options = Options::parse();
    init_logging();
    let exit_code = run(options).await?;
    std::process::exit(exit_code);
}
