use miette::Context;
use miette::IntoDiagnostic;
use pipesh::lexer::Lexer;
use pipesh::parser::parse_pipeline;
use pipesh::parser::ParseError;
use pipesh::{execute_with_pipes, ExecuteResult, ShellPipeReader, ShellPipeWriter, ShellState};

/// Exit code of a line that could not be parsed.
pub const SYNTAX_ERROR_EXIT_CODE: i32 = 2;

/// Runs every line of `text` as a pipeline, in order.
///
/// Lines that fail to parse are reported on `stderr` and skipped, blank lines
/// are ignored. Directory changes are applied to `state` between lines, so a
/// `cd` affects the lines that follow it. Execution stops early on `exit`.
///
/// The returned result carries the exit code of the last line that ran and
/// the handles of every background pipeline that was started.
pub async fn execute_script(
    text: &str,
    state: &mut ShellState,
    stdin: ShellPipeReader,
    stdout: ShellPipeWriter,
    mut stderr: ShellPipeWriter,
) -> miette::Result<ExecuteResult> {
    let mut lexer = Lexer::new(text)?;
    let mut exit_code = 0;
    let mut handles = Vec::new();

    loop {
        let pipeline = match parse_pipeline(&mut lexer) {
            Ok(pipeline) => pipeline,
            Err(ParseError::EndOfInput) => break,
            Err(ParseError::EmptyLine) => continue,
            Err(err) => {
                stderr
                    .write_line(&format!("pipesh: syntax error: {err}"))
                    .into_diagnostic()?;
                exit_code = SYNTAX_ERROR_EXIT_CODE;
                continue;
            }
        };

        let result = execute_with_pipes(
            &pipeline,
            state,
            stdin.try_clone().into_diagnostic().context("Failed to clone stdin")?,
            stdout.try_clone().into_diagnostic().context("Failed to clone stdout")?,
            stderr.try_clone().into_diagnostic().context("Failed to clone stderr")?,
        )
        .await;

        match result {
            ExecuteResult::Exit(code, pipeline_handles) => {
                handles.extend(pipeline_handles);
                return Ok(ExecuteResult::Exit(code, handles));
            }
            ExecuteResult::Continue(code, changes, pipeline_handles) => {
                state.apply_changes(&changes);
                handles.extend(pipeline_handles);
                exit_code = code;
            }
        }
    }

    Ok(ExecuteResult::Continue(exit_code, Vec::new(), handles))
}

/// Runs `text` and waits for all of its background pipelines.
///
/// Returns the exit code along with whether `exit` was run.
pub async fn execute_and_wait(
    text: &str,
    state: &mut ShellState,
    stdin: ShellPipeReader,
    stdout: ShellPipeWriter,
    stderr: ShellPipeWriter,
) -> miette::Result<(i32, bool)> {
    let result = execute_script(text, state, stdin, stdout, stderr).await?;
    let is_exit = matches!(result, ExecuteResult::Exit(..));
    let (exit_code, handles) = result.into_exit_code_and_handles();
    for handle in handles {
        handle
            .await
            .into_diagnostic()
            .context("Background pipeline panicked")?;
    }
    Ok((exit_code, is_exit))
}
