// Copyright 2018-2024 the Deno authors. MIT license.
#![cfg(test)]

mod test_runner;

use std::cell::Cell;
use std::rc::Rc;

use pipesh::{ExecuteResult, ShellCommand, ShellCommandContext};
use test_builder::TestBuilder;

const HELP_TEXT: &str = concat!(
    "pipesh: a minimal shell\n",
    "Type program names and arguments, and hit enter.\n",
    "Stages are joined with `|`, `< file` and `> file` redirect a stage,\n",
    "and a trailing `&` runs the pipeline in the background.\n",
    "The following are built in:\n",
    "  cd [dir]        - Change the working directory\n",
    "  exit [code]     - Leave the shell\n",
    "  help            - Show this help\n",
    "Use the man command for information on other programs.\n",
);

#[tokio::test]
async fn commands() {
    TestBuilder::new()
        .command("echo 1")
        .assert_stdout("1\n")
        .run()
        .await;

    TestBuilder::new()
        .command("echo 1 2   3")
        .assert_stdout("1 2 3\n")
        .run()
        .await;

    TestBuilder::new()
        .command(r#"echo "1 2   3""#)
        .assert_stdout("1 2   3\n")
        .run()
        .await;

    TestBuilder::new()
        .command("echo 'a | b' \"c > d\"")
        .assert_stdout("a | b c > d\n")
        .run()
        .await;

    TestBuilder::new()
        .command("echo a\necho b\n")
        .assert_stdout("a\nb\n")
        .run()
        .await;

    TestBuilder::new()
        .command("pipesh-missing-program arg")
        .assert_stderr("pipesh-missing-program: command not found\n")
        .assert_exit_code(127)
        .run()
        .await;

    TestBuilder::new()
        .env_var("PIPESH_TEST_VAR", "from the state")
        .command(r#"sh -c "echo $PIPESH_TEST_VAR""#)
        .assert_stdout("from the state\n")
        .run()
        .await;
}

#[tokio::test]
async fn pipelines() {
    TestBuilder::new()
        .command("echo hello | tr a-z A-Z")
        .assert_stdout("HELLO\n")
        .run()
        .await;

    TestBuilder::new()
        .stdin("pear\napple\nfig\nbanana\n")
        .command("sort | tr a-z A-Z | head -n 3")
        .assert_stdout("APPLE\nBANANA\nFIG\n")
        .run()
        .await;

    TestBuilder::new()
        .stdin("a\nb\nc\n")
        .command("cat|wc -l|tr -d \" \"")
        .assert_stdout("3\n")
        .run()
        .await;

    // the pipeline's status is the last stage's
    TestBuilder::new()
        .command("false | true")
        .assert_exit_code(0)
        .run()
        .await;

    TestBuilder::new()
        .command("true | false")
        .assert_exit_code(1)
        .run()
        .await;

    // a failing stage does not stop its siblings
    TestBuilder::new()
        .command("pipesh-missing-program | echo still running")
        .assert_stderr("pipesh-missing-program: command not found\n")
        .assert_stdout("still running\n")
        .run()
        .await;

    TestBuilder::new()
        .command("echo 1 | pipesh-missing-program")
        .assert_stderr("pipesh-missing-program: command not found\n")
        .assert_exit_code(127)
        .run()
        .await;
}

#[tokio::test]
async fn redirects() {
    TestBuilder::new()
        .command("echo 1 > output.txt")
        .assert_file_equals("output.txt", "1\n")
        .run()
        .await;

    TestBuilder::new()
        .file("output.txt", "previous content that is longer\n")
        .command("echo new > output.txt")
        .assert_file_equals("output.txt", "new\n")
        .run()
        .await;

    TestBuilder::new()
        .file("test.txt", "b\nc\na\n")
        .command("sort < test.txt")
        .assert_stdout("a\nb\nc\n")
        .run()
        .await;

    TestBuilder::new()
        .file("test.txt", "b\nc\na\n")
        .command("sort > sorted.txt < test.txt | echo done")
        .assert_stdout("done\n")
        .assert_exists("test.txt")
        .assert_file_equals("sorted.txt", "a\nb\nc\n")
        .run()
        .await;

    TestBuilder::new()
        .directory("sub_dir")
        .file("sub_dir/file.txt", "test")
        .command("cat < sub_dir/file.txt | tr a-z A-Z > sub_dir/upper.txt")
        .assert_file_equals("sub_dir/upper.txt", "TEST")
        .run()
        .await;

    // in-process commands honour redirections too
    TestBuilder::new()
        .command("help > help.txt")
        .assert_file_equals("help.txt", HELP_TEXT)
        .run()
        .await;
}

#[tokio::test]
async fn missing_redirect_target_fails_its_stage() {
    let mut builder = TestBuilder::new();
    let missing = builder.temp_dir_path().join("missing.txt");
    builder
        .command("cat < missing.txt | echo still running")
        .assert_stderr(&format!(
            "error opening file for redirect ({}). No such file or directory (os error 2)\n",
            missing.display()
        ))
        .assert_stdout("still running\n")
        .run()
        .await;

    let mut builder = TestBuilder::new();
    let missing = builder.temp_dir_path().join("missing.txt");
    builder
        .command("cat < missing.txt")
        .assert_stderr(&format!(
            "error opening file for redirect ({}). No such file or directory (os error 2)\n",
            missing.display()
        ))
        .assert_exit_code(1)
        .run()
        .await;
}

#[cfg(unix)]
#[tokio::test]
async fn permission_denied() {
    TestBuilder::new()
        .file("script.sh", "echo never\n")
        .command("./script.sh")
        .assert_stderr("./script.sh: permission denied\n")
        .assert_exit_code(126)
        .run()
        .await;
}

#[tokio::test]
async fn builtins() {
    TestBuilder::new()
        .command("help")
        .assert_stdout(HELP_TEXT)
        .run()
        .await;

    TestBuilder::new()
        .command("help | cat")
        .assert_stderr("help: builtin commands cannot be used in a pipeline\n")
        .assert_exit_code(1)
        .run()
        .await;

    TestBuilder::new()
        .command("echo 1 | cd | cat")
        .assert_stderr("cd: builtin commands cannot be used in a pipeline\n")
        .assert_exit_code(1)
        .run()
        .await;
}

#[tokio::test]
async fn cd() {
    let mut builder = TestBuilder::new();
    let sub_dir = builder.temp_dir_path().join("sub_dir");
    builder
        .directory("sub_dir")
        .command("cd sub_dir\npwd\ncd ..\ncd -\npwd")
        .assert_stdout(&format!("{0}\n{0}\n", sub_dir.display()))
        .run()
        .await;

    TestBuilder::new()
        .directory("sub_dir")
        .file("sub_dir/file.txt", "test")
        .command("cd sub_dir\ncat file.txt")
        .assert_stdout("test")
        .run()
        .await;

    TestBuilder::new()
        .command("cd non-existent")
        .assert_stderr("cd: non-existent: Not a directory\n")
        .assert_exit_code(1)
        .run()
        .await;

    TestBuilder::new()
        .command("cd a b")
        .assert_stderr("cd: too many arguments\n")
        .assert_exit_code(1)
        .run()
        .await;

    // a failed cd does not move the shell
    let mut builder = TestBuilder::new();
    let cwd = builder.temp_dir_path();
    builder
        .file("file.txt", "")
        .command("cd file.txt\npwd")
        .assert_stderr("cd: file.txt: Not a directory\n")
        .assert_stdout(&format!("{}\n", cwd.display()))
        .run()
        .await;
}

#[tokio::test]
async fn exit() {
    TestBuilder::new()
        .command("exit")
        .assert_exit(true)
        .run()
        .await;

    TestBuilder::new()
        .command("exit 5\necho not printed")
        .assert_exit_code(5)
        .assert_exit(true)
        .run()
        .await;

    TestBuilder::new()
        .command("exit 1 2\necho still running")
        .assert_stderr("exit: too many arguments\n")
        .assert_stdout("still running\n")
        .assert_exit(false)
        .run()
        .await;

    TestBuilder::new()
        .command("exit abc")
        .assert_stderr("exit: abc: numeric argument required\n")
        .assert_exit_code(2)
        .assert_exit(true)
        .run()
        .await;
}

#[tokio::test]
async fn syntax_errors() {
    TestBuilder::new()
        .command("ls >")
        .assert_stderr("pipesh: syntax error: expected a file name after '>'\n")
        .assert_exit_code(2)
        .run()
        .await;

    TestBuilder::new()
        .command("sort < | cat")
        .assert_stderr("pipesh: syntax error: expected a file name after '<'\n")
        .assert_exit_code(2)
        .run()
        .await;

    TestBuilder::new()
        .command("echo a |")
        .assert_stderr("pipesh: syntax error: expected a command after '|'\n")
        .assert_exit_code(2)
        .run()
        .await;

    TestBuilder::new()
        .command("| echo a")
        .assert_stderr("pipesh: syntax error: unexpected input: | echo a\n")
        .assert_exit_code(2)
        .run()
        .await;

    TestBuilder::new()
        .command("> out.txt")
        .assert_stderr("pipesh: syntax error: redirection without a command\n")
        .assert_exit_code(2)
        .assert_not_exists("out.txt")
        .run()
        .await;

    // the bad line is skipped, the following ones still run
    TestBuilder::new()
        .command("echo a > \necho b > out.txt")
        .assert_stderr("pipesh: syntax error: expected a file name after '>'\n")
        .assert_file_equals("out.txt", "b\n")
        .run()
        .await;

    TestBuilder::new()
        .command("\n   \n\t\n")
        .assert_exit_code(0)
        .run()
        .await;
}

#[tokio::test]
async fn background() {
    TestBuilder::new()
        .command("sh -c \"sleep 0.5; echo background\" &\necho foreground")
        .assert_stdout("foreground\nbackground\n")
        .run()
        .await;

    // an abandoned background pipeline does not hold up the next line
    TestBuilder::new()
        .command("sleep 1 | help &\necho after")
        .assert_stderr("help: builtin commands cannot be used in a pipeline\n")
        .assert_stdout("after\n")
        .run()
        .await;

    // the status of a background pipeline is not the script's
    TestBuilder::new()
        .command("sh -c \"exit 3\" &")
        .assert_exit_code(0)
        .run()
        .await;

    TestBuilder::new()
        .command("echo 1 | tr 1 2 > out.txt &")
        .assert_exists("out.txt")
        .assert_file_equals("out.txt", "2\n")
        .run()
        .await;
}

struct CountingCommand {
    calls: Rc<Cell<usize>>,
}

impl ShellCommand for CountingCommand {
    fn execute(&self, mut context: ShellCommandContext) -> ExecuteResult {
        self.calls.set(self.calls.get() + 1);
        let _ = context
            .stdout
            .write_line(&format!("{} in {}", context.args.join(" "), context.state.cwd().display()));
        ExecuteResult::from_exit_code(0)
    }
}

#[tokio::test]
async fn custom_commands() {
    let calls = Rc::new(Cell::new(0));
    let mut builder = TestBuilder::new();
    let cwd = builder.temp_dir_path();
    builder
        .custom_command(
            "count",
            Rc::new(CountingCommand {
                calls: calls.clone(),
            }),
        )
        .command("count a b\ncount c")
        .assert_stdout(&format!("a b in {0}\nc in {0}\n", cwd.display()))
        .run()
        .await;
    assert_eq!(calls.get(), 2);

    // never spawned when part of a pipeline
    let calls = Rc::new(Cell::new(0));
    TestBuilder::new()
        .custom_command(
            "count",
            Rc::new(CountingCommand {
                calls: calls.clone(),
            }),
        )
        .command("echo 1 | count")
        .assert_stderr("count: builtin commands cannot be used in a pipeline\n")
        .assert_exit_code(1)
        .run()
        .await;
    assert_eq!(calls.get(), 0);
}
