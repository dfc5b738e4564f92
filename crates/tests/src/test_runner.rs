use miette::IntoDiagnostic;
use std::path::Path;

use crate::test_builder::TestBuilder;

/// One case of a test-data file: a script and what it must produce.
///
/// ```text
/// # comment
/// > echo a | tr a b
/// b
/// > exit 3
/// %exit 3
/// %empty
/// ```
///
/// Consecutive `>` lines form one script. The lines that follow are the
/// expected stdout, `%empty` stands for no output at all and `%exit <code>`
/// sets the expected exit code.
#[derive(Debug, Default)]
pub struct TestCase {
    pub line_number: usize,
    pub script: String,
    pub expected_output: Vec<String>,
    pub expected_exit_code: i32,
    pub expects_empty_output: bool,
}

impl TestCase {
    fn is_complete(&self) -> bool {
        !self.script.is_empty() && (self.expects_empty_output || !self.expected_output.is_empty())
    }

    fn expected_stdout(&self) -> String {
        if self.expects_empty_output {
            String::new()
        } else {
            self.expected_output.iter().map(|line| format!("{line}\n")).collect()
        }
    }
}

pub struct Tests {
    cases: Vec<TestCase>,
}

impl Tests {
    pub fn load_from_file(path: &Path) -> miette::Result<Self> {
        let content = std::fs::read_to_string(path).into_diagnostic()?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> miette::Result<Self> {
        let mut cases = Vec::new();
        let mut current = TestCase::default();

        for (index, line) in content.lines().enumerate() {
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }

            if let Some(command) = line.strip_prefix('>') {
                if current.is_complete() {
                    cases.push(std::mem::take(&mut current));
                }
                if current.script.is_empty() {
                    current.line_number = index + 1;
                } else {
                    current.script.push('\n');
                }
                current.script.push_str(command.trim());
            } else if current.script.is_empty() {
                miette::bail!("line {}: expected output without a command", index + 1);
            } else if line == "%empty" {
                current.expects_empty_output = true;
            } else if let Some(code) = line.strip_prefix("%exit ") {
                current.expected_exit_code = code.trim().parse().into_diagnostic()?;
            } else {
                current.expected_output.push(line.to_string());
            }
        }

        if current.is_complete() {
            cases.push(current);
        } else if !current.script.is_empty() {
            miette::bail!("line {}: command without expected output", current.line_number);
        }

        Ok(Self { cases })
    }

    pub async fn execute(&self) {
        for case in &self.cases {
            TestBuilder::new()
                .command(&case.script)
                .assert_stdout(&case.expected_stdout())
                .assert_exit_code(case.expected_exit_code)
                .run()
                .await;
        }
    }
}

#[test]
fn parses_test_cases() {
    let tests = Tests::parse(concat!(
        "# comment\n",
        "> echo a\n",
        "> echo b\n",
        "a\n",
        "b\n",
        "\n",
        "> false\n",
        "%exit 1\n",
        "%empty\n",
    ))
    .unwrap();
    assert_eq!(tests.cases.len(), 2);
    assert_eq!(tests.cases[0].script, "echo a\necho b");
    assert_eq!(tests.cases[0].expected_stdout(), "a\nb\n");
    assert_eq!(tests.cases[0].line_number, 2);
    assert_eq!(tests.cases[1].expected_stdout(), "");
    assert_eq!(tests.cases[1].expected_exit_code, 1);

    assert!(Tests::parse("> echo a\n").is_err());
    assert!(Tests::parse("a\n").is_err());
}

#[tokio::test]
async fn tests_from_files() {
    let test_folder = Path::new(env!("CARGO_MANIFEST_DIR")).join("test-data");

    let mut paths = std::fs::read_dir(&test_folder)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "sh"))
        .collect::<Vec<_>>();
    paths.sort();
    assert!(!paths.is_empty());

    for path in paths {
        let tests = Tests::load_from_file(&path).unwrap();
        tests.execute().await;
    }
}
