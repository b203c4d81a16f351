//! Test execution through pytest

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, instrument};

use scout_core::config::RunnerConfig;
use scout_core::{truncate_chars, Result, ScoutError, TestCase, TestOutcome};

/// Longest error message kept per result
const MAX_ERROR_CHARS: usize = 2_000;

/// pytest exit code when no tests were collected
const PYTEST_NO_TESTS: i32 = 5;

/// Outcome of running one test file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub outcome: TestOutcome,
    pub duration: Duration,
    pub error_message: Option<String>,
}

/// Runs one test case (allows faking in tests)
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run the test module at `code_path` for `case`
    ///
    /// A test that fails is `Ok` with a FAILED outcome; `Err` means the runner
    /// itself could not be started.
    async fn run(&self, case: &TestCase, code_path: &Path) -> Result<RunOutput>;
}

/// Runs each case as `python -m pytest <file> -q`
#[derive(Debug, Clone)]
pub struct PytestRunner {
    python: String,
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl PytestRunner {
    pub fn new(python: impl Into<String>, timeout: Duration) -> Self {
        Self {
            python: python.into(),
            timeout,
            working_dir: None,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(
            config.python.clone(),
            Duration::from_secs(config.test_timeout_secs),
        )
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// The most useful line of pytest output: the last `E ` line, else the tail
fn failure_message(stdout: &str, stderr: &str) -> String {
    let combined = format!("{}\n{}", stdout, stderr);
    if let Some(line) = combined
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with("E "))
    {
        return line.trim_start().trim_start_matches("E ").trim().to_string();
    }

    let tail: Vec<&str> = combined
        .lines()
        .filter(|l| !l.trim().is_empty())
        .collect();
    let start = tail.len().saturating_sub(5);
    truncate_chars(&tail[start..].join("\n"), MAX_ERROR_CHARS)
}

/// Map a pytest exit status and output to an outcome
pub fn classify(exit_code: Option<i32>, stdout: &str, stderr: &str) -> (TestOutcome, Option<String>) {
    match exit_code {
        Some(0) => (TestOutcome::Passed, None),
        Some(PYTEST_NO_TESTS) => (
            TestOutcome::Skipped,
            Some("no tests collected".to_string()),
        ),
        Some(code) => {
            let message = failure_message(stdout, stderr);
            let message = if message.is_empty() {
                format!("pytest exited with code {}", code)
            } else {
                truncate_chars(&message, MAX_ERROR_CHARS)
            };
            (TestOutcome::Failed, Some(message))
        }
        None => (
            TestOutcome::Failed,
            Some("pytest terminated by signal".to_string()),
        ),
    }
}

#[async_trait]
impl TestRunner for PytestRunner {
    #[instrument(skip(self, case), fields(test = %case.name))]
    async fn run(&self, case: &TestCase, code_path: &Path) -> Result<RunOutput> {
        let started = Instant::now();
        if !code_path.exists() {
            return Ok(RunOutput {
                outcome: TestOutcome::Failed,
                duration: started.elapsed(),
                error_message: Some(format!("test file missing: {}", code_path.display())),
            });
        }

        let mut command = Command::new(&self.python);
        command
            .arg("-m")
            .arg("pytest")
            .arg(code_path)
            .arg("-q")
            .arg("-p")
            .arg("no:cacheprovider")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        debug!("Running {} -m pytest {}", self.python, code_path.display());
        let child = command
            .spawn()
            .map_err(|e| ScoutError::Runner(format!("Failed to start {}: {}", self.python, e)))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output
                .map_err(|e| ScoutError::Runner(format!("Failed to wait for pytest: {}", e)))?,
            Err(_) => {
                return Ok(RunOutput {
                    outcome: TestOutcome::Failed,
                    duration: started.elapsed(),
                    error_message: Some(format!("timed out after {}s", self.timeout.as_secs())),
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let (outcome, error_message) = classify(output.status.code(), &stdout, &stderr);
        debug!("{} finished: {}", case.name, outcome);

        Ok(RunOutput {
            outcome,
            duration: started.elapsed(),
            error_message,
        })
    }
}
