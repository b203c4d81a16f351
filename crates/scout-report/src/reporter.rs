//! Execution reporter - runs approved cases and assembles a TestReport

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use scout_browser::{ActionExecutor, CaptureStore};
use scout_core::fail_open::fail_open;
use scout_core::{
    ActionRequest, PageCapture, Result, TestCase, TestOutcome, TestReport, TestResult, TestStatus,
};

use crate::runner::TestRunner;

/// Captures page state at the point of a failure through the shared browser
pub struct FailureCapturer {
    executor: Arc<dyn ActionExecutor>,
    captures: Arc<CaptureStore>,
    /// One browser, one capture at a time
    browser: Mutex<()>,
}

impl FailureCapturer {
    pub fn new(executor: Arc<dyn ActionExecutor>, captures: Arc<CaptureStore>) -> Self {
        Self {
            executor,
            captures,
            browser: Mutex::new(()),
        }
    }

    /// Navigate to `url`, screenshot, and store the capture (deduplicated by hash)
    pub async fn capture(&self, url: &str) -> Result<Arc<PageCapture>> {
        let _guard = self.browser.lock().await;
        self.executor
            .apply(&ActionRequest::Navigate {
                url: url.to_string(),
            })
            .await?;
        let observation = self.executor.apply(&ActionRequest::Screenshot).await?;
        let (capture, inserted) = self.captures.insert_observation(&observation)?;
        info!(
            "Failure capture {} for {} ({})",
            capture.content_hash.short(),
            url,
            if inserted { "new" } else { "reused" }
        );
        Ok(capture)
    }
}

/// Runs test cases and reports on them
pub struct ExecutionReporter {
    runner: Arc<dyn TestRunner>,
    /// Directory holding approved `<name>.py` modules
    code_dir: PathBuf,
    workers: usize,
    capturer: Option<FailureCapturer>,
}

impl ExecutionReporter {
    pub fn new(runner: Arc<dyn TestRunner>, code_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            code_dir: code_dir.into(),
            workers: 1,
            capturer: None,
        }
    }

    /// Run up to `workers` cases at once; the report keeps input order
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_failure_capture(mut self, capturer: FailureCapturer) -> Self {
        self.capturer = Some(capturer);
        self
    }

    /// Execute `cases`, reporting anything not APPROVED as SKIPPED
    pub async fn execute(&self, cases: &[TestCase]) -> TestReport {
        let start = Utc::now();
        info!(
            "Executing {} test case(s) with {} worker(s)",
            cases.len(),
            self.workers
        );

        let results: Vec<TestResult> = stream::iter(cases)
            .map(|case| self.run_one(case))
            .buffered(self.workers)
            .collect()
            .await;

        let report = TestReport::from_results(start, Utc::now(), results);
        info!(
            "Report {}: {} passed, {} failed, {} skipped",
            report.id, report.passed, report.failed, report.skipped
        );
        report
    }

    async fn run_one(&self, case: &TestCase) -> TestResult {
        if case.status != TestStatus::Approved {
            return TestResult::skipped(&case.name, format!("not approved ({})", case.status));
        }

        let code_path = self.code_dir.join(format!("{}.py", case.name));
        let mut result = match self.runner.run(case, &code_path).await {
            Ok(output) => TestResult {
                test_name: case.name.clone(),
                status: output.outcome,
                duration_ms: output.duration.as_millis() as u64,
                error_message: output.error_message,
                failure_screenshot_ref: None,
                failure_html_ref: None,
            },
            Err(e) => {
                error!("Runner failed for {}: {}", case.name, e);
                TestResult {
                    test_name: case.name.clone(),
                    status: TestOutcome::Failed,
                    duration_ms: 0,
                    error_message: Some(e.to_string()),
                    failure_screenshot_ref: None,
                    failure_html_ref: None,
                }
            }
        };

        if result.status == TestOutcome::Failed {
            warn!("{} failed: {}", case.name, result.error_message.as_deref().unwrap_or(""));
            if let Some(capturer) = &self.capturer {
                if let Some(capture) =
                    fail_open("failure_capture", || capturer.capture(&case.target_url)).await
                {
                    result.failure_screenshot_ref = capture.screenshot_ref.clone();
                    result.failure_html_ref = Some(format!("{}.html", capture.content_hash));
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunOutput;
    use async_trait::async_trait;
    use scout_core::{ActionError, Observation};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Passes tests whose name ends in "_ok", fails the rest
    struct NameRunner {
        delay: Duration,
    }

    #[async_trait]
    impl TestRunner for NameRunner {
        async fn run(&self, case: &TestCase, _code_path: &Path) -> Result<RunOutput> {
            tokio::time::sleep(self.delay).await;
            let passed = case.name.ends_with("_ok");
            Ok(RunOutput {
                outcome: if passed {
                    TestOutcome::Passed
                } else {
                    TestOutcome::Failed
                },
                duration: self.delay,
                error_message: (!passed).then(|| "AssertionError".to_string()),
            })
        }
    }

    struct PageExecutor {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ActionExecutor for PageExecutor {
        async fn apply(&self, _action: &ActionRequest) -> std::result::Result<Observation, ActionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ActionError::driver("browser gone"));
            }
            Ok(Observation {
                url: "https://example.com/".into(),
                html: "<main>error page</main>".into(),
                screenshot: vec![9, 9, 9],
                status: "ok".into(),
                resolved: None,
            })
        }
    }

    fn approved(name: &str) -> TestCase {
        let mut case = TestCase::new_draft(name, "https://example.com/", "s", "");
        case.status = TestStatus::Approved;
        case
    }

    #[tokio::test]
    async fn test_counts_order_and_skips() {
        let reporter = ExecutionReporter::new(
            Arc::new(NameRunner {
                delay: Duration::from_millis(5),
            }),
            "tests/approved",
        )
        .with_workers(4);

        let draft = TestCase::new_draft("test_draft_ok", "https://example.com/", "s", "");
        let cases = vec![
            approved("test_a_ok"),
            approved("test_b_fail"),
            draft,
            approved("test_c_ok"),
        ];
        let report = reporter.execute(&cases).await;

        assert!(report.is_consistent());
        assert_eq!((report.total, report.passed, report.failed, report.skipped), (4, 2, 1, 1));
        let names: Vec<&str> = report.results.iter().map(|r| r.test_name.as_str()).collect();
        assert_eq!(names, vec!["test_a_ok", "test_b_fail", "test_draft_ok", "test_c_ok"]);
        assert_eq!(report.results[2].status, TestOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_failures_get_captures() {
        let captures = Arc::new(CaptureStore::in_memory());
        let executor = Arc::new(PageExecutor {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let reporter = ExecutionReporter::new(
            Arc::new(NameRunner {
                delay: Duration::ZERO,
            }),
            "tests/approved",
        )
        .with_workers(2)
        .with_failure_capture(FailureCapturer::new(executor.clone(), Arc::clone(&captures)));

        let report = reporter
            .execute(&[approved("test_a_fail"), approved("test_b_fail"), approved("test_c_ok")])
            .await;

        let failed: Vec<&TestResult> = report
            .results
            .iter()
            .filter(|r| r.status == TestOutcome::Failed)
            .collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().all(|r| r.failure_html_ref.is_some()));
        assert!(failed.iter().all(|r| r.failure_screenshot_ref.is_some()));
        // Identical failure pages dedupe to one capture
        assert_eq!(captures.len(), 1);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 4);
        assert!(report.results[2].failure_html_ref.is_none());
    }

    #[tokio::test]
    async fn test_capture_failure_is_fail_open() {
        let reporter = ExecutionReporter::new(
            Arc::new(NameRunner {
                delay: Duration::ZERO,
            }),
            "tests/approved",
        )
        .with_failure_capture(FailureCapturer::new(
            Arc::new(PageExecutor {
                calls: AtomicUsize::new(0),
                fail: true,
            }),
            Arc::new(CaptureStore::in_memory()),
        ));

        let report = reporter.execute(&[approved("test_a_fail")]).await;
        assert_eq!(report.failed, 1);
        assert!(report.results[0].failure_html_ref.is_none());
        assert_eq!(report.results[0].error_message.as_deref(), Some("AssertionError"));
    }
}
