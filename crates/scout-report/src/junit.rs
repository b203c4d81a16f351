//! Report rendering: JUnit XML for CI, plain text for people

use scout_core::{TestOutcome, TestReport};

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && !matches!(c, '\n' | '\r' | '\t') => {}
            c => out.push(c),
        }
    }
    out
}

fn secs(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

/// Render a report as a single JUnit `<testsuite>`
pub fn render_junit(report: &TestReport) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!(
        "<testsuite name=\"scout\" tests=\"{}\" failures=\"{}\" errors=\"0\" skipped=\"{}\" time=\"{}\" timestamp=\"{}\" id=\"{}\">\n",
        report.total,
        report.failed,
        report.skipped,
        secs(report.duration_ms().max(0) as u64),
        report.execution_start.format("%Y-%m-%dT%H:%M:%S"),
        xml_escape(&report.id),
    ));

    for result in &report.results {
        let open = format!(
            "  <testcase classname=\"scout.{name}\" name=\"{name}\" time=\"{time}\"",
            name = xml_escape(&result.test_name),
            time = secs(result.duration_ms)
        );
        let message = xml_escape(result.error_message.as_deref().unwrap_or(""));

        match result.status {
            TestOutcome::Passed => xml.push_str(&format!("{}/>\n", open)),
            TestOutcome::Skipped => {
                xml.push_str(&format!("{}>\n    <skipped message=\"{}\"/>\n", open, message));
                xml.push_str("  </testcase>\n");
            }
            TestOutcome::Failed => {
                xml.push_str(&format!(
                    "{}>\n    <failure message=\"{}\">{}</failure>\n",
                    open, message, message
                ));
                let artifacts: Vec<String> = [
                    result.failure_screenshot_ref.as_ref(),
                    result.failure_html_ref.as_ref(),
                ]
                .into_iter()
                .flatten()
                .map(|r| format!("[[ATTACHMENT|captures/{}]]", xml_escape(r)))
                .collect();
                if !artifacts.is_empty() {
                    xml.push_str(&format!(
                        "    <system-out>{}</system-out>\n",
                        artifacts.join("\n")
                    ));
                }
                xml.push_str("  </testcase>\n");
            }
        }
    }

    xml.push_str("</testsuite>\n");
    xml
}

/// Render a human-readable summary
pub fn render_summary(report: &TestReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Scout test report {}\n", report.id));
    out.push_str(&format!(
        "Started:  {}\nFinished: {}\nDuration: {}ms\n\n",
        report.execution_start.format("%Y-%m-%d %H:%M:%S UTC"),
        report.execution_end.format("%Y-%m-%d %H:%M:%S UTC"),
        report.duration_ms()
    ));

    for result in &report.results {
        out.push_str(&format!(
            "  {:<8} {} ({}ms)\n",
            result.status.to_string(),
            result.test_name,
            result.duration_ms
        ));
        if let Some(message) = &result.error_message {
            if result.status == TestOutcome::Failed {
                out.push_str(&format!("           {}\n", message));
            }
        }
        if let Some(shot) = &result.failure_screenshot_ref {
            out.push_str(&format!("           screenshot: captures/{}\n", shot));
        }
        if let Some(html) = &result.failure_html_ref {
            out.push_str(&format!("           dom:        captures/{}\n", html));
        }
    }

    out.push_str(&format!(
        "\nTotal: {}  Passed: {}  Failed: {}  Skipped: {}  ({:.1}% pass rate)\n",
        report.total,
        report.passed,
        report.failed,
        report.skipped,
        report.success_rate()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use scout_core::TestResult;

    fn report() -> TestReport {
        let start = Utc::now();
        TestReport::from_results(
            start,
            start + Duration::milliseconds(1500),
            vec![
                TestResult {
                    test_name: "test_home".into(),
                    status: TestOutcome::Passed,
                    duration_ms: 800,
                    error_message: None,
                    failure_screenshot_ref: None,
                    failure_html_ref: None,
                },
                TestResult {
                    test_name: "test_cart".into(),
                    status: TestOutcome::Failed,
                    duration_ms: 700,
                    error_message: Some("expected <div> & \"cart\"".into()),
                    failure_screenshot_ref: Some("abc.png".into()),
                    failure_html_ref: Some("abc.html".into()),
                },
                TestResult::skipped("test_draft", "not approved (draft)"),
            ],
        )
    }

    #[test]
    fn test_junit_structure_and_escaping() {
        let xml = render_junit(&report());
        assert!(xml.contains("tests=\"3\" failures=\"1\" errors=\"0\" skipped=\"1\" time=\"1.500\""));
        assert!(xml.contains("<testcase classname=\"scout.test_home\" name=\"test_home\" time=\"0.800\"/>"));
        assert!(xml.contains("message=\"expected &lt;div&gt; &amp; &quot;cart&quot;\""));
        assert!(xml.contains("[[ATTACHMENT|captures/abc.png]]"));
        assert!(xml.contains("<skipped message=\"not approved (draft)\"/>"));
        assert!(xml.trim_end().ends_with("</testsuite>"));
    }

    #[test]
    fn test_summary_lists_every_result() {
        let summary = render_summary(&report());
        assert!(summary.contains("PASSED   test_home (800ms)"));
        assert!(summary.contains("FAILED   test_cart (700ms)"));
        assert!(summary.contains("screenshot: captures/abc.png"));
        assert!(summary.contains("Total: 3  Passed: 1  Failed: 1  Skipped: 1"));
    }
}
