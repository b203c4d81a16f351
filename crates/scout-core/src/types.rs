//! Core type definitions for Scout

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ActionErrorKind, ModelErrorKind};

/// Maximum characters of HTML kept in a stored capture
pub const MAX_CAPTURE_HTML_CHARS: usize = 50_000;

const HTML_TRUNCATION_MARKER: &str = "\n<!-- HTML truncated -->";

// ============================================================================
// Captures
// ============================================================================

/// SHA-256 content hash (lowercase hex) identifying a capture
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Hash normalized HTML followed by the screenshot bytes
    pub fn compute(html: &str, screenshot: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize_html(html).as_bytes());
        hasher.update(screenshot);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for logs and prompts
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collapse whitespace runs so formatting-only differences hash equally
pub fn normalize_html(html: &str) -> String {
    html.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 of the normalized HTML alone
pub fn html_digest(html: &str) -> String {
    hex::encode(Sha256::digest(normalize_html(html).as_bytes()))
}

/// Information about a capture that could not be taken cleanly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureErrorInfo {
    /// NETWORK_ERROR, TIMEOUT, HTTP_ERROR
    pub error_type: String,
    pub error_code: Option<u16>,
    pub error_message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Snapshot of a page's DOM and visual state at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCapture {
    pub id: String,
    pub url: String,
    pub html_digest: String,
    /// Captured DOM, bounded to [`MAX_CAPTURE_HTML_CHARS`]
    pub html_content: String,
    /// Screenshot file name relative to the capture directory
    pub screenshot_ref: Option<String>,
    pub content_hash: ContentHash,
    pub captured_at: DateTime<Utc>,
    pub error_info: Option<CaptureErrorInfo>,
}

impl PageCapture {
    /// Build a capture from raw page state; identity is the content hash
    pub fn new(url: impl Into<String>, html: &str, screenshot: &[u8]) -> Self {
        let content_hash = ContentHash::compute(html, screenshot);
        Self {
            id: format!("capture_{}", content_hash.short()),
            url: url.into(),
            html_digest: html_digest(html),
            html_content: bound_html(html, MAX_CAPTURE_HTML_CHARS),
            screenshot_ref: None,
            content_hash,
            captured_at: Utc::now(),
            error_info: None,
        }
    }

    pub fn with_error(mut self, error_info: CaptureErrorInfo) -> Self {
        self.error_info = Some(error_info);
        self
    }

    /// Extract the `<title>` text if present
    pub fn title(&self) -> Option<String> {
        let start = self.html_content.find("<title>")? + "<title>".len();
        let end = self.html_content[start..].find("</title>")? + start;
        let title = self.html_content[start..end].trim();
        (!title.is_empty()).then(|| title.to_string())
    }
}

/// Truncate HTML to `max` characters, appending a marker when cut
pub fn bound_html(html: &str, max: usize) -> String {
    match html.char_indices().nth(max) {
        Some((idx, _)) => format!("{}{}", &html[..idx], HTML_TRUNCATION_MARKER),
        None => html.to_string(),
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Element-locating hint supplied by the model
///
/// A bare string hint is interpreted as visible text, test identifier and CSS
/// selector in turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
}

impl SelectorHint {
    /// Hint from a single free-form string
    pub fn bare(hint: impl Into<String>) -> Self {
        let hint = hint.into();
        Self {
            role: None,
            text: Some(hint.clone()),
            test_id: Some(hint.clone()),
            css: Some(hint),
        }
    }

    pub fn is_empty(&self) -> bool {
        [&self.role, &self.text, &self.test_id, &self.css]
            .iter()
            .all(|v| v.as_deref().map(str::trim).unwrap_or("").is_empty())
    }
}

impl std::fmt::Display for SelectorHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(role) = &self.role {
            parts.push(format!("role={}", role));
        }
        if let Some(text) = &self.text {
            parts.push(format!("text='{}'", text));
        }
        if let Some(id) = &self.test_id {
            if self.text.as_ref() != Some(id) {
                parts.push(format!("test_id={}", id));
            }
        }
        if let Some(css) = &self.css {
            if self.text.as_ref() != Some(css) {
                parts.push(format!("css={}", css));
            }
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// Condition a WAIT action blocks on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaitCondition {
    /// Fixed delay
    Millis { ms: u64 },
    /// Until an element matching the hint is present
    Selector { hint: SelectorHint },
    /// Until network activity has been quiet for a while
    NetworkSettled,
}

/// One atomic browser interaction, or the terminal completion signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionRequest {
    Navigate { url: String },
    Click { selector_hint: SelectorHint },
    Type { selector_hint: SelectorHint, text: String },
    Wait { condition: WaitCondition },
    Screenshot,
    Complete { summary: String },
}

impl ActionRequest {
    /// Whether this action ends the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "NAVIGATE",
            Self::Click { .. } => "CLICK",
            Self::Type { .. } => "TYPE",
            Self::Wait { .. } => "WAIT",
            Self::Screenshot => "SCREENSHOT",
            Self::Complete { .. } => "COMPLETE",
        }
    }
}

impl std::fmt::Display for ActionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Navigate { url } => write!(f, "NAVIGATE {}", url),
            Self::Click { selector_hint } => write!(f, "CLICK {}", selector_hint),
            Self::Type {
                selector_hint,
                text,
            } => write!(f, "TYPE '{}' into {}", text, selector_hint),
            Self::Wait { condition } => match condition {
                WaitCondition::Millis { ms } => write!(f, "WAIT {}ms", ms),
                WaitCondition::Selector { hint } => write!(f, "WAIT for {}", hint),
                WaitCondition::NetworkSettled => write!(f, "WAIT for network"),
            },
            Self::Screenshot => write!(f, "SCREENSHOT"),
            Self::Complete { .. } => write!(f, "COMPLETE"),
        }
    }
}

/// Selector resolution tier, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorTier {
    /// Accessible role and visible text / accessible name
    RoleText,
    /// Test identifier attribute (data-testid and friends)
    TestId,
    /// Raw structural CSS selector
    Structural,
}

impl SelectorTier {
    pub const ALL: [SelectorTier; 3] = [Self::RoleText, Self::TestId, Self::Structural];

    /// Base stability score before selector-specific penalties
    pub fn base_score(&self) -> f64 {
        match self {
            Self::RoleText => 1.0,
            Self::TestId => 0.8,
            Self::Structural => 0.4,
        }
    }
}

impl std::fmt::Display for SelectorTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoleText => write!(f, "role_text"),
            Self::TestId => write!(f, "test_id"),
            Self::Structural => write!(f, "structural"),
        }
    }
}

/// Which tier located an element, and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSelector {
    pub tier: SelectorTier,
    /// Playwright-style selector text (`role=button[name='Go']`, `[data-testid='x']`, css)
    pub selector_text: String,
    /// button, link, input, element
    pub element_type: String,
    /// Role when known, used to generate role locators
    #[serde(default)]
    pub role: Option<String>,
    /// Visible text / accessible name when known
    #[serde(default)]
    pub name: Option<String>,
    /// Selectors from the other buildable tiers
    #[serde(default)]
    pub fallback_selectors: Vec<String>,
}

/// Result of applying one action to the browser
#[derive(Debug, Clone)]
pub struct Observation {
    /// Page URL after the action
    pub url: String,
    pub html: String,
    pub screenshot: Vec<u8>,
    /// Driver status line (e.g. "navigated to ...", "clicked ...")
    pub status: String,
    pub resolved: Option<ResolvedSelector>,
}

/// A parsed model reply: the action plus any narrative text that came with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelReply {
    pub action: ActionRequest,
    #[serde(default)]
    pub narrative: Option<String>,
}

impl ModelReply {
    pub fn action(action: ActionRequest) -> Self {
        Self {
            action,
            narrative: None,
        }
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Agent session status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    Running,
    Completed,
    Failed,
    Aborted,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Part of a step where a timeout fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    Initialization,
    Inference,
    Action,
}

impl std::fmt::Display for StepPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialization => write!(f, "initialization"),
            Self::Inference => write!(f, "inference"),
            Self::Action => write!(f, "action"),
        }
    }
}

/// Why a session stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TerminationReason {
    Completed { summary: String },
    MaxStepsReached { max_steps: usize },
    Stalled { content_hash: ContentHash },
    Cancelled,
    BudgetExhausted,
    ModelFailure { kind: ModelErrorKind, status: Option<u16>, message: String },
    ActionFailure { kind: ActionErrorKind, message: String },
    StepTimeout { phase: StepPhase },
    /// A transition the loop state machine does not allow
    Internal { message: String },
}

impl TerminationReason {
    /// Session status implied by this reason
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Completed { .. } => SessionStatus::Completed,
            Self::MaxStepsReached { .. }
            | Self::Stalled { .. }
            | Self::Cancelled
            | Self::BudgetExhausted => SessionStatus::Aborted,
            Self::ModelFailure { .. }
            | Self::ActionFailure { .. }
            | Self::StepTimeout { .. }
            | Self::Internal { .. } => SessionStatus::Failed,
        }
    }

    /// Short error-kind label (e.g. `RATE_LIMITED`, `STEP_TIMEOUT`)
    pub fn kind_label(&self) -> String {
        match self {
            Self::Completed { .. } => "COMPLETED".to_string(),
            Self::MaxStepsReached { .. } => "MAX_STEPS".to_string(),
            Self::Stalled { .. } => "STALLED".to_string(),
            Self::Cancelled => "CANCELLED".to_string(),
            Self::BudgetExhausted => "BUDGET_EXHAUSTED".to_string(),
            Self::ModelFailure { kind, .. } => kind.to_string(),
            Self::ActionFailure { kind, .. } => kind.to_string(),
            Self::StepTimeout { .. } => "STEP_TIMEOUT".to_string(),
            Self::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed { summary } => write!(f, "completed: {}", summary),
            Self::MaxStepsReached { max_steps } => write!(f, "max steps ({}) reached", max_steps),
            Self::Stalled { content_hash } => {
                write!(f, "stalled on unchanged page {}", content_hash.short())
            }
            Self::Cancelled => write!(f, "cancelled by user"),
            Self::BudgetExhausted => write!(f, "session wall-clock budget exhausted"),
            Self::ModelFailure {
                kind,
                status,
                message,
            } => match status {
                Some(s) => write!(f, "model {} (HTTP {}): {}", kind, s, message),
                None => write!(f, "model {}: {}", kind, message),
            },
            Self::ActionFailure { kind, message } => write!(f, "action {}: {}", kind, message),
            Self::StepTimeout { phase } => write!(f, "step timed out during {}", phase),
            Self::Internal { message } => write!(f, "internal: {}", message),
        }
    }
}

/// Where and why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Termination {
    pub reason: TerminationReason,
    pub at_step: usize,
    pub last_turn_index: Option<usize>,
}

/// One iteration of the agent loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub turn_index: usize,
    /// Observation the prompt for this turn was built from
    pub prompt_context_ref: Option<ContentHash>,
    pub model_response: ModelReply,
    pub action_taken: Option<ActionRequest>,
    pub observation_ref: Option<ContentHash>,
    /// Page URL after the action
    pub page_url: Option<String>,
    pub resolved_selector: Option<ResolvedSelector>,
    /// Observation matched one already seen in this session
    pub stalled: bool,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl Turn {
    /// A turn whose action ran and produced an observation
    pub fn is_usable(&self) -> bool {
        self.action_taken.is_some() && self.observation_ref.is_some() && self.error.is_none()
    }
}

/// Iterative model/browser conversation for one target URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSession {
    pub session_id: String,
    pub target_url: String,
    pub goal: String,
    pub model: String,
    pub turns: Vec<Turn>,
    pub status: SessionStatus,
    pub step_count: usize,
    pub initial_capture: Option<ContentHash>,
    pub summary: Option<String>,
    pub termination: Option<Termination>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl AgentSession {
    pub fn new(target_url: impl Into<String>, goal: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            session_id: format!("session-{}", &Uuid::new_v4().simple().to_string()[..12]),
            target_url: target_url.into(),
            goal: goal.into(),
            model: model.into(),
            turns: Vec::new(),
            status: SessionStatus::Running,
            step_count: 0,
            initial_capture: None,
            summary: None,
            termination: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn last_turn_index(&self) -> Option<usize> {
        self.turns.last().map(|t| t.turn_index)
    }

    /// Turns whose action produced an observation
    pub fn usable_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| t.is_usable())
    }

    /// Whether anything can be synthesized from this session
    pub fn has_usable_trace(&self) -> bool {
        self.initial_capture.is_some() || self.usable_turns().next().is_some()
    }

    /// Seal the session; a finished session is never re-terminated
    pub fn terminate(&mut self, reason: TerminationReason) {
        if self.is_finished() {
            return;
        }
        self.status = reason.status();
        if let TerminationReason::Completed { summary } = &reason {
            self.summary = Some(summary.clone());
        }
        self.termination = Some(Termination {
            reason,
            at_step: self.step_count,
            last_turn_index: self.last_turn_index(),
        });
        self.ended_at = Some(Utc::now());
    }

    /// One-line description of how the session ended
    pub fn outcome_line(&self) -> String {
        match &self.termination {
            Some(t) => format!(
                "{} [{}] at step {}{}: {}",
                self.status,
                t.reason.kind_label(),
                t.at_step,
                t.last_turn_index
                    .map(|i| format!(" (last turn {})", i))
                    .unwrap_or_default(),
                t.reason
            ),
            None => format!("{} at step {}", self.status, self.step_count),
        }
    }
}

// ============================================================================
// Test cases
// ============================================================================

/// Governance state of a test case
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    #[default]
    Draft,
    Approved,
    Deprecated,
}

impl TestStatus {
    /// Whether `self -> next` is an allowed lifecycle move
    pub fn can_advance_to(&self, next: TestStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Approved)
                | (Self::Draft, Self::Deprecated)
                | (Self::Approved, Self::Deprecated)
        )
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Deprecated => "deprecated",
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl std::str::FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "approved" => Ok(Self::Approved),
            "deprecated" => Ok(Self::Deprecated),
            _ => Err(format!("Invalid test status: {}", s)),
        }
    }
}

/// Element selector used by a test, with its stability rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorInfo {
    pub element_type: String,
    pub selector_text: String,
    pub selector_type: SelectorTier,
    /// 0.0-1.0, higher is more likely to survive unrelated UI changes
    pub stability_score: f64,
    #[serde(default)]
    pub fallback_selectors: Vec<String>,
}

/// One recorded status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: TestStatus,
    pub to: TestStatus,
    pub at: DateTime<Utc>,
}

/// Executable test case synthesized from a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    /// Python test function name; unique across the collection
    pub name: String,
    pub description: String,
    pub target_url: String,
    pub source_session_id: String,
    pub test_code: String,
    pub status: TestStatus,
    #[serde(default)]
    pub selectors: Vec<SelectorInfo>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub generated_by: String,
    #[serde(default)]
    pub transitions: Vec<StatusTransition>,
}

impl TestCase {
    pub fn new_draft(
        name: impl Into<String>,
        target_url: impl Into<String>,
        source_session_id: impl Into<String>,
        test_code: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            target_url: target_url.into(),
            source_session_id: source_session_id.into(),
            test_code: test_code.into(),
            status: TestStatus::Draft,
            selectors: Vec::new(),
            created_at: now,
            last_modified: now,
            generated_by: String::new(),
            transitions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_selectors(mut self, selectors: Vec<SelectorInfo>) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn with_generated_by(mut self, generated_by: impl Into<String>) -> Self {
        self.generated_by = generated_by.into();
        self
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Per-test execution outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestOutcome {
    Passed,
    Failed,
    Skipped,
}

impl std::fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Result of running one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_name: String,
    pub status: TestOutcome,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    /// Screenshot file of the failure capture, relative to the captures dir
    pub failure_screenshot_ref: Option<String>,
    /// DOM file of the failure capture, relative to the captures dir
    pub failure_html_ref: Option<String>,
}

impl TestResult {
    pub fn skipped(test_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            status: TestOutcome::Skipped,
            duration_ms: 0,
            error_message: Some(reason.into()),
            failure_screenshot_ref: None,
            failure_html_ref: None,
        }
    }
}

/// Results from executing a set of test cases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub id: String,
    pub execution_start: DateTime<Utc>,
    pub execution_end: DateTime<Utc>,
    pub results: Vec<TestResult>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl TestReport {
    /// Build a report; counts are derived from `results` and the end time
    /// is clamped so it never precedes the start
    ///
    /// The id is the UTC start time to the millisecond plus a short random
    /// suffix, so runs started together still get distinct ids.
    pub fn from_results(
        execution_start: DateTime<Utc>,
        execution_end: DateTime<Utc>,
        results: Vec<TestResult>,
    ) -> Self {
        let count = |outcome: TestOutcome| results.iter().filter(|r| r.status == outcome).count();
        Self {
            id: format!(
                "report_{}_{}",
                execution_start.format("%Y%m%d_%H%M%S_%3f"),
                &Uuid::new_v4().simple().to_string()[..8]
            ),
            execution_start,
            execution_end: execution_end.max(execution_start),
            total: results.len(),
            passed: count(TestOutcome::Passed),
            failed: count(TestOutcome::Failed),
            skipped: count(TestOutcome::Skipped),
            results,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.execution_end - self.execution_start).num_milliseconds()
    }

    /// Pass rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.passed as f64 / self.total as f64 * 100.0
    }

    pub fn is_consistent(&self) -> bool {
        self.passed + self.failed + self.skipped == self.total
            && self.execution_end >= self.execution_start
    }
}
