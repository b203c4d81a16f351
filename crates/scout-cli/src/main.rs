//! Scout CLI - UI test discovery driven by a multimodal model
//!
//! Usage:
//!   scout init                      Initialize Scout in the current project
//!   scout generate <url>...         Explore URLs and synthesize draft tests
//!   scout synthesize <id>...        Re-draft tests from saved session traces
//!   scout review list               List test cases by status
//!   scout review approve <name>     Promote a draft
//!   scout execute                   Run approved tests and write a report
//!   scout status                    Show test, session and report state
//!   scout clean <target>            Remove generated artifacts

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use scout_agent::{GeminiGateway, ModelGateway};
use scout_browser::{BrowserSession, CaptureStore, DriverActionExecutor, ExecutorOptions};
use scout_core::config::{PathsConfig, SCOUT_DIR};
use scout_core::fail_open::fail_open;
use scout_core::{AgentSession, ScoutConfig, SessionStatus, TestStatus};
use scout_lifecycle::LifecycleManager;
use scout_orchestrator::{
    list_sessions, load_session, save_session, AgentLoopController, LoopOptions,
};
use scout_report::{ExecutionReporter, FailureCapturer, PytestRunner, ReportStore};
use scout_synthesis::TestSynthesizer;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "scout")]
#[command(author, version, about = "Model-driven UI test discovery")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Project root (defaults to current directory)
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration to .scout/config.toml
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Explore target URLs and synthesize draft tests
    Generate {
        /// Target URLs; several run as concurrent sessions
        #[arg(required = true)]
        urls: Vec<String>,

        /// Maximum model inferences per session
        #[arg(long)]
        max_steps: Option<usize>,

        /// Per-step timeout in seconds (inference and action each)
        #[arg(long)]
        step_timeout: Option<u64>,

        /// Session wall-clock budget in seconds
        #[arg(long)]
        budget: Option<u64>,

        /// Exploration goal given to the model
        #[arg(long)]
        goal: Option<String>,

        /// Model name override
        #[arg(long)]
        model: Option<String>,

        /// Show the browser window
        #[arg(long)]
        no_headless: bool,
    },

    /// Re-synthesize draft tests from saved session traces
    Synthesize {
        /// Session ids under the sessions directory
        #[arg(required = true)]
        sessions: Vec<String>,
    },

    /// Review and govern test cases
    Review {
        #[command(subcommand)]
        action: ReviewCommands,
    },

    /// Run approved tests and write a report
    Execute {
        /// Number of tests to run concurrently
        #[arg(short, long)]
        workers: Option<usize>,

        /// Skip failure page captures
        #[arg(long)]
        no_capture: bool,
    },

    /// Show test, session and report state
    Status,

    /// Remove generated artifacts (approved tests are never touched)
    Clean {
        #[arg(value_enum)]
        target: CleanTarget,

        /// Actually delete; without it, only list what would go
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// List test cases
    List {
        /// Only cases with this status
        #[arg(long, value_enum)]
        status: Option<CliStatus>,
    },

    /// Show one test case and its code
    Show {
        /// Test case name or id
        name: String,
    },

    /// DRAFT -> APPROVED
    Approve { name: String },

    /// DRAFT -> DEPRECATED
    Reject { name: String },

    /// APPROVED -> DEPRECATED
    Deprecate { name: String },

    /// Replace a test case's code from a file
    Edit {
        /// Test case name or id
        name: String,

        /// File holding the new Python code
        file: PathBuf,
    },
}

/// CLI-friendly status enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliStatus {
    Draft,
    Approved,
    Deprecated,
}

impl From<CliStatus> for TestStatus {
    fn from(s: CliStatus) -> Self {
        match s {
            CliStatus::Draft => TestStatus::Draft,
            CliStatus::Approved => TestStatus::Approved,
            CliStatus::Deprecated => TestStatus::Deprecated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CleanTarget {
    Drafts,
    Reports,
    Captures,
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let root = cli.project;
    match cli.command {
        Commands::Init { force } => cmd_init(&root, force).await,
        Commands::Generate {
            urls,
            max_steps,
            step_timeout,
            budget,
            goal,
            model,
            no_headless,
        } => {
            let mut config = load_config(&root)?;
            if let Some(n) = max_steps {
                config.loop_defaults.max_steps = n;
            }
            if let Some(secs) = step_timeout {
                config.loop_defaults.step_timeout_secs = secs;
            }
            if budget.is_some() {
                config.loop_defaults.session_budget_secs = budget;
            }
            if let Some(model) = model {
                config.model.name = model;
            }
            if no_headless {
                config.browser.headless = false;
            }
            config.validate()?;
            cmd_generate(&root, config, urls, goal).await
        }
        Commands::Synthesize { sessions } => cmd_synthesize(&root, sessions).await,
        Commands::Review { action } => cmd_review(&root, action).await,
        Commands::Execute {
            workers,
            no_capture,
        } => {
            let mut config = load_config(&root)?;
            if let Some(n) = workers {
                config.runner.workers = n;
            }
            if no_capture {
                config.runner.capture_failures = false;
            }
            config.validate()?;
            cmd_execute(&root, config).await
        }
        Commands::Status => cmd_status(&root).await,
        Commands::Clean { target, force } => cmd_clean(&root, target, force).await,
    }
}

fn load_config(root: &Path) -> Result<ScoutConfig> {
    ScoutConfig::load_or_default(root).context("Failed to load .scout/config.toml")
}

fn paths(root: &Path, config: &ScoutConfig) -> PathsConfig {
    config.paths.resolve(root)
}

async fn cmd_init(root: &Path, force: bool) -> Result<()> {
    let config_path = ScoutConfig::config_path(root);
    if config_path.exists() && !force {
        println!("Already initialized: {}", config_path.display());
        println!("Use --force to overwrite with defaults");
        return Ok(());
    }

    let written = ScoutConfig::write_default(root)?;
    let paths = paths(root, &ScoutConfig::default());
    for status in [TestStatus::Draft, TestStatus::Approved, TestStatus::Deprecated] {
        tokio::fs::create_dir_all(paths.tests_dir.join(status.dir_name())).await?;
    }
    tokio::fs::create_dir_all(&paths.captures_dir).await?;
    tokio::fs::create_dir_all(&paths.reports_dir).await?;
    tokio::fs::create_dir_all(&paths.sessions_dir).await?;

    println!("Initialized Scout in {}", root.display());
    println!("Created:");
    println!("  {}", written.display());
    println!("  {}/{{draft,approved,deprecated}}/", paths.tests_dir.display());
    println!("  {}/", paths.captures_dir.display());
    println!("  {}/", paths.reports_dir.display());
    println!("\nNext steps:");
    println!("  1. Export your model API key ({})", ScoutConfig::default().model.api_key_env);
    println!("  2. Run 'scout generate <url>' to explore and draft tests");
    println!("  3. Use 'scout review list' to approve drafts");
    Ok(())
}

/// One exploration session with its own browser
async fn run_session(
    url: String,
    config: Arc<ScoutConfig>,
    gateway: Arc<dyn ModelGateway>,
    captures: Arc<CaptureStore>,
    options: LoopOptions,
    cancel: CancellationToken,
    scout_dir: PathBuf,
) -> Result<AgentSession> {
    let browser_config = config.browser.clone();
    let browser = tokio::task::spawn_blocking(move || BrowserSession::launch(&browser_config))
        .await
        .context("Browser launch task failed")??;
    let executor = Arc::new(DriverActionExecutor::new(
        browser,
        ExecutorOptions::from_config(&config.browser),
    ));

    let controller = AgentLoopController::new(gateway, executor, captures)
        .with_options(options)
        .with_cancellation(cancel)
        .with_activity_logging(scout_dir);

    Ok(controller
        .run(
            &url,
            config.loop_defaults.max_steps,
            config.loop_defaults.step_timeout(),
        )
        .await)
}

async fn cmd_generate(
    root: &Path,
    config: ScoutConfig,
    urls: Vec<String>,
    goal: Option<String>,
) -> Result<()> {
    let paths = paths(root, &config);
    let gateway: Arc<dyn ModelGateway> = Arc::new(
        GeminiGateway::from_config(&config.model).context("Failed to configure model gateway")?,
    );
    let captures = Arc::new(
        CaptureStore::open(&paths.captures_dir).context("Failed to open capture store")?,
    );
    let lifecycle = LifecycleManager::open(&paths.tests_dir)
        .await
        .context("Failed to load test cases")?;

    let mut options = LoopOptions::from_defaults(&config.loop_defaults);
    if let Some(goal) = goal {
        options = options.with_goal(goal);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, aborting sessions");
            ctrl_c.cancel();
        }
    });

    println!(
        "Exploring {} URL(s) with {} (max {} steps)",
        urls.len(),
        gateway.model_name(),
        config.loop_defaults.max_steps
    );

    let config = Arc::new(config);
    let scout_dir = root.join(SCOUT_DIR);
    let runs = urls.iter().map(|url| {
        run_session(
            url.clone(),
            Arc::clone(&config),
            Arc::clone(&gateway),
            Arc::clone(&captures),
            options.clone(),
            cancel.clone(),
            scout_dir.clone(),
        )
    });
    let results = join_all(runs).await;

    let mut failures = Vec::new();
    let mut claimed = BTreeSet::new();
    for (url, result) in urls.iter().zip(results) {
        let session = match result {
            Ok(session) => session,
            Err(e) => {
                error!("Session for {} could not start: {:#}", url, e);
                failures.push(format!("{}: {:#}", url, e));
                continue;
            }
        };

        let record = record_session(&paths.sessions_dir, &lifecycle, &session, &mut claimed).await;
        println!("\n{}", url);
        match &record.trace {
            Some(path) => println!("  Session: {} ({})", session.session_id, path.display()),
            None => println!("  Session: {} (trace not saved)", session.session_id),
        }
        println!("  Outcome: {}", session.outcome_line());
        println!(
            "  Turns:   {} ({} usable)",
            session.turns.len(),
            session.usable_turns().count()
        );
        print_drafts(&record.drafts);

        if session.status == SessionStatus::Failed {
            failures.push(format!("{}: {}", url, session.outcome_line()));
        }
    }

    println!("\nCaptures stored: {}", captures.len());
    if !failures.is_empty() {
        anyhow::bail!(
            "{} session(s) failed:\n  {}",
            failures.len(),
            failures.join("\n  ")
        );
    }
    Ok(())
}

/// What became of one finished session
struct SessionRecord {
    /// Trace file, or `None` when saving it failed
    trace: Option<PathBuf>,
    /// Names of the drafts submitted
    drafts: Result<Vec<String>>,
}

/// Save a session's trace and submit its drafts
///
/// The trace write is fail-open: the drafts are still synthesized when it
/// fails. `claimed` carries names drafted earlier in the same invocation,
/// so sessions that reach the same page get `_v2`, `_v3`, ... names instead
/// of replacing each other.
async fn record_session(
    sessions_dir: &Path,
    lifecycle: &LifecycleManager,
    session: &AgentSession,
    claimed: &mut BTreeSet<String>,
) -> SessionRecord {
    let trace = fail_open("save_session", || save_session(sessions_dir, session)).await;
    let drafts = draft_tests(lifecycle, session, claimed).await;
    SessionRecord { trace, drafts }
}

async fn draft_tests(
    lifecycle: &LifecycleManager,
    session: &AgentSession,
    claimed: &mut BTreeSet<String>,
) -> Result<Vec<String>> {
    let mut reserved = lifecycle
        .reserved_names()
        .await
        .context("Failed to read reserved test names")?;
    reserved.extend(claimed.iter().cloned());

    let cases = TestSynthesizer::synthesize(session, &reserved)?;
    let mut names = Vec::with_capacity(cases.len());
    for case in cases {
        match lifecycle.submit_draft(case).await {
            Ok(case) => {
                claimed.insert(case.name.clone());
                names.push(case.name);
            }
            Err(e) => warn!("Draft not submitted: {}", e),
        }
    }
    Ok(names)
}

fn print_drafts(drafts: &Result<Vec<String>>) {
    match drafts {
        Ok(names) => {
            for name in names {
                println!("  Draft:   {}", name);
            }
        }
        Err(e) => println!("  No tests synthesized: {:#}", e),
    }
}

async fn cmd_synthesize(root: &Path, session_ids: Vec<String>) -> Result<()> {
    let config = load_config(root)?;
    let paths = paths(root, &config);
    let lifecycle = LifecycleManager::open(&paths.tests_dir)
        .await
        .context("Failed to load test cases")?;

    let mut claimed = BTreeSet::new();
    for id in session_ids {
        let session = load_session(&paths.sessions_dir, &id).await?;
        println!("{} ({})", id, session.target_url);
        println!("  Outcome: {}", session.outcome_line());
        print_drafts(&draft_tests(&lifecycle, &session, &mut claimed).await);
    }
    Ok(())
}

async fn cmd_review(root: &Path, action: ReviewCommands) -> Result<()> {
    let config = load_config(root)?;
    let paths = paths(root, &config);
    let lifecycle = LifecycleManager::open(&paths.tests_dir)
        .await
        .context("Failed to load test cases")?;

    match action {
        ReviewCommands::List { status } => {
            let cases = lifecycle.list(status.map(Into::into)).await;
            if cases.is_empty() {
                println!("No test cases");
                return Ok(());
            }
            for case in cases {
                println!(
                    "  {:<10} {:<50} {}",
                    case.status.to_string(),
                    case.name,
                    case.target_url
                );
            }
        }

        ReviewCommands::Show { name } => {
            let case = lifecycle
                .get(&name)
                .await
                .with_context(|| format!("No test case named {}", name))?;
            println!("Name:        {}", case.name);
            println!("Id:          {}", case.id);
            println!("Status:      {}", case.status);
            println!("Target:      {}", case.target_url);
            println!("Session:     {}", case.source_session_id);
            println!("Description: {}", case.description);
            println!("Modified:    {}", case.last_modified.format("%Y-%m-%d %H:%M:%S UTC"));
            if !case.selectors.is_empty() {
                println!("Selectors:");
                for s in &case.selectors {
                    println!("  {:.2}  {}", s.stability_score, s.selector_text);
                }
            }
            println!("\n{}", case.test_code);
        }

        ReviewCommands::Approve { name } => {
            let case = lifecycle.approve(&name).await?;
            println!("Approved {}", case.name);
        }

        ReviewCommands::Reject { name } => {
            let case = lifecycle.reject(&name).await?;
            println!("Rejected {}", case.name);
        }

        ReviewCommands::Deprecate { name } => {
            let case = lifecycle.deprecate(&name).await?;
            println!("Deprecated {}", case.name);
        }

        ReviewCommands::Edit { name, file } => {
            let code = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let case = lifecycle.edit_test_code(&name, code).await?;
            println!("Updated {} ({})", case.name, case.status);
        }
    }

    Ok(())
}

async fn cmd_execute(root: &Path, config: ScoutConfig) -> Result<()> {
    let paths = paths(root, &config);
    let lifecycle = LifecycleManager::open(&paths.tests_dir)
        .await
        .context("Failed to load test cases")?;
    let cases = lifecycle.list(Some(TestStatus::Approved)).await;
    if cases.is_empty() {
        println!("No approved tests to run");
        return Ok(());
    }

    let runner = PytestRunner::from_config(&config.runner).with_working_dir(root);
    let code_dir = lifecycle.store().status_dir(TestStatus::Approved);
    let mut reporter =
        ExecutionReporter::new(Arc::new(runner), code_dir).with_workers(config.runner.workers);

    // The browser is only for failure captures; without one, reporting still runs
    if config.runner.capture_failures {
        let browser_config = config.browser.clone();
        let launched =
            tokio::task::spawn_blocking(move || BrowserSession::launch(&browser_config)).await;
        match launched {
            Ok(Ok(browser)) => {
                let executor = Arc::new(DriverActionExecutor::new(
                    browser,
                    ExecutorOptions::from_config(&config.browser),
                ));
                let captures = Arc::new(CaptureStore::open(&paths.captures_dir)?);
                reporter = reporter.with_failure_capture(FailureCapturer::new(executor, captures));
            }
            Ok(Err(e)) => warn!("Failure captures disabled: {}", e),
            Err(e) => warn!("Failure captures disabled: {}", e),
        }
    }

    info!("Running {} approved test(s)", cases.len());
    let report = reporter.execute(&cases).await;
    let dir = ReportStore::new(&paths.reports_dir).save(&report).await?;

    print!("{}", scout_report::render_summary(&report));
    println!("\nReport written to {}", dir.display());

    if report.failed > 0 {
        anyhow::bail!("{} test(s) failed", report.failed);
    }
    Ok(())
}

async fn cmd_status(root: &Path) -> Result<()> {
    let config = load_config(root)?;
    let paths = paths(root, &config);

    println!("Scout Status");
    println!("============");

    let lifecycle = LifecycleManager::open(&paths.tests_dir).await?;
    println!("\nTest cases:");
    for status in [TestStatus::Draft, TestStatus::Approved, TestStatus::Deprecated] {
        println!("  {:<10} {}", status.to_string(), lifecycle.list(Some(status)).await.len());
    }

    let sessions = list_sessions(&paths.sessions_dir).await?;
    println!("\nSessions: {}", sessions.len());
    for session in sessions.iter().rev().take(5) {
        println!("  {} {}", session.target_url, session.outcome_line());
    }

    let captures = CaptureStore::open(&paths.captures_dir)?;
    println!("\nCaptures: {}", captures.len());

    match ReportStore::new(&paths.reports_dir).latest().await? {
        Some(report) => println!(
            "\nLatest report {}: {} passed, {} failed, {} skipped",
            report.id, report.passed, report.failed, report.skipped
        ),
        None => println!("\nNo reports yet"),
    }

    Ok(())
}

async fn cmd_clean(root: &Path, target: CleanTarget, force: bool) -> Result<()> {
    let config = load_config(root)?;
    let paths = paths(root, &config);

    let mut doomed: Vec<PathBuf> = Vec::new();
    if matches!(target, CleanTarget::Drafts | CleanTarget::All) {
        doomed.push(paths.tests_dir.join(TestStatus::Draft.dir_name()));
    }
    if matches!(target, CleanTarget::Reports | CleanTarget::All) {
        doomed.push(paths.reports_dir.clone());
    }
    if matches!(target, CleanTarget::Captures | CleanTarget::All) {
        doomed.push(paths.captures_dir.clone());
    }
    if target == CleanTarget::All {
        doomed.push(paths.sessions_dir.clone());
    }

    let approved = paths.tests_dir.join(TestStatus::Approved.dir_name());
    doomed.retain(|p| p.exists() && !approved.starts_with(p));

    if doomed.is_empty() {
        println!("Nothing to clean");
        return Ok(());
    }
    if !force {
        println!("Would remove:");
        for path in &doomed {
            println!("  {}", path.display());
        }
        println!("Re-run with --force to delete");
        return Ok(());
    }

    for path in &doomed {
        tokio::fs::remove_dir_all(path)
            .await
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        println!("Removed {}", path.display());
    }
    Ok(())
}
