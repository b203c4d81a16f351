//! Configuration management for Scout
//!
//! Project-level settings for the agent loop, browser, model transport,
//! on-disk layout and test runner.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Result, ScoutError};

/// Directory holding Scout's own state, relative to the project root
pub const SCOUT_DIR: &str = ".scout";

/// Project-level Scout configuration
///
/// Loaded from `.scout/config.toml` in the project root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoutConfig {
    /// Agent loop defaults
    #[serde(default)]
    pub loop_defaults: LoopDefaults,

    /// Browser launch and navigation
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Generative model transport
    #[serde(default)]
    pub model: ModelConfig,

    /// Output directories
    #[serde(default)]
    pub paths: PathsConfig,

    /// Test execution
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Default agent loop parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopDefaults {
    /// Structural cap on model inferences per session
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Timeout for one inference or one action
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,

    /// Optional wall-clock budget for a whole session
    #[serde(default)]
    pub session_budget_secs: Option<u64>,

    /// Characters of HTML sent to the model per step
    #[serde(default = "default_html_char_budget")]
    pub html_char_budget: usize,

    /// Number of most recent turns included in the prompt history
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Consecutive unchanged observations that abort a session
    #[serde(default = "default_max_consecutive_stalls")]
    pub max_consecutive_stalls: usize,
}

/// Browser configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// Quiet period with no new network resources that counts as settled
    #[serde(default = "default_network_quiet_ms")]
    pub network_quiet_ms: u64,

    /// Upper bound on waiting for the network to settle
    #[serde(default = "default_network_settle_timeout_secs")]
    pub network_settle_timeout_secs: u64,
}

/// Model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name
    #[serde(default = "default_model")]
    pub name: String,

    /// Environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

/// Output directories, relative to the project root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_tests_dir")]
    pub tests_dir: PathBuf,

    #[serde(default = "default_captures_dir")]
    pub captures_dir: PathBuf,

    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,
}

/// Test runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Python interpreter used to invoke pytest
    #[serde(default = "default_python")]
    pub python: String,

    /// Test cases run concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_test_timeout_secs")]
    pub test_timeout_secs: u64,

    /// Capture page state for failed tests
    #[serde(default = "default_true")]
    pub capture_failures: bool,
}

// Default value providers
fn default_max_steps() -> usize {
    10
}

fn default_step_timeout_secs() -> u64 {
    90
}

fn default_html_char_budget() -> usize {
    20_000
}

fn default_history_window() -> usize {
    12
}

fn default_max_consecutive_stalls() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_network_quiet_ms() -> u64 {
    500
}

fn default_network_settle_timeout_secs() -> u64 {
    10
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_tests_dir() -> PathBuf {
    PathBuf::from("tests")
}

fn default_captures_dir() -> PathBuf {
    PathBuf::from("captures")
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from(SCOUT_DIR).join("sessions")
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_workers() -> usize {
    1
}

fn default_test_timeout_secs() -> u64 {
    300
}

impl ScoutConfig {
    /// Load configuration from `.scout/config.toml` or use defaults
    pub fn load_or_default(project_root: &Path) -> Result<Self> {
        let config_path = Self::config_path(project_root);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)
                .map_err(|e| ScoutError::Config(format!("Failed to parse config file: {}", e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Write default configuration to `.scout/config.toml`
    ///
    /// Returns the path written.
    pub fn write_default(project_root: &Path) -> Result<PathBuf> {
        let config_dir = project_root.join(SCOUT_DIR);
        std::fs::create_dir_all(&config_dir)?;

        let config_path = Self::config_path(project_root);
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| ScoutError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    pub fn config_path(project_root: &Path) -> PathBuf {
        project_root.join(SCOUT_DIR).join("config.toml")
    }

    /// Reject values that would make the loop or runner meaningless
    pub fn validate(&self) -> Result<()> {
        if self.loop_defaults.max_steps == 0 {
            return Err(ScoutError::Config("loop_defaults.max_steps must be > 0".into()));
        }
        if self.loop_defaults.step_timeout_secs == 0 {
            return Err(ScoutError::Config(
                "loop_defaults.step_timeout_secs must be > 0".into(),
            ));
        }
        if self.loop_defaults.max_consecutive_stalls == 0 {
            return Err(ScoutError::Config(
                "loop_defaults.max_consecutive_stalls must be > 0".into(),
            ));
        }
        if self.runner.workers == 0 {
            return Err(ScoutError::Config("runner.workers must be > 0".into()));
        }
        Ok(())
    }
}

impl LoopDefaults {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn session_budget(&self) -> Option<Duration> {
        self.session_budget_secs.map(Duration::from_secs)
    }
}

impl Default for LoopDefaults {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            step_timeout_secs: default_step_timeout_secs(),
            session_budget_secs: None,
            html_char_budget: default_html_char_budget(),
            history_window: default_history_window(),
            max_consecutive_stalls: default_max_consecutive_stalls(),
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            network_quiet_ms: default_network_quiet_ms(),
            network_settle_timeout_secs: default_network_settle_timeout_secs(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_key_env: default_api_key_env(),
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tests_dir: default_tests_dir(),
            captures_dir: default_captures_dir(),
            reports_dir: default_reports_dir(),
            sessions_dir: default_sessions_dir(),
        }
    }
}

impl PathsConfig {
    /// Resolve every path against the project root
    pub fn resolve(&self, project_root: &Path) -> PathsConfig {
        PathsConfig {
            tests_dir: project_root.join(&self.tests_dir),
            captures_dir: project_root.join(&self.captures_dir),
            reports_dir: project_root.join(&self.reports_dir),
            sessions_dir: project_root.join(&self.sessions_dir),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            workers: default_workers(),
            test_timeout_secs: default_test_timeout_secs(),
            capture_failures: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ScoutConfig::load_or_default(temp.path()).unwrap();
        assert_eq!(config, ScoutConfig::default());
        assert_eq!(config.loop_defaults.max_steps, 10);
        assert_eq!(config.model.api_key_env, "GOOGLE_API_KEY");
    }

    #[test]
    fn test_write_default_round_trips() {
        let temp = TempDir::new().unwrap();
        let path = ScoutConfig::write_default(temp.path()).unwrap();
        assert!(path.ends_with(".scout/config.toml"));

        let config = ScoutConfig::load_or_default(temp.path()).unwrap();
        assert_eq!(config, ScoutConfig::default());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".scout")).unwrap();
        std::fs::write(
            temp.path().join(".scout/config.toml"),
            "[loop_defaults]\nmax_steps = 4\nsession_budget_secs = 60\n\n[runner]\nworkers = 3\n",
        )
        .unwrap();

        let config = ScoutConfig::load_or_default(temp.path()).unwrap();
        assert_eq!(config.loop_defaults.max_steps, 4);
        assert_eq!(
            config.loop_defaults.session_budget(),
            Some(Duration::from_secs(60))
        );
        assert_eq!(config.loop_defaults.history_window, 12);
        assert_eq!(config.runner.workers, 3);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".scout")).unwrap();
        std::fs::write(temp.path().join(".scout/config.toml"), "[loop_defaults\n").unwrap();

        let err = ScoutConfig::load_or_default(temp.path()).unwrap_err();
        assert!(matches!(err, ScoutError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_steps() {
        let mut config = ScoutConfig::default();
        assert!(config.validate().is_ok());
        config.loop_defaults.max_steps = 0;
        assert!(config.validate().is_err());
    }
}
