//! Activity Logger - Human-readable session logging to `.scout/activity.md`
//!
//! Each call appends one complete markdown block, so concurrent sessions can
//! share the file. Every entry is tagged with its session id.

use chrono::Utc;
use scout_core::fail_open::fail_open;
use scout_core::{AgentSession, Result, Turn};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Maximum character length for model narrative in the activity log
const ACTIVITY_LOG_PREVIEW_CHARS: usize = 300;

/// Activity logger for agent sessions
#[derive(Debug, Clone)]
pub struct ActivityLogger {
    output_path: PathBuf,
}

fn preview(text: &str) -> String {
    if text.chars().count() > ACTIVITY_LOG_PREVIEW_CHARS {
        let truncated: String = text.chars().take(ACTIVITY_LOG_PREVIEW_CHARS).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

impl ActivityLogger {
    /// Create a new activity logger writing under `scout_dir`
    pub fn new(scout_dir: PathBuf) -> Self {
        Self {
            output_path: scout_dir.join("activity.md"),
        }
    }

    /// Log the start of a session
    ///
    /// This operation is fail-open - logging failures won't fail the session
    pub async fn log_session_start(&self, session: &AgentSession, max_steps: usize) {
        fail_open("activity_logger::log_session_start", || async {
            let content = format!(
                "## Session {}\n**Target**: {}\n**Started**: {}\n**Max Steps**: {}\n**Model**: {}\n\n",
                session.session_id,
                session.target_url,
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
                max_steps,
                session.model
            );
            self.append_internal(&content).await
        })
        .await;
    }

    /// Log one finished turn
    ///
    /// This operation is fail-open - logging failures won't fail the session
    pub async fn log_turn(&self, session_id: &str, step: usize, turn: &Turn) {
        fail_open("activity_logger::log_turn", || async {
            let mut content = format!(
                "### [{}] Step {} / turn {}\n",
                session_id, step, turn.turn_index
            );

            let action = turn
                .action_taken
                .as_ref()
                .unwrap_or(&turn.model_response.action);
            content.push_str(&format!("**Action**: {}\n", action));

            if let Some(resolved) = &turn.resolved_selector {
                content.push_str(&format!(
                    "**Selector**: `{}` ({})\n",
                    resolved.selector_text, resolved.tier
                ));
            }
            if let Some(hash) = &turn.observation_ref {
                let marker = if turn.stalled { " (unchanged)" } else { "" };
                content.push_str(&format!("**Observation**: {}{}\n", hash.short(), marker));
            }
            if let Some(url) = &turn.page_url {
                content.push_str(&format!("**URL**: {}\n", url));
            }
            if let Some(error) = &turn.error {
                content.push_str(&format!("**Error**: {}\n", error));
            }
            if let Some(narrative) = &turn.model_response.narrative {
                content.push_str("> ");
                content.push_str(&preview(narrative).replace('\n', "\n> "));
                content.push('\n');
            }
            content.push('\n');

            self.append_internal(&content).await
        })
        .await;
    }

    /// Log how a session ended
    ///
    /// This operation is fail-open - logging failures won't fail the session
    pub async fn log_session_end(&self, session: &AgentSession) {
        fail_open("activity_logger::log_session_end", || async {
            let icon = match session.status {
                scout_core::SessionStatus::Completed => "✓",
                _ => "✗",
            };
            let content = format!(
                "**[{}] Finished** {} {}\n**Turns**: {}\n**Ended**: {}\n\n---\n\n",
                session.session_id,
                icon,
                session.outcome_line(),
                session.turns.len(),
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            );
            self.append_internal(&content).await
        })
        .await;
    }

    /// Append content to the activity log (internal, returns Result for fail_open)
    async fn append_internal(&self, content: &str) -> Result<()> {
        if let Some(parent) = self.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)
            .await?;

        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::{ActionRequest, ContentHash, ModelReply, TerminationReason};
    use tempfile::TempDir;
    use tokio::fs;

    fn turn(narrative: Option<String>) -> Turn {
        Turn {
            turn_index: 0,
            prompt_context_ref: None,
            model_response: ModelReply {
                action: ActionRequest::Navigate {
                    url: "https://example.com/about".into(),
                },
                narrative,
            },
            action_taken: Some(ActionRequest::Navigate {
                url: "https://example.com/about".into(),
            }),
            observation_ref: Some(ContentHash("0123456789abcdef".into())),
            page_url: Some("https://example.com/about".into()),
            resolved_selector: None,
            stalled: true,
            error: None,
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_session_log_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let scout_dir = temp_dir.path().join(".scout");
        let logger = ActivityLogger::new(scout_dir.clone());

        let mut session = AgentSession::new("https://example.com", "goal", "gemini-test");
        logger.log_session_start(&session, 10).await;
        logger
            .log_turn(&session.session_id, 1, &turn(Some("Checking the about page".into())))
            .await;
        session.step_count = 1;
        session.terminate(TerminationReason::Completed {
            summary: "done".into(),
        });
        logger.log_session_end(&session).await;

        let content = fs::read_to_string(scout_dir.join("activity.md"))
            .await
            .unwrap();

        assert!(content.contains(&format!("## Session {}", session.session_id)));
        assert!(content.contains("**Max Steps**: 10"));
        assert!(content.contains("**Action**: NAVIGATE https://example.com/about"));
        assert!(content.contains("0123456789ab (unchanged)"));
        assert!(content.contains("> Checking the about page"));
        assert!(content.contains("✓ COMPLETED"));
    }

    #[tokio::test]
    async fn test_truncate_long_narrative() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ActivityLogger::new(temp_dir.path().to_path_buf());

        logger
            .log_turn("session-x", 1, &turn(Some("x".repeat(1000))))
            .await;

        let content = fs::read_to_string(temp_dir.path().join("activity.md"))
            .await
            .unwrap();
        assert!(content.contains("..."));
        assert!(!content.contains(&"x".repeat(400)));
    }
}
