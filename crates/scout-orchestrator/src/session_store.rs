//! Session traces persisted as JSON under `.scout/sessions/<session_id>.json`

use scout_core::{AgentSession, Result, ScoutError};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

fn session_path(dir: &Path, session_id: &str) -> PathBuf {
    dir.join(format!("{}.json", session_id))
}

/// Save a session trace to `dir`, returning the file written
pub async fn save_session(dir: &Path, session: &AgentSession) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let json = serde_json::to_string_pretty(session)
        .map_err(|e| ScoutError::Other(format!("Failed to serialize session: {}", e)))?;

    let path = session_path(dir, &session.session_id);
    tokio::fs::write(&path, json)
        .await
        .map_err(|e| ScoutError::Other(format!("Failed to write session file: {}", e)))?;

    debug!("Saved session {} to {}", session.session_id, path.display());
    Ok(path)
}

/// Load one session trace by id
pub async fn load_session(dir: &Path, session_id: &str) -> Result<AgentSession> {
    let content = tokio::fs::read_to_string(session_path(dir, session_id))
        .await
        .map_err(|e| ScoutError::Other(format!("Failed to read session {}: {}", session_id, e)))?;

    serde_json::from_str(&content)
        .map_err(|e| ScoutError::Other(format!("Failed to parse session {}: {}", session_id, e)))
}

/// All readable session traces in `dir`, oldest first
pub async fn list_sessions(dir: &Path) -> Result<Vec<AgentSession>> {
    let mut sessions = Vec::new();
    if !dir.exists() {
        return Ok(sessions);
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let parsed = tokio::fs::read_to_string(&path)
            .await
            .map_err(ScoutError::from)
            .and_then(|c| serde_json::from_str::<AgentSession>(&c).map_err(ScoutError::from));
        match parsed {
            Ok(session) => sessions.push(session),
            Err(e) => warn!("Skipping unreadable session {}: {}", path.display(), e),
        }
    }

    sessions.sort_by_key(|s| s.started_at);
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::{SessionStatus, TerminationReason};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_load_and_list() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("sessions");

        let mut session = AgentSession::new("https://example.com", "goal", "model");
        session.step_count = 4;
        session.terminate(TerminationReason::MaxStepsReached { max_steps: 4 });
        save_session(&dir, &session).await.unwrap();

        let loaded = load_session(&dir, &session.session_id).await.unwrap();
        assert_eq!(loaded.status, SessionStatus::Aborted);
        assert_eq!(loaded.termination, session.termination);

        tokio::fs::write(dir.join("junk.json"), "{not json").await.unwrap();
        let listed = list_sessions(&dir).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id, session.session_id);
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let listed = list_sessions(&temp.path().join("nope")).await.unwrap();
        assert!(listed.is_empty());
    }
}
