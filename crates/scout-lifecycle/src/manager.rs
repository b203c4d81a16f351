//! Lifecycle manager - the only owner of test case status
//!
//! State machine per test case:
//!
//! ```text
//! DRAFT --approve--> APPROVED --deprecate--> DEPRECATED
//!   \------------------reject-------------------^
//! ```
//!
//! Each case sits behind its own mutex, so two transitions on the same case
//! are serialized and the second sees the first's result. Transitions on
//! different cases run in parallel.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use scout_core::{LifecycleError, Result, StatusTransition, TestCase, TestStatus};

use crate::store::TestCaseStore;

type Entry = Arc<Mutex<TestCase>>;

/// Governs DRAFT / APPROVED / DEPRECATED transitions and persistence
pub struct LifecycleManager {
    store: TestCaseStore,
    /// Keyed by test case id
    cases: RwLock<HashMap<String, Entry>>,
}

impl LifecycleManager {
    /// Open the manager over `tests_dir`, loading every persisted case
    pub async fn open(tests_dir: impl Into<std::path::PathBuf>) -> Result<Self> {
        let store = TestCaseStore::new(tests_dir);
        let mut cases = HashMap::new();
        for case in store.load_all().await? {
            cases.insert(case.id.clone(), Arc::new(Mutex::new(case)));
        }
        Ok(Self {
            store,
            cases: RwLock::new(cases),
        })
    }

    pub fn store(&self) -> &TestCaseStore {
        &self.store
    }

    /// Find a case by id, falling back to its name
    async fn entry(&self, key: &str) -> Option<Entry> {
        let cases = self.cases.read().await;
        if let Some(entry) = cases.get(key) {
            return Some(Arc::clone(entry));
        }
        for entry in cases.values() {
            if entry.lock().await.name == key {
                return Some(Arc::clone(entry));
            }
        }
        None
    }

    /// Snapshot of a case by id or name
    pub async fn get(&self, key: &str) -> Option<TestCase> {
        let entry = self.entry(key).await?;
        let case = entry.lock().await;
        Some(case.clone())
    }

    /// All cases, optionally filtered by status, sorted by name
    pub async fn list(&self, status: Option<TestStatus>) -> Vec<TestCase> {
        let entries: Vec<Entry> = self.cases.read().await.values().cloned().collect();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let case = entry.lock().await;
            if status.map_or(true, |s| case.status == s) {
                out.push(case.clone());
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Names synthesis must not reuse: every APPROVED or DEPRECATED case,
    /// whether loaded here or written to disk since by another process
    pub async fn reserved_names(&self) -> Result<BTreeSet<String>> {
        let mut names: BTreeSet<String> = self
            .list(None)
            .await
            .into_iter()
            .filter(|c| c.status != TestStatus::Draft)
            .map(|c| c.name)
            .collect();
        for status in [TestStatus::Approved, TestStatus::Deprecated] {
            names.extend(self.store.names_in(status).await?);
        }
        Ok(names)
    }

    /// Register a freshly synthesized DRAFT
    ///
    /// A DRAFT with the same name is replaced. A name held by an APPROVED or
    /// DEPRECATED case is rejected with [`LifecycleError::NameReserved`] and
    /// the existing case is left untouched.
    pub async fn submit_draft(&self, case: TestCase) -> Result<TestCase> {
        if case.status != TestStatus::Draft {
            return Err(LifecycleError::InvalidTransition {
                name: case.name.clone(),
                from: case.status,
                operation: "submit".to_string(),
            }
            .into());
        }

        let mut cases = self.cases.write().await;

        let mut replaced = None;
        for (id, entry) in cases.iter() {
            let existing = entry.lock().await;
            if existing.name != case.name {
                continue;
            }
            if existing.status != TestStatus::Draft {
                warn!(
                    "Refusing draft {}: name held by a {} case",
                    case.name, existing.status
                );
                return Err(LifecycleError::NameReserved {
                    name: case.name.clone(),
                    status: existing.status,
                }
                .into());
            }
            replaced = Some(id.clone());
        }

        if let Some(status) = self.store.reserved_on_disk(&case.name) {
            warn!(
                "Refusing draft {}: name held on disk by a {} case",
                case.name, status
            );
            return Err(LifecycleError::NameReserved {
                name: case.name.clone(),
                status,
            }
            .into());
        }

        self.store.write_case(&case, true).await?;
        if let Some(old_id) = replaced {
            cases.remove(&old_id);
            info!("Replaced draft {}", case.name);
        } else {
            info!("Submitted draft {}", case.name);
        }
        cases.insert(case.id.clone(), Arc::new(Mutex::new(case.clone())));
        Ok(case)
    }

    /// DRAFT -> APPROVED
    pub async fn approve(&self, key: &str) -> Result<TestCase> {
        self.transition(key, TestStatus::Draft, TestStatus::Approved, "approve")
            .await
    }

    /// DRAFT -> DEPRECATED
    pub async fn reject(&self, key: &str) -> Result<TestCase> {
        self.transition(key, TestStatus::Draft, TestStatus::Deprecated, "reject")
            .await
    }

    /// APPROVED -> DEPRECATED
    pub async fn deprecate(&self, key: &str) -> Result<TestCase> {
        self.transition(key, TestStatus::Approved, TestStatus::Deprecated, "deprecate")
            .await
    }

    async fn transition(
        &self,
        key: &str,
        required: TestStatus,
        target: TestStatus,
        operation: &str,
    ) -> Result<TestCase> {
        let entry = self
            .entry(key)
            .await
            .ok_or_else(|| LifecycleError::NotFound(key.to_string()))?;

        // Held across the file move so a concurrent transition waits and then
        // observes the new status
        let mut case = entry.lock().await;
        let from = case.status;
        if from != required || !from.can_advance_to(target) {
            return Err(LifecycleError::InvalidTransition {
                name: case.name.clone(),
                from,
                operation: operation.to_string(),
            }
            .into());
        }

        let mut next = case.clone();
        let now = Utc::now();
        next.status = target;
        next.last_modified = now;
        next.transitions.push(StatusTransition {
            from,
            to: target,
            at: now,
        });

        self.store.move_case(&next, from).await?;
        *case = next;

        info!("{} {}: {} -> {}", operation, case.name, from, target);
        Ok(case.clone())
    }

    /// Human edit of a case's code; DEPRECATED cases are immutable
    pub async fn edit_test_code(&self, key: &str, code: impl Into<String>) -> Result<TestCase> {
        let entry = self
            .entry(key)
            .await
            .ok_or_else(|| LifecycleError::NotFound(key.to_string()))?;

        let mut case = entry.lock().await;
        if case.status == TestStatus::Deprecated {
            return Err(LifecycleError::Immutable(case.name.clone()).into());
        }

        let mut next = case.clone();
        next.test_code = code.into();
        next.last_modified = Utc::now();
        self.store.write_case(&next, true).await?;
        *case = next;

        info!("Edited {} test case {}", case.status, case.name);
        Ok(case.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::ScoutError;
    use tempfile::TempDir;

    fn draft(name: &str, code: &str) -> TestCase {
        TestCase::new_draft(name, "https://example.com/", "session-1", code)
    }

    fn is_invalid(result: Result<TestCase>) -> bool {
        matches!(
            result,
            Err(ScoutError::Lifecycle(LifecycleError::InvalidTransition { .. }))
        )
    }

    #[tokio::test]
    async fn test_approve_then_deprecate() {
        let temp = TempDir::new().unwrap();
        let manager = LifecycleManager::open(temp.path()).await.unwrap();

        let case = manager.submit_draft(draft("test_home", "code\n")).await.unwrap();
        let approved = manager.approve(&case.id).await.unwrap();
        assert_eq!(approved.status, TestStatus::Approved);
        assert!(is_invalid(manager.approve(&case.id).await));
        assert!(is_invalid(manager.reject("test_home").await));

        let deprecated = manager.deprecate("test_home").await.unwrap();
        assert_eq!(deprecated.status, TestStatus::Deprecated);
        assert_eq!(deprecated.transitions.len(), 2);
        assert_eq!(deprecated.test_code, "code\n");
        assert!(manager
            .store()
            .code_path(TestStatus::Deprecated, "test_home")
            .exists());
    }

    #[tokio::test]
    async fn test_deprecate_requires_approved() {
        let temp = TempDir::new().unwrap();
        let manager = LifecycleManager::open(temp.path()).await.unwrap();

        manager.submit_draft(draft("test_home", "x")).await.unwrap();
        assert!(is_invalid(manager.deprecate("test_home").await));

        let rejected = manager.reject("test_home").await.unwrap();
        assert_eq!(rejected.status, TestStatus::Deprecated);
    }

    #[tokio::test]
    async fn test_draft_replaced_but_reserved_names_refused() {
        let temp = TempDir::new().unwrap();
        let manager = LifecycleManager::open(temp.path()).await.unwrap();

        manager.submit_draft(draft("test_home", "v1")).await.unwrap();
        let second = manager.submit_draft(draft("test_home", "v2")).await.unwrap();
        assert_eq!(manager.list(None).await.len(), 1);
        assert_eq!(manager.get("test_home").await.unwrap().test_code, "v2");

        manager.approve(&second.id).await.unwrap();
        let err = manager.submit_draft(draft("test_home", "v3")).await.unwrap_err();
        assert!(matches!(
            err,
            ScoutError::Lifecycle(LifecycleError::NameReserved {
                status: TestStatus::Approved,
                ..
            })
        ));
        assert_eq!(manager.get("test_home").await.unwrap().test_code, "v2");
        assert!(manager.reserved_names().await.unwrap().contains("test_home"));
    }

    #[tokio::test]
    async fn test_edit_rules() {
        let temp = TempDir::new().unwrap();
        let manager = LifecycleManager::open(temp.path()).await.unwrap();

        manager.submit_draft(draft("test_home", "old")).await.unwrap();
        manager.approve("test_home").await.unwrap();
        let edited = manager.edit_test_code("test_home", "new").await.unwrap();
        assert_eq!(edited.test_code, "new");
        let on_disk = tokio::fs::read_to_string(
            manager.store().code_path(TestStatus::Approved, "test_home"),
        )
        .await
        .unwrap();
        assert_eq!(on_disk, "new");

        manager.deprecate("test_home").await.unwrap();
        assert!(matches!(
            manager.edit_test_code("test_home", "newer").await,
            Err(ScoutError::Lifecycle(LifecycleError::Immutable(_)))
        ));
        assert!(matches!(
            manager.approve("missing").await,
            Err(ScoutError::Lifecycle(LifecycleError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_reopen_restores_statuses() {
        let temp = TempDir::new().unwrap();
        {
            let manager = LifecycleManager::open(temp.path()).await.unwrap();
            manager.submit_draft(draft("test_a", "a")).await.unwrap();
            manager.submit_draft(draft("test_b", "b")).await.unwrap();
            manager.approve("test_b").await.unwrap();
        }
        let manager = LifecycleManager::open(temp.path()).await.unwrap();
        assert_eq!(manager.list(Some(TestStatus::Draft)).await.len(), 1);
        let approved = manager.list(Some(TestStatus::Approved)).await;
        assert_eq!(approved[0].name, "test_b");
        assert_eq!(approved[0].transitions.len(), 1);
    }
}
