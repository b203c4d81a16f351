//! Persisted test case layout
//!
//! ```text
//! tests/draft/<name>.py        tests/draft/<name>.json
//! tests/approved/<name>.py     tests/approved/<name>.json
//! tests/deprecated/<name>.py   tests/deprecated/<name>.json
//! ```
//!
//! The directory a case lives in is its status. The `.py` file is the source
//! of truth for code; approved files are only ever moved, never rewritten,
//! except through an explicit human edit.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use scout_core::{LifecycleError, Result, TestCase, TestStatus};

const ALL_STATUSES: [TestStatus; 3] = [
    TestStatus::Draft,
    TestStatus::Approved,
    TestStatus::Deprecated,
];

/// File-backed collection of test cases
#[derive(Debug, Clone)]
pub struct TestCaseStore {
    root: PathBuf,
}

impl TestCaseStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn status_dir(&self, status: TestStatus) -> PathBuf {
        self.root.join(status.dir_name())
    }

    /// Path of the test module for `name` in `status`
    pub fn code_path(&self, status: TestStatus, name: &str) -> PathBuf {
        self.status_dir(status).join(format!("{}.py", name))
    }

    fn meta_path(&self, status: TestStatus, name: &str) -> PathBuf {
        self.status_dir(status).join(format!("{}.json", name))
    }

    /// Status of an APPROVED or DEPRECATED case already on disk under `name`
    ///
    /// Reads the filesystem rather than any loaded snapshot, so names taken
    /// by another process since `load_all` are seen.
    pub fn reserved_on_disk(&self, name: &str) -> Option<TestStatus> {
        [TestStatus::Approved, TestStatus::Deprecated]
            .into_iter()
            .find(|&status| {
                self.code_path(status, name).exists() || self.meta_path(status, name).exists()
            })
    }

    /// Names of every case currently stored under `status`
    pub async fn names_in(&self, status: TestStatus) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        let dir = self.status_dir(status);
        if !dir.exists() {
            return Ok(names);
        }
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path
                .extension()
                .is_some_and(|e| e == "py" || e == "json")
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.insert(stem.to_string());
            }
        }
        Ok(names)
    }

    /// Load every case, taking status from its directory and code from its `.py`
    pub async fn load_all(&self) -> Result<Vec<TestCase>> {
        let mut cases = Vec::new();

        for status in ALL_STATUSES {
            let dir = self.status_dir(status);
            if !dir.exists() {
                continue;
            }
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "json") {
                    match self.load_case(status, &path).await {
                        Ok(case) => cases.push(case),
                        Err(e) => warn!("Skipping unreadable test case {:?}: {}", path, e),
                    }
                }
            }
        }

        info!("Loaded {} test case(s) from {}", cases.len(), self.root.display());
        Ok(cases)
    }

    async fn load_case(&self, status: TestStatus, meta: &Path) -> Result<TestCase> {
        let content = tokio::fs::read_to_string(meta).await?;
        let mut case: TestCase = serde_json::from_str(&content)?;
        case.status = status;

        let code_path = self.code_path(status, &case.name);
        if code_path.exists() {
            case.test_code = tokio::fs::read_to_string(&code_path).await?;
        }
        Ok(case)
    }

    /// Write metadata, and the code file when `write_code` is set
    pub async fn write_case(&self, case: &TestCase, write_code: bool) -> Result<()> {
        let dir = self.status_dir(case.status);
        tokio::fs::create_dir_all(&dir).await?;

        if write_code {
            tokio::fs::write(self.code_path(case.status, &case.name), &case.test_code).await?;
        }
        let meta = serde_json::to_string_pretty(case)?;
        tokio::fs::write(self.meta_path(case.status, &case.name), meta).await?;

        debug!("Wrote {} test case {}", case.status, case.name);
        Ok(())
    }

    /// Move a case's files from `from` to `case.status`, code verbatim
    ///
    /// Refuses with [`LifecycleError::NameReserved`] when the destination
    /// already holds a case of that name; nothing is moved or written.
    pub async fn move_case(&self, case: &TestCase, from: TestStatus) -> Result<()> {
        let old_code = self.code_path(from, &case.name);
        let new_code = self.code_path(case.status, &case.name);
        if new_code.exists() || self.meta_path(case.status, &case.name).exists() {
            warn!(
                "Refusing to move {} into {}: name already taken there",
                case.name, case.status
            );
            return Err(LifecycleError::NameReserved {
                name: case.name.clone(),
                status: case.status,
            }
            .into());
        }

        tokio::fs::create_dir_all(self.status_dir(case.status)).await?;
        if old_code.exists() {
            tokio::fs::rename(&old_code, &new_code).await?;
        } else {
            tokio::fs::write(&new_code, &case.test_code).await?;
        }

        self.write_case(case, false).await?;

        let old_meta = self.meta_path(from, &case.name);
        if old_meta.exists() {
            tokio::fs::remove_file(old_meta).await?;
        }
        info!("Moved {} from {} to {}", case.name, from, case.status);
        Ok(())
    }
}
