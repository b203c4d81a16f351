//! Report collection keyed by run timestamp
//!
//! ```text
//! reports/<report-id>/report.json
//! reports/<report-id>/junit.xml
//! reports/<report-id>/summary.txt
//! ```

use std::path::{Path, PathBuf};
use tracing::info;

use scout_core::{Result, TestReport};

use crate::junit::{render_junit, render_summary};

#[derive(Debug, Clone)]
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write all three report files, returning the report directory
    ///
    /// The directory is claimed with a create that fails if it exists, so a
    /// report saved twice under one id lands in `-2`, `-3`, ... rather than
    /// overwriting the first.
    pub async fn save(&self, report: &TestReport) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        let mut dir = self.root.join(&report.id);
        let mut n = 2;
        loop {
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    dir = self.root.join(format!("{}-{}", report.id, n));
                    n += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tokio::fs::write(dir.join("report.json"), serde_json::to_string_pretty(report)?).await?;
        tokio::fs::write(dir.join("junit.xml"), render_junit(report)).await?;
        tokio::fs::write(dir.join("summary.txt"), render_summary(report)).await?;

        info!("Saved report {} to {}", report.id, dir.display());
        Ok(dir)
    }

    /// Most recent report by execution start
    pub async fn latest(&self) -> Result<Option<TestReport>> {
        if !self.root.exists() {
            return Ok(None);
        }

        let mut latest: Option<TestReport> = None;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path().join("report.json");
            if !path.exists() {
                continue;
            }
            let content = tokio::fs::read_to_string(&path).await?;
            let Ok(report) = serde_json::from_str::<TestReport>(&content) else {
                continue;
            };
            if latest
                .as_ref()
                .map_or(true, |l| report.execution_start > l.execution_start)
            {
                latest = Some(report);
            }
        }
        Ok(latest)
    }
}
