//! Content-addressed capture store
//!
//! Captures are keyed by content hash with insert-if-absent semantics, so
//! concurrent sessions observing identical pages share one entry. When opened
//! on a directory each new capture is written once as:
//!
//! ```text
//! captures/<hash>.html
//! captures/<hash>.png
//! captures/<hash>.json   (PageCapture metadata)
//! ```

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use scout_core::{ContentHash, Observation, PageCapture, Result, ScoutError};

/// Shared store of immutable page captures
#[derive(Debug, Default)]
pub struct CaptureStore {
    entries: DashMap<ContentHash, Arc<PageCapture>>,
    screenshots: DashMap<ContentHash, Arc<Vec<u8>>>,
    root: Option<PathBuf>,
}

impl CaptureStore {
    /// Store that keeps everything in memory
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (or create) a store persisted under `dir`, reloading existing metadata
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let root = dir.into();
        std::fs::create_dir_all(&root)?;

        let entries = DashMap::new();
        for entry in std::fs::read_dir(&root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let loaded = std::fs::read_to_string(&path)
                .map_err(ScoutError::from)
                .and_then(|c| serde_json::from_str::<PageCapture>(&c).map_err(ScoutError::from));
            match loaded {
                Ok(capture) => {
                    entries.insert(capture.content_hash.clone(), Arc::new(capture));
                }
                Err(e) => warn!("Skipping unreadable capture {}: {}", path.display(), e),
            }
        }

        info!("Opened capture store at {} ({} captures)", root.display(), entries.len());
        Ok(Self {
            entries,
            screenshots: DashMap::new(),
            root: Some(root),
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Insert a capture unless one with the same hash exists
    ///
    /// Returns the stored capture and whether this call inserted it. If
    /// writing a new capture's files fails, the entry is dropped again so a
    /// later insert retries.
    pub fn insert(
        &self,
        url: &str,
        html: &str,
        screenshot: &[u8],
    ) -> Result<(Arc<PageCapture>, bool)> {
        let mut capture = PageCapture::new(url, html, screenshot);
        let hash = capture.content_hash.clone();

        let stored = match self.entries.entry(hash.clone()) {
            Entry::Occupied(existing) => {
                debug!("Capture {} already stored", hash.short());
                return Ok((Arc::clone(existing.get()), false));
            }
            Entry::Vacant(slot) => {
                if !screenshot.is_empty() {
                    capture.screenshot_ref = Some(format!("{}.png", hash));
                }
                // Persisted stores serve screenshots from disk
                if self.root.is_none() {
                    self.screenshots
                        .insert(hash.clone(), Arc::new(screenshot.to_vec()));
                }
                let stored = Arc::new(capture);
                slot.insert(Arc::clone(&stored));
                stored
            }
        };

        // Files are written after the shard lock is released
        if let Some(root) = &self.root {
            if let Err(e) = Self::persist(root, &stored, screenshot) {
                self.entries.remove(&hash);
                return Err(e);
            }
        }
        debug!("Stored capture {} for {}", hash.short(), url);
        Ok((stored, true))
    }

    /// Insert the page state carried by an observation
    pub fn insert_observation(&self, observation: &Observation) -> Result<(Arc<PageCapture>, bool)> {
        self.insert(&observation.url, &observation.html, &observation.screenshot)
    }

    fn persist(root: &Path, capture: &PageCapture, screenshot: &[u8]) -> Result<()> {
        let hash = capture.content_hash.as_str();
        std::fs::write(root.join(format!("{}.html", hash)), &capture.html_content)?;
        if !screenshot.is_empty() {
            std::fs::write(root.join(format!("{}.png", hash)), screenshot)?;
        }
        let meta = serde_json::to_string_pretty(capture)?;
        std::fs::write(root.join(format!("{}.json", hash)), meta)
            .map_err(|e| ScoutError::Capture(format!("Failed to write capture {}: {}", hash, e)))
    }

    pub fn get(&self, hash: &ContentHash) -> Option<Arc<PageCapture>> {
        self.entries.get(hash).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.entries.contains_key(hash)
    }

    /// Screenshot bytes for a capture, from memory or disk
    pub fn screenshot(&self, hash: &ContentHash) -> Option<Arc<Vec<u8>>> {
        if let Some(bytes) = self.screenshots.get(hash) {
            return Some(Arc::clone(bytes.value()));
        }
        let root = self.root.as_ref()?;
        let file = self.get(hash)?.screenshot_ref.clone()?;
        std::fs::read(root.join(file)).ok().map(Arc::new)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insert_is_idempotent() {
        let store = CaptureStore::in_memory();
        let (first, inserted) = store
            .insert("https://example.com", "<p>Hi</p>", b"png")
            .unwrap();
        assert!(inserted);

        let (second, inserted) = store
            .insert("https://example.com", "  <p>Hi</p>\n", b"png")
            .unwrap();
        assert!(!inserted);
        assert_eq!(first.content_hash, second.content_hash);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_persist_and_reopen() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("captures");

        let hash = {
            let store = CaptureStore::open(&dir).unwrap();
            let (capture, _) = store
                .insert("https://example.com", "<title>Example</title>", b"\x89PNG")
                .unwrap();
            capture.content_hash.clone()
        };

        assert!(dir.join(format!("{}.html", hash)).exists());
        assert!(dir.join(format!("{}.png", hash)).exists());

        let reopened = CaptureStore::open(&dir).unwrap();
        assert_eq!(reopened.len(), 1);
        let capture = reopened.get(&hash).unwrap();
        assert_eq!(capture.title().as_deref(), Some("Example"));
        assert_eq!(reopened.screenshot(&hash).unwrap().as_slice(), b"\x89PNG");
        assert!(reopened.screenshots.is_empty());

        // Re-inserting after reload writes nothing new
        let (_, inserted) = reopened
            .insert("https://example.com", "<title>Example</title>", b"\x89PNG")
            .unwrap();
        assert!(!inserted);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_store_once() {
        let store = Arc::new(CaptureStore::in_memory());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .insert("https://example.com", "<main>same</main>", b"shot")
                    .unwrap()
                    .1
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_persisted_store_keeps_screenshots_on_disk_only() {
        let temp = TempDir::new().unwrap();
        let store = CaptureStore::open(temp.path().join("captures")).unwrap();
        let (capture, _) = store
            .insert("https://example.com", "<p>a</p>", b"large screenshot")
            .unwrap();

        assert!(store.screenshots.is_empty());
        assert_eq!(
            store.screenshot(&capture.content_hash).unwrap().as_slice(),
            b"large screenshot"
        );

        let memory = CaptureStore::in_memory();
        let (capture, _) = memory.insert("https://example.com", "<p>a</p>", b"shot").unwrap();
        assert_eq!(memory.screenshot(&capture.content_hash).unwrap().as_slice(), b"shot");
    }

    #[test]
    fn test_failed_persist_leaves_no_entry() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("captures");
        let store = CaptureStore::open(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert!(store.insert("https://example.com", "<p>a</p>", b"png").is_err());
        assert!(store.is_empty());

        std::fs::create_dir_all(&dir).unwrap();
        let (_, inserted) = store.insert("https://example.com", "<p>a</p>", b"png").unwrap();
        assert!(inserted);
    }
}
