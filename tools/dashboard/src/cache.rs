use std::path::{Path, PathBuf};

use schema::CaseRecord;

/// Storage key of the last known case list; also the cache file's stem.
pub const CACHE_KEY: &str = "cachedCaseData";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache contents could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Single-file store of the last known case list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/casedesk/cachedCaseData.json`, or the working directory when
    /// the platform has no data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("casedesk")
            .join(format!("{CACHE_KEY}.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached records, or an empty list when nothing usable is stored. An
    /// unreadable cache file is removed.
    pub fn load(&self) -> Vec<CaseRecord> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "case cache unreadable");
                return Vec::new();
            }
        };
        match serde_json::from_slice::<Vec<CaseRecord>>(&raw) {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "failed to parse cached case data");
                if let Err(err) = std::fs::remove_file(&self.path) {
                    tracing::warn!(path = %self.path.display(), error = %err, "failed to remove invalid case cache");
                }
                Vec::new()
            }
        }
    }

    /// Replace the cached list. Writes a sibling temp file and renames it over
    /// the cache so readers never see a partial file.
    pub fn store(&self, records: &[CaseRecord]) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec(records)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
