#![forbid(unsafe_code)]

//! JSON read-through cache of per-video metadata, so repeated runs do not
//! re-query yt-dlp for videos they already looked at.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedMetadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default)]
    pub fetched_at: String,
}

impl CachedMetadata {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            width: None,
            height: None,
            fetched_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_dimensions(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Entries are written once and never invalidated.
#[derive(Debug)]
pub struct MetadataCache {
    path: PathBuf,
    entries: BTreeMap<String, CachedMetadata>,
    dirty: bool,
}

impl MetadataCache {
    /// A missing file is an empty cache. A corrupt one is logged and ignored;
    /// the next save replaces it.
    pub fn load(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("ignoring unreadable metadata cache {}: {err}", path.display());
                BTreeMap::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!("could not read metadata cache {}: {err}", path.display());
                BTreeMap::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&CachedMetadata> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keeps the first entry stored for an id.
    pub fn insert(&mut self, id: &str, entry: CachedMetadata) -> &CachedMetadata {
        let dirty = &mut self.dirty;
        self.entries.entry(id.to_owned()).or_insert_with(|| {
            *dirty = true;
            entry
        })
    }

    /// Writes through a temp file and rename so a crash never leaves a
    /// half-written cache behind. No-op when nothing changed.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)
            .with_context(|| format!("creating cache directory {}", parent.display()))?;

        let payload =
            serde_json::to_vec_pretty(&self.entries).context("serializing metadata cache")?;
        let mut tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("creating temp file in {}", parent.display()))?;
        tmp.write_all(&payload)
            .with_context(|| format!("writing {}", tmp.path().display()))?;
        tmp.persist(&self.path)
            .with_context(|| format!("finalizing {}", self.path.display()))?;
        self.dirty = false;
        Ok(())
    }
}
