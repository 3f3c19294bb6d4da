//! Artwork cache.
//!
//! Every resolved key is remembered for the whole session, including keys
//! for which no artwork exists, so a key is never looked up twice. Entries
//! are write-once: a second insert for the same key is ignored.
//!
//! With a cache file configured, found artwork is also persisted as JSON
//! and reloaded on the next start:
//!
//! ```text
//! ┌──────────────┐   load (skip expired,    ┌───────────────┐
//! │  cache file  │ ───── wrong version) ──▶ │ session cache │
//! └──────────────┘ ◀──── save on insert ─── └───────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::artwork::types::{ArtworkKey, ArtworkResult};

/// Bumped whenever the file layout changes; older files are discarded.
pub const CACHE_VERSION: &str = "v1";

/// Persisted entries older than this are ignored on load.
pub const CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

// ============================================================================
// File Format
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: String,
    entries: Vec<StoredArtwork>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredArtwork {
    key: ArtworkKey,
    artwork: ArtworkResult,
    /// Seconds since the Unix epoch.
    stored_at: u64,
}

// ============================================================================
// Session Cache
// ============================================================================

#[derive(Debug, Default)]
pub struct ArtworkCache {
    entries: HashMap<ArtworkKey, Option<ArtworkResult>>,
    stored_at: HashMap<ArtworkKey, u64>,
    path: Option<PathBuf>,
}

impl ArtworkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(None)` is a cached absence; `None` means the key was never
    /// resolved.
    pub fn get(&self, key: &ArtworkKey) -> Option<&Option<ArtworkResult>> {
        self.entries.get(key)
    }

    /// Returns `false` when the key was already populated.
    pub fn insert(&mut self, key: ArtworkKey, artwork: Option<ArtworkResult>) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        if artwork.is_some() {
            self.stored_at.insert(key.clone(), unix_now());
        }
        self.entries.insert(key, artwork);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn to_file(&self) -> CacheFile {
        let entries = self
            .entries
            .iter()
            .filter_map(|(key, artwork)| {
                let artwork = artwork.as_ref()?;
                Some(StoredArtwork {
                    key: key.clone(),
                    artwork: artwork.clone(),
                    stored_at: self.stored_at.get(key).copied().unwrap_or_else(unix_now),
                })
            })
            .collect();
        CacheFile {
            version: CACHE_VERSION.to_string(),
            entries,
        }
    }

    fn from_file(file: CacheFile, now: u64) -> Self {
        let mut cache = Self::new();
        if file.version != CACHE_VERSION {
            return cache;
        }
        for stored in file.entries {
            if now.saturating_sub(stored.stored_at) > CACHE_MAX_AGE.as_secs() {
                continue;
            }
            cache.stored_at.insert(stored.key.clone(), stored.stored_at);
            cache.entries.insert(stored.key, Some(stored.artwork));
        }
        cache
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ============================================================================
// File I/O
// ============================================================================

/// Loads the cache from `path`, falling back to an empty cache bound to the
/// same path when the file is missing or unreadable.
pub async fn load_cache(path: &Path) -> ArtworkCache {
    let mut cache = match load_cache_inner(path).await {
        Ok(cache) => {
            tracing::info!(
                path = %path.display(),
                entries = cache.len(),
                "Loaded artwork cache"
            );
            cache
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "Creating new artwork cache");
            ArtworkCache::new()
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to load artwork cache, starting empty"
            );
            ArtworkCache::new()
        }
    };
    cache.path = Some(path.to_path_buf());
    cache
}

async fn load_cache_inner(path: &Path) -> std::io::Result<ArtworkCache> {
    let contents = fs::read_to_string(path).await?;
    let file: CacheFile = serde_json::from_str(&contents)?;
    Ok(ArtworkCache::from_file(file, unix_now()))
}

/// Writes the found entries of `cache` to its path, if it has one.
pub async fn save_cache(cache: &ArtworkCache) -> std::io::Result<()> {
    let Some(path) = cache.path() else {
        return Ok(());
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(&cache.to_file())?;
    let mut file = fs::File::create(path).await?;
    file.write_all(json.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
