//! Artwork resolution with a provider fallback chain.
//!
//! ```text
//! catalog search ──▶ extractor (still ‖ animated) ──▶ ArtworkResult
//!       │ fail               │ fail (still)
//!       └─────────┬──────────┘
//!                 ▼
//!          album-art search ──▶ ArtworkResult (still only)
//!                 │ fail
//!                 ▼
//!               None
//! ```
//!
//! Each step is best-effort. Results (including "nothing found") are cached
//! per key for the session.

pub mod cache;
pub mod providers;
pub mod types;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::net::{FetchError, with_timeout};

pub use cache::ArtworkCache;
pub use types::{ArtworkEndpoints, ArtworkKey, ArtworkResult};

#[derive(Clone)]
pub struct ArtworkResolver {
    endpoints: Arc<ArtworkEndpoints>,
    cache: Arc<Mutex<ArtworkCache>>,
}

impl ArtworkResolver {
    pub fn new(endpoints: ArtworkEndpoints, cache: ArtworkCache) -> Self {
        Self {
            endpoints: Arc::new(endpoints),
            cache: Arc::new(Mutex::new(cache)),
        }
    }

    /// Artwork for `key`, from the cache when this key was resolved before.
    pub async fn resolve(&self, key: &ArtworkKey) -> Option<ArtworkResult> {
        if let Some(cached) = self.cache.lock().await.get(key) {
            tracing::debug!(artist = %key.artist, album = %key.album, "Artwork cache hit");
            return cached.clone();
        }

        let artwork = self.lookup(key).await;

        let mut cache = self.cache.lock().await;
        if cache.insert(key.clone(), artwork.clone())
            && artwork.is_some()
            && let Err(e) = cache::save_cache(&cache).await
        {
            tracing::warn!(error = %e, "Failed to save artwork cache");
        }
        // A concurrent resolution may have populated the key first; the
        // first value wins.
        cache.get(key).cloned().flatten()
    }

    async fn lookup(&self, key: &ArtworkKey) -> Option<ArtworkResult> {
        match self.lookup_catalog(key).await {
            Ok(artwork) => return Some(artwork),
            Err(e) => tracing::debug!(
                artist = %key.artist,
                album = %key.album,
                error = %e,
                "Catalog artwork unavailable, trying album search"
            ),
        }

        match with_timeout(providers::search_album_art(&self.endpoints.search_url, key)).await {
            Ok(image_url) => Some(ArtworkResult {
                image_url,
                animated_url: None,
            }),
            Err(e) => {
                tracing::debug!(
                    artist = %key.artist,
                    album = %key.album,
                    error = %e,
                    "No artwork found"
                );
                None
            }
        }
    }

    async fn lookup_catalog(&self, key: &ArtworkKey) -> Result<ArtworkResult, FetchError> {
        let page = with_timeout(providers::find_album_page(&self.endpoints.catalog_url, key)).await?;
        let extract_url = self.endpoints.extract_url.as_str();
        let (still, animated) = tokio::join!(
            with_timeout(providers::extract_still(extract_url, &page)),
            with_timeout(providers::extract_animated(extract_url, &page)),
        );
        let image_url = still?;
        let animated_url = match animated {
            Ok(url) if types::is_accepted_animation(&url) => Some(url),
            Ok(url) => {
                tracing::debug!(url = %url, "Discarding low-resolution animated artwork");
                None
            }
            Err(_) => None,
        };
        Ok(ArtworkResult {
            image_url,
            animated_url,
        })
    }
}
