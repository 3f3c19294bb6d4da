use serde::{Deserialize, Serialize};

/// Animated assets are only used when they come in this exact resolution.
pub const ANIMATED_RESOLUTION_MARKER: &str = "2160x2160";

/// Cache key for artwork lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtworkKey {
    pub artist: String,
    pub album: String,
    pub track: String,
}

impl ArtworkKey {
    /// Free-text query used by the search providers.
    pub fn search_term(&self) -> String {
        format!("{} {}", self.artist, self.album)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtworkResult {
    pub image_url: String,
    pub animated_url: Option<String>,
}

pub fn is_accepted_animation(url: &str) -> bool {
    url.contains(ANIMATED_RESOLUTION_MARKER)
}

/// Endpoints of the three artwork services. Overridable for tests and
/// self-hosted mirrors.
#[derive(Debug, Clone)]
pub struct ArtworkEndpoints {
    /// Generic album-art search (JSON POST).
    pub search_url: String,
    /// Catalog search returning album landing pages.
    pub catalog_url: String,
    /// Artwork extraction from a landing page (form POST).
    pub extract_url: String,
}

pub const DEFAULT_SEARCH_URL: &str = "https://artwork.dodoapps.io/";
pub const DEFAULT_CATALOG_URL: &str = "https://itunes.apple.com/search";
pub const DEFAULT_EXTRACT_URL: &str =
    "https://clients.dodoapps.io/playlist-precis/playlist-artwork.php";

impl Default for ArtworkEndpoints {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            extract_url: DEFAULT_EXTRACT_URL.to_string(),
        }
    }
}
