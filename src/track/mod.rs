//! Track resolution: what the user is listening to right now.

pub mod lastfm;
pub mod poller;

use crate::artwork::ArtworkKey;

pub use lastfm::TrackClient;

/// Most recent scrobble for the watched user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSnapshot {
    pub track: String,
    pub artist: String,
    pub album: String,
    pub is_playing: bool,
}

impl TrackSnapshot {
    /// Artwork is only looked up when both artist and album are known.
    pub fn artwork_key(&self) -> Option<ArtworkKey> {
        if self.artist.is_empty() || self.album.is_empty() {
            return None;
        }
        Some(ArtworkKey {
            artist: self.artist.clone(),
            album: self.album.clone(),
            track: self.track.clone(),
        })
    }
}
