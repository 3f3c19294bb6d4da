//! Display state: what should be on screen for the latest track and artwork.
//!
//! [`compute_target`] is the pure rule; [`DisplayStore`] keeps the inputs it
//! needs and tracks which artwork key is in flight so stale resolutions are
//! ignored.

use std::collections::HashSet;

use crate::artwork::{ArtworkKey, ArtworkResult};
use crate::track::TrackSnapshot;

/// The single visual the renderer should converge to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayTarget {
    pub url: Option<String>,
    pub is_animated: bool,
}

impl DisplayTarget {
    pub fn still(url: Option<String>) -> Self {
        Self {
            url,
            is_animated: false,
        }
    }
}

pub struct DisplayInputs<'a> {
    pub snapshot: Option<&'a TrackSnapshot>,
    pub artwork: Option<&'a ArtworkResult>,
    pub artwork_loading: bool,
    pub placeholder: Option<&'a str>,
    /// Set when the animated asset is known not to play.
    pub skip_animated: bool,
}

/// Target for the given inputs, or `None` to keep whatever is shown while
/// artwork is still loading.
pub fn compute_target(inputs: &DisplayInputs<'_>) -> Option<DisplayTarget> {
    if inputs.artwork_loading {
        return None;
    }
    let placeholder = || DisplayTarget::still(inputs.placeholder.map(str::to_string));

    let playing = inputs.snapshot.is_some_and(|s| s.is_playing);
    if !playing {
        return Some(placeholder());
    }
    let Some(artwork) = inputs.artwork else {
        return Some(placeholder());
    };
    if !inputs.skip_animated
        && let Some(animated) = &artwork.animated_url
    {
        return Some(DisplayTarget {
            url: Some(animated.clone()),
            is_animated: true,
        });
    }
    Some(DisplayTarget::still(Some(artwork.image_url.clone())))
}

#[derive(Debug, Default)]
pub struct DisplayStore {
    placeholder: Option<String>,
    snapshot: Option<TrackSnapshot>,
    artwork_key: Option<ArtworkKey>,
    artwork: Option<ArtworkResult>,
    artwork_loading: bool,
    unplayable: HashSet<String>,
}

impl DisplayStore {
    pub fn new(placeholder: Option<String>) -> Self {
        Self {
            placeholder,
            ..Self::default()
        }
    }

    /// Record a poll result. Returns the artwork key to resolve when the
    /// snapshot moved to a new key.
    pub fn set_snapshot(&mut self, snapshot: Option<TrackSnapshot>) -> Option<ArtworkKey> {
        let key = snapshot.as_ref().and_then(TrackSnapshot::artwork_key);
        self.snapshot = snapshot;
        if key == self.artwork_key {
            return None;
        }
        self.artwork_key = key.clone();
        match key {
            Some(key) => {
                // The previous artwork stays around but is not shown until
                // the new key resolves.
                self.artwork_loading = true;
                Some(key)
            }
            None => {
                self.artwork = None;
                self.artwork_loading = false;
                None
            }
        }
    }

    /// Record a resolution. Results for keys the store has moved past are
    /// dropped; returns whether the result was taken.
    pub fn set_artwork(&mut self, key: &ArtworkKey, artwork: Option<ArtworkResult>) -> bool {
        if self.artwork_key.as_ref() != Some(key) {
            return false;
        }
        self.artwork = artwork;
        self.artwork_loading = false;
        true
    }

    /// Remember that `url` could not be played as animation.
    pub fn mark_unplayable(&mut self, url: &str) {
        self.unplayable.insert(url.to_string());
    }

    #[cfg(test)]
    pub fn is_loading(&self) -> bool {
        self.artwork_loading
    }

    pub fn target(&self) -> Option<DisplayTarget> {
        let skip_animated = self
            .artwork
            .as_ref()
            .and_then(|a| a.animated_url.as_ref())
            .is_some_and(|url| self.unplayable.contains(url));
        compute_target(&DisplayInputs {
            snapshot: self.snapshot.as_ref(),
            artwork: self.artwork.as_ref(),
            artwork_loading: self.artwork_loading,
            placeholder: self.placeholder.as_deref(),
            skip_animated,
        })
    }
}
