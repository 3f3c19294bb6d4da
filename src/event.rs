// event.rs: Messages flowing from background tasks into the screen loop

use crate::artwork::{ArtworkKey, ArtworkResult};
use crate::display::DisplayTarget;
use crate::render::{MediaError, MediaSource};

#[derive(Debug)]
pub enum AppEvent {
    /// An artwork resolution finished for `key`.
    Artwork(ArtworkKey, Option<ArtworkResult>),
    /// A media load finished for `target`.
    Media(DisplayTarget, Result<MediaSource, MediaError>),
}

/// Work the screen loop asks to be run in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ResolveArtwork(ArtworkKey),
    LoadMedia(DisplayTarget),
}
