//! Media sources: fetching and decoding the visuals the renderer composites.

use image::codecs::gif::GifDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, ImageFormat, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::display::DisplayTarget;
use crate::net::{FetchError, http_client, with_timeout};

/// Frames shorter than this are shown for [`DEFAULT_FRAME_DELAY`] instead,
/// like browsers do for zero-delay GIFs.
const MIN_FRAME_DELAY: Duration = Duration::from_millis(20);
const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Unsupported animation format: {0}")]
    UnsupportedAnimation(String),
    #[error("Media has no frames")]
    Empty,
    #[error("Decode task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug)]
pub struct MediaFrame {
    pub image: RgbImage,
    pub delay: Duration,
}

/// A decoded visual. Frames are shared, so clones are cheap.
#[derive(Debug, Clone)]
pub struct MediaSource {
    kind: MediaKind,
    url: String,
    frames: Arc<[MediaFrame]>,
    loop_length: Duration,
}

impl MediaSource {
    pub fn new(kind: MediaKind, url: impl Into<String>, frames: Vec<MediaFrame>) -> Result<Self, MediaError> {
        if frames.is_empty() {
            return Err(MediaError::Empty);
        }
        let loop_length = frames.iter().map(|f| f.delay).sum();
        Ok(Self {
            kind,
            url: url.into(),
            frames: frames.into(),
            loop_length,
        })
    }

    pub fn still(url: impl Into<String>, image: RgbImage) -> Self {
        Self {
            kind: MediaKind::Image,
            url: url.into(),
            frames: vec![MediaFrame {
                image,
                delay: Duration::ZERO,
            }]
            .into(),
            loop_length: Duration::ZERO,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Index of the frame to show `elapsed` after the source appeared.
    /// Animations loop forever.
    pub fn frame_index_at(&self, elapsed: Duration) -> usize {
        if self.frames.len() <= 1 || self.loop_length.is_zero() {
            return 0;
        }
        let loop_nanos = self.loop_length.as_nanos();
        let mut offset = Duration::from_nanos((elapsed.as_nanos() % loop_nanos) as u64);
        for (idx, frame) in self.frames.iter().enumerate() {
            if offset < frame.delay {
                return idx;
            }
            offset -= frame.delay;
        }
        self.frames.len() - 1
    }

    pub fn frame(&self, index: usize) -> &RgbImage {
        &self.frames[index.min(self.frames.len() - 1)].image
    }
}

// ============================================================================
// Decoding
// ============================================================================

pub fn decode_still(url: &str, bytes: &[u8]) -> Result<MediaSource, MediaError> {
    let image = image::load_from_memory(bytes)?.to_rgb8();
    Ok(MediaSource::still(url, image))
}

/// Decode a looping animation (GIF or animated WebP).
pub fn decode_animation(url: &str, bytes: &[u8]) -> Result<MediaSource, MediaError> {
    let format = image::guess_format(bytes)?;
    let frames = match format {
        ImageFormat::Gif => GifDecoder::new(Cursor::new(bytes))?.into_frames().collect_frames()?,
        ImageFormat::WebP => WebPDecoder::new(Cursor::new(bytes))?.into_frames().collect_frames()?,
        other => return Err(MediaError::UnsupportedAnimation(format!("{other:?}"))),
    };
    let frames = frames
        .into_iter()
        .map(|frame| {
            let delay = Duration::from(frame.delay());
            MediaFrame {
                delay: if delay < MIN_FRAME_DELAY { DEFAULT_FRAME_DELAY } else { delay },
                image: image::DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8(),
            }
        })
        .collect();
    MediaSource::new(MediaKind::Video, url, frames)
}

/// Decode on the blocking pool; large JPEGs and long GIFs take a while.
async fn decode_blocking(url: String, bytes: Vec<u8>, animated: bool) -> Result<MediaSource, MediaError> {
    tokio::task::spawn_blocking(move || {
        if animated {
            decode_animation(&url, &bytes)
        } else {
            decode_still(&url, &bytes)
        }
    })
    .await?
}

// ============================================================================
// Loading
// ============================================================================

async fn fetch_bytes(location: &str) -> Result<Vec<u8>, MediaError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let bytes = with_timeout(async {
            let resp = http_client().get(location).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Status(status));
            }
            Ok(resp.bytes().await?)
        })
        .await?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyBody.into());
        }
        return Ok(bytes.to_vec());
    }
    let path = location.strip_prefix("file://").unwrap_or(location);
    tokio::fs::read(path).await.map_err(|source| MediaError::Io {
        path: path.to_string(),
        source,
    })
}

/// Fetches and decodes targets. The placeholder is decoded once and reused,
/// since the display returns to it every time playback stops.
#[derive(Clone)]
pub struct MediaLoader {
    placeholder: Option<String>,
    memo: Arc<Mutex<HashMap<String, MediaSource>>>,
}

impl MediaLoader {
    pub fn new(placeholder: Option<String>) -> Self {
        Self {
            placeholder,
            memo: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Warm the placeholder so the first idle screen does not wait on it.
    pub async fn preload_placeholder(&self) {
        let Some(url) = self.placeholder.clone() else {
            return;
        };
        if let Err(e) = self.load(&DisplayTarget::still(Some(url.clone()))).await {
            tracing::warn!(url = %url, error = %e, "Failed to preload placeholder");
        }
    }

    /// Load the visual for `target`. Targets without a URL have nothing to
    /// load and are handled by the renderer as black.
    pub async fn load(&self, target: &DisplayTarget) -> Result<MediaSource, MediaError> {
        let Some(url) = target.url.as_deref() else {
            return Err(MediaError::Empty);
        };
        let is_placeholder = self.placeholder.as_deref() == Some(url);
        if is_placeholder && let Some(source) = self.memo.lock().await.get(url) {
            return Ok(source.clone());
        }

        let bytes = fetch_bytes(url).await?;
        let source = decode_blocking(url.to_string(), bytes, target.is_animated).await?;
        tracing::debug!(
            url = %url,
            kind = ?source.kind(),
            frames = source.frame_count(),
            "Decoded media"
        );

        if is_placeholder {
            self.memo.lock().await.insert(url.to_string(), source.clone());
        }
        Ok(source)
    }
}
