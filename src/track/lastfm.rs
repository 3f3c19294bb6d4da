use serde::Deserialize;
use serde_json::Value;

use crate::net::{FetchError, http_client, parse_json, upstream_message};
use crate::track::TrackSnapshot;

pub const DEFAULT_LASTFM_API: &str = "https://ws.audioscrobbler.com/2.0/";

#[derive(Deserialize)]
struct RecentTracksResponse {
    recenttracks: Option<RecentTracks>,
    error: Option<Value>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct RecentTracks {
    track: Option<OneOrMany<RawTrack>>,
}

/// `user.getrecenttracks` returns a bare object when there is one record
/// and an array otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

#[derive(Deserialize)]
struct RawTrack {
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist: TextNode,
    #[serde(default)]
    album: TextNode,
    #[serde(rename = "@attr")]
    attr: Option<TrackAttr>,
}

#[derive(Deserialize, Default)]
struct TextNode {
    #[serde(rename = "#text", default)]
    text: String,
}

#[derive(Deserialize)]
struct TrackAttr {
    nowplaying: Option<String>,
}

impl From<RawTrack> for TrackSnapshot {
    fn from(raw: RawTrack) -> Self {
        let is_playing = raw
            .attr
            .and_then(|a| a.nowplaying)
            .is_some_and(|flag| flag == "true");
        TrackSnapshot {
            track: raw.name,
            artist: raw.artist.text,
            album: raw.album.text,
            is_playing,
        }
    }
}

/// Parse a `user.getrecenttracks` body into the most recent record.
///
/// `Ok(None)` means the user has no scrobbles at all.
pub fn parse_recent_tracks(body: &str) -> Result<Option<TrackSnapshot>, FetchError> {
    let response: RecentTracksResponse = parse_json(body)?;
    if let Some(error) = response.error.filter(|e| !e.is_null()) {
        return Err(FetchError::Upstream(upstream_message(
            &error,
            response.message.as_deref(),
        )));
    }
    let recent = response
        .recenttracks
        .ok_or_else(|| FetchError::Upstream("response has no recenttracks".to_string()))?;
    let first = match recent.track {
        Some(OneOrMany::Many(tracks)) => tracks.into_iter().next(),
        Some(OneOrMany::One(track)) => Some(track),
        None => None,
    };
    Ok(first.map(TrackSnapshot::from))
}

/// Client for the scrobble lookup. The API key never leaves this struct.
#[derive(Clone)]
pub struct TrackClient {
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for TrackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TrackClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub async fn fetch(&self, username: &str) -> Result<Option<TrackSnapshot>, FetchError> {
        // Errors are stripped of their URL so the key cannot end up in logs.
        let resp = http_client()
            .get(&self.base_url)
            .query(&[
                ("method", "user.getrecenttracks"),
                ("user", username),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.without_url()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.without_url()))?;
        parse_recent_tracks(&body)
    }

    /// Current track for `username`; every failure reads as "no track".
    pub async fn resolve(&self, username: &str) -> Option<TrackSnapshot> {
        match self.fetch(username).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(user = username, error = %e, "Track lookup failed");
                None
            }
        }
    }
}

impl crate::track::poller::TrackSource for TrackClient {
    fn current_track(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Option<TrackSnapshot>> + Send {
        self.resolve(username)
    }
}
