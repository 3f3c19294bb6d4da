use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artwork::types::ArtworkKey;
use crate::net::{FetchError, http_client, read_json, upstream_message};

#[derive(Serialize)]
struct SearchRequest<'a> {
    search: &'a str,
    storefront: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    images: Vec<SearchImage>,
    error: Option<Value>,
}

#[derive(Deserialize)]
struct SearchImage {
    large: Option<String>,
}

/// Generic album-art search; the last resort of the chain.
pub async fn search_album_art(base_url: &str, key: &ArtworkKey) -> Result<String, FetchError> {
    let term = key.search_term();
    let resp = http_client()
        .post(base_url)
        .json(&SearchRequest {
            search: &term,
            storefront: "us",
            kind: "album",
        })
        .send()
        .await?;
    let result: SearchResponse = read_json(resp).await?;
    if let Some(error) = result.error.filter(|e| !e.is_null()) {
        return Err(FetchError::Upstream(upstream_message(&error, None)));
    }
    result
        .images
        .into_iter()
        .next()
        .and_then(|image| image.large)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| FetchError::Upstream("album search: no images".to_string()))
}
