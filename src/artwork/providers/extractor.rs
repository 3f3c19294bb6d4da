use serde::Deserialize;
use serde_json::Value;

use crate::net::{FetchError, http_client, read_json, upstream_message};

#[derive(Deserialize)]
struct StillResponse {
    large: Option<String>,
    error: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnimatedResponse {
    animated_url: Option<String>,
    error: Option<Value>,
}

fn check_error(error: Option<Value>) -> Result<(), FetchError> {
    match error.filter(|e| !e.is_null()) {
        Some(e) => Err(FetchError::Upstream(upstream_message(&e, None))),
        None => Ok(()),
    }
}

fn non_empty(url: Option<String>, what: &str) -> Result<String, FetchError> {
    url.filter(|u| !u.is_empty())
        .ok_or_else(|| FetchError::Upstream(format!("extractor: no {what}")))
}

/// Large still artwork for an album landing page.
pub async fn extract_still(base_url: &str, page_url: &str) -> Result<String, FetchError> {
    let resp = http_client()
        .post(base_url)
        .form(&[("url", page_url)])
        .send()
        .await?;
    let still: StillResponse = read_json(resp).await?;
    check_error(still.error)?;
    non_empty(still.large, "still image")
}

/// Animated artwork for an album landing page, if the album has one.
pub async fn extract_animated(base_url: &str, page_url: &str) -> Result<String, FetchError> {
    let resp = http_client()
        .post(base_url)
        .form(&[("url", page_url), ("animation", "true")])
        .send()
        .await?;
    let animated: AnimatedResponse = read_json(resp).await?;
    check_error(animated.error)?;
    non_empty(animated.animated_url, "animated artwork")
}
