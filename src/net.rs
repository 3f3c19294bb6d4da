//! Shared HTTP plumbing for the track and artwork providers.
//!
//! Every provider talks to a best-effort third-party service, so the helpers
//! here normalise the different ways a call can fail into [`FetchError`].
//! Callers decide how far an error travels; at every component boundary it
//! collapses into "no data".

use once_cell::sync::Lazy;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

// Shared HTTP client with reasonable defaults for timeouts
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("nowplaying-art/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build HTTP client")
});

/// Upper bound for a single provider call, on top of the client timeout.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Unexpected status {0}")]
    Status(StatusCode),
    #[error("Empty response body")]
    EmptyBody,
    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Upstream error: {0}")]
    Upstream(String),
}

pub(crate) fn http_client() -> &'static Client {
    &HTTP_CLIENT
}

/// Checks the status and decodes a JSON body, treating an empty body as a
/// failure of its own.
pub async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, FetchError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }
    let body = resp.text().await.map_err(|e| FetchError::Transport(e.without_url()))?;
    parse_json(&body)
}

pub fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::EmptyBody);
    }
    Ok(serde_json::from_str(body)?)
}

/// Runs a provider call under [`PROVIDER_TIMEOUT`] so a hanging service
/// fails like any other.
pub async fn with_timeout<T, F>(call: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(PROVIDER_TIMEOUT, call).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(PROVIDER_TIMEOUT)),
    }
}

/// Renders an upstream `error` field, which providers send as a string or
/// as a numeric code.
pub fn upstream_message(error: &serde_json::Value, message: Option<&str>) -> String {
    let code = match error {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match message {
        Some(m) if !m.is_empty() => format!("{code}: {m}"),
        _ => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    struct Probe {
        value: u32,
    }

    #[test]
    fn empty_and_whitespace_bodies_are_rejected() {
        assert!(matches!(parse_json::<Probe>(""), Err(FetchError::EmptyBody)));
        assert!(matches!(parse_json::<Probe>("  \n"), Err(FetchError::EmptyBody)));
    }

    #[test]
    fn malformed_body_is_a_payload_error() {
        assert!(matches!(parse_json::<Probe>("{value:"), Err(FetchError::Payload(_))));
        assert_eq!(parse_json::<Probe>(r#"{"value":3}"#).unwrap().value, 3);
    }

    #[test]
    fn upstream_message_accepts_numbers_and_strings() {
        let numeric = serde_json::json!(6);
        assert_eq!(upstream_message(&numeric, Some("User not found")), "6: User not found");
        let text = serde_json::json!("no results");
        assert_eq!(upstream_message(&text, None), "no results");
    }

    #[tokio::test]
    async fn hanging_call_times_out() {
        tokio::time::pause();
        let result: Result<(), FetchError> =
            with_timeout(futures_util::future::pending()).await;
        assert!(matches!(result, Err(FetchError::Timeout(_))));
    }
}
