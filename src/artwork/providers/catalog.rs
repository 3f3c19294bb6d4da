use serde::Deserialize;

use crate::artwork::types::ArtworkKey;
use crate::net::{FetchError, http_client, read_json};

#[derive(Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    results: Vec<CatalogEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntry {
    collection_view_url: Option<String>,
}

/// Find the canonical album landing page for `key` in the store catalog.
pub async fn find_album_page(base_url: &str, key: &ArtworkKey) -> Result<String, FetchError> {
    let url = format!(
        "{}?term={}&entity=album&limit=1",
        base_url,
        urlencoding::encode(&key.search_term())
    );
    let resp = http_client().get(&url).send().await?;
    let catalog: CatalogResponse = read_json(resp).await?;
    catalog
        .results
        .into_iter()
        .find_map(|entry| entry.collection_view_url.filter(|u| !u.is_empty()))
        .ok_or_else(|| FetchError::Upstream("catalog: no album match".to_string()))
}
