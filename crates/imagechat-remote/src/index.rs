use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use imagechat_core::traits::SimilarityIndex;
use imagechat_core::types::{Meta, RetrievedImage};

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchHitBody>,
}

#[derive(Debug, Deserialize)]
struct SearchHitBody {
    document_id: String,
    page_content: String,
    #[serde(default)]
    metadata: Meta,
    distance: f32,
}

/// Client for the vector index service: `POST {base}/search`.
pub struct HttpSimilarityIndex {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSimilarityIndex {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SimilarityIndex for HttpSimilarityIndex {
    async fn search(&self, query_text: &str, k: usize) -> Result<Vec<RetrievedImage>> {
        let body = SearchRequest { query: query_text, k };
        debug!("POST {}/search k={}", self.base_url, k);

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("similarity index returned {}", status));
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(into_images(parsed.results, k))
    }
}

/// The index contract is "at most k hits with non-negative distances";
/// over-long responses are truncated and stray negative distances clamped.
fn into_images(hits: Vec<SearchHitBody>, k: usize) -> Vec<RetrievedImage> {
    hits.into_iter()
        .take(k)
        .map(|hit| RetrievedImage {
            document_id: hit.document_id,
            page_content: hit.page_content,
            metadata: hit.metadata,
            raw_distance: hit.distance.max(0.0),
        })
        .collect()
}
