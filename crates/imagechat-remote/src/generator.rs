use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use imagechat_core::traits::AnswerGenerator;
use imagechat_core::types::GeneratedAnswer;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    query: &'a str,
    context: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
    confidence: f32,
}

/// Client for the answer-generation service: `POST {base}/generate`.
pub struct HttpAnswerGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnswerGenerator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl AnswerGenerator for HttpAnswerGenerator {
    async fn generate(&self, query_text: &str, context: Option<&str>) -> Result<GeneratedAnswer> {
        let body = GenerateRequest {
            query: query_text,
            context,
        };
        debug!("POST {}/generate", self.base_url);

        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("generator returned {}", status));
        }

        let parsed: GenerateResponse = response.json().await?;
        Ok(GeneratedAnswer {
            text: parsed.text,
            confidence: parsed.confidence,
        })
    }
}
