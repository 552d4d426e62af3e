//! ClipDrop text-to-image client

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::Form;
use std::time::Duration;
use tracing::debug;

use super::{upstream_failure, ImageGenerator};
use crate::types::{AiverseError, Result};

pub struct ClipDropClient {
    url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl ClipDropClient {
    pub fn new(url: String, api_key: Option<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("aiverse/1.0")
            .build()
            .unwrap_or_default();

        Self {
            url,
            api_key,
            http_client,
        }
    }
}

#[async_trait]
impl ImageGenerator for ClipDropClient {
    async fn generate(&self, prompt: &str) -> Result<Bytes> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AiverseError::Config("CLIPDROP_API_KEY is not configured".into()))?;

        let form = Form::new().text("prompt", prompt.to_string());

        let response = self
            .http_client
            .post(&self.url)
            .header("x-api-key", api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_failure("Image provider", response).await);
        }

        let image = response.bytes().await?;
        if image.is_empty() {
            return Err(AiverseError::Upstream("Image provider returned an empty image".into()));
        }

        debug!(bytes = image.len(), "Generated image");
        Ok(image)
    }
}
