//! External providers and request-scoped helpers
//!
//! The dispatcher only sees the provider traits below. Production wiring
//! uses the OpenAI-compatible chat endpoint for text, ClipDrop for
//! text-to-image and Cloudinary for hosting and transforming images.

pub mod chat;
pub mod clipdrop;
pub mod cloudinary;
pub mod resume;
pub mod upload;

pub use chat::ChatCompletionsClient;
pub use clipdrop::ClipDropClient;
pub use cloudinary::CloudinaryClient;
pub use upload::{parse_multipart, MultipartForm, UploadedFile};

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::warn;

use crate::config::Args;
use crate::types::{AiverseError, Result};

/// Text generation (chat completion)
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete a single user prompt, bounded to `max_tokens`
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

/// Text-to-image generation
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Render a prompt, returning encoded image bytes
    async fn generate(&self, prompt: &str) -> Result<Bytes>;
}

/// Where an uploaded image goes and what happens to it on the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    pub folder: Option<String>,
    /// Incoming transformation applied before storage, e.g. `e_background_removal`
    pub transformation: Option<String>,
}

/// An image stored by the media host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedMedia {
    pub public_id: String,
    pub secure_url: String,
}

/// Image hosting with URL-addressable transformations
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Store an image and return where it lives
    async fn upload(&self, data: Bytes, mime_type: &str, options: UploadOptions) -> Result<HostedMedia>;

    /// Delivery URL for a stored image with a transformation applied
    fn transformed_url(&self, public_id: &str, transformation: &str) -> String;
}

/// The set of providers the dispatcher calls
#[derive(Clone)]
pub struct Providers {
    pub text: Arc<dyn TextGenerator>,
    pub image: Arc<dyn ImageGenerator>,
    pub media: Arc<dyn MediaHost>,
}

impl Providers {
    /// Build the HTTP provider clients from configuration
    pub fn from_args(args: &Args) -> Self {
        let timeout = args.provider_timeout();
        let p = &args.providers;

        Self {
            text: Arc::new(ChatCompletionsClient::new(
                p.ai_base_url.clone(),
                p.ai_model.clone(),
                p.gemini_api_key.clone(),
                timeout,
            )),
            image: Arc::new(ClipDropClient::new(
                p.clipdrop_url.clone(),
                p.clipdrop_api_key.clone(),
                timeout,
            )),
            media: Arc::new(CloudinaryClient::new(
                p.cloudinary_cloud_name.clone(),
                p.cloudinary_api_key.clone(),
                p.cloudinary_api_secret.clone(),
                timeout,
            )),
        }
    }
}

/// Turn a non-2xx provider response into an upstream error carrying the
/// provider's own message when it sent one
pub(crate) async fn upstream_failure(provider: &str, response: reqwest::Response) -> AiverseError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error"))
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    warn!(provider = provider, status = %status, "Provider returned an error: {}", detail);
    AiverseError::Upstream(format!("{} error ({}): {}", provider, status.as_u16(), detail))
}
