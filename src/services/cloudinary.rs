//! Cloudinary media host client
//!
//! Uploads are signed: the non-file parameters are sorted, joined as
//! `k=v&k=v`, suffixed with the API secret and hashed with SHA-256.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

use super::{upstream_failure, HostedMedia, MediaHost, UploadOptions};
use crate::types::{AiverseError, Result};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const DELIVERY_BASE: &str = "https://res.cloudinary.com";

#[derive(Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

pub struct CloudinaryClient {
    cloud_name: Option<String>,
    api_key: Option<String>,
    api_secret: Option<String>,
    http_client: reqwest::Client,
}

impl CloudinaryClient {
    pub fn new(
        cloud_name: Option<String>,
        api_key: Option<String>,
        api_secret: Option<String>,
        timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("aiverse/1.0")
            .build()
            .unwrap_or_default();

        Self {
            cloud_name,
            api_key,
            api_secret,
            http_client,
        }
    }

    fn credentials(&self) -> Result<(&str, &str, &str)> {
        match (
            self.cloud_name.as_deref(),
            self.api_key.as_deref(),
            self.api_secret.as_deref(),
        ) {
            (Some(cloud), Some(key), Some(secret)) => Ok((cloud, key, secret)),
            _ => Err(AiverseError::Config("Cloudinary credentials are not configured".into())),
        }
    }
}

#[async_trait]
impl MediaHost for CloudinaryClient {
    async fn upload(&self, data: Bytes, mime_type: &str, options: UploadOptions) -> Result<HostedMedia> {
        let (cloud, api_key, api_secret) = self.credentials()?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AiverseError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        let mut params = BTreeMap::new();
        params.insert("timestamp", timestamp.to_string());
        if let Some(folder) = options.folder {
            params.insert("folder", folder);
        }
        if let Some(transformation) = options.transformation {
            params.insert("transformation", transformation);
        }
        let signature = sign(&params, api_secret);

        let file = Part::bytes(data.to_vec())
            .file_name("upload")
            .mime_str(mime_type)
            .map_err(|_| AiverseError::Validation(format!("Unsupported image type: {}", mime_type)))?;

        let mut form = Form::new()
            .part("file", file)
            .text("api_key", api_key.to_string())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self
            .http_client
            .post(format!("{}/{}/image/upload", API_BASE, cloud))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(upstream_failure("Media host", response).await);
        }

        let uploaded: UploadResponse = response.json().await?;
        debug!(public_id = %uploaded.public_id, "Uploaded image");

        Ok(HostedMedia {
            public_id: uploaded.public_id,
            secure_url: uploaded.secure_url,
        })
    }

    fn transformed_url(&self, public_id: &str, transformation: &str) -> String {
        delivery_url(
            self.cloud_name.as_deref().unwrap_or_default(),
            public_id,
            transformation,
        )
    }
}

/// SHA-256 request signature over the sorted parameters
fn sign(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn delivery_url(cloud: &str, public_id: &str, transformation: &str) -> String {
    format!(
        "{}/{}/image/upload/{}/{}",
        DELIVERY_BASE, cloud, transformation, public_id
    )
}

/// Generative-remove transformation for a named object
pub fn gen_remove_transformation(object: &str) -> String {
    format!("e_gen_remove:{}", urlencoding::encode(object.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_sorted_and_salted() {
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1700000000".to_string());
        params.insert("folder", "aiverse_images".to_string());

        let mut hasher = Sha256::new();
        hasher.update(b"folder=aiverse_images&timestamp=1700000000secret");
        let expected = hex::encode(hasher.finalize());

        assert_eq!(sign(&params, "secret"), expected);
    }

    #[test]
    fn test_gen_remove_url() {
        let transformation = gen_remove_transformation(" red car ");
        assert_eq!(transformation, "e_gen_remove:red%20car");

        let url = delivery_url("demo", "AI_Object_Removal/abc", &transformation);
        assert_eq!(
            url,
            "https://res.cloudinary.com/demo/image/upload/e_gen_remove:red%20car/AI_Object_Removal/abc"
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_is_config_error() {
        let client = CloudinaryClient::new(None, None, None, Duration::from_secs(1));
        let err = client
            .upload(Bytes::from_static(b"png"), "image/png", UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AiverseError::Config(_)));
    }
}
