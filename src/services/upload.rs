//! Multipart form parsing with temp-file backed uploads
//!
//! File fields are written to a `NamedTempFile` owned by [`UploadedFile`].
//! The file is deleted when the value is dropped, so every exit path of a
//! request (success, validation error, provider failure, timeout) cleans up.

use bytes::Bytes;
use futures_util::stream;
use std::collections::HashMap;
use std::convert::Infallible;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::types::{AiverseError, Result};

/// An uploaded file held in a temporary file
#[derive(Debug)]
pub struct UploadedFile {
    file: NamedTempFile,
    file_name: Option<String>,
    content_type: Option<String>,
    size: usize,
}

impl UploadedFile {
    /// Persist uploaded bytes to a fresh temp file
    pub async fn persist(data: Bytes, file_name: Option<String>, content_type: Option<String>) -> Result<Self> {
        let size = data.len();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut file = NamedTempFile::new()?;
            file.write_all(&data)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(|e| AiverseError::Internal(format!("Upload task failed: {}", e)))??;

        debug!(path = %file.path().display(), size, "Stored upload");

        Ok(Self {
            file,
            file_name,
            content_type,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Declared MIME type, defaulting to PNG for images without one
    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or("image/png")
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Read the whole upload back
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.file.path()).await?)
    }
}

/// Parsed multipart form
#[derive(Debug, Default)]
pub struct MultipartForm {
    files: HashMap<String, UploadedFile>,
    fields: HashMap<String, String>,
}

impl MultipartForm {
    /// Take ownership of a file field
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Parse a buffered `multipart/form-data` body.
///
/// Parts named in `file_fields` become temp files; all other parts are read
/// as text fields.
pub async fn parse_multipart(content_type: Option<&str>, body: Bytes, file_fields: &[&str]) -> Result<MultipartForm> {
    let boundary = content_type
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| AiverseError::Validation("Expected a multipart/form-data upload".into()))?;

    let body_stream = stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(body_stream, boundary);
    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if file_fields.contains(&name.as_str()) {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(|m| m.to_string());
            let data = field.bytes().await.map_err(malformed)?;
            if data.is_empty() {
                continue;
            }
            let upload = UploadedFile::persist(data, file_name, content_type).await?;
            form.files.insert(name, upload);
        } else {
            let text = field.text().await.map_err(malformed)?;
            form.fields.insert(name, text);
        }
    }

    Ok(form)
}

fn malformed(err: multer::Error) -> AiverseError {
    AiverseError::Validation(format!("Malformed multipart body: {}", err))
}
