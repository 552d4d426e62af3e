//! Shared fixtures: fake providers and an in-memory dispatcher

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aiverse::auth::Plan;
use aiverse::dispatch::{DispatchConfig, MeteredDispatcher};
use aiverse::entitlements::{DecisionContext, EntitlementRecord, MemoryEntitlementStore};
use aiverse::ledger::MemoryLedger;
use aiverse::logging::UsageLogger;
use aiverse::services::{HostedMedia, ImageGenerator, MediaHost, Providers, TextGenerator, UploadOptions};
use aiverse::{AiverseError, Result};

// =============================================================================
// Fake providers
// =============================================================================

#[derive(Clone)]
pub enum TextBehavior {
    Reply(String),
    Fail,
    Hang,
}

pub struct FakeText {
    behavior: TextBehavior,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<(String, u32)>>,
}

impl FakeText {
    pub fn new(behavior: TextBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FakeText {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), max_tokens));

        match &self.behavior {
            TextBehavior::Reply(text) => Ok(text.clone()),
            TextBehavior::Fail => Err(AiverseError::Upstream("AI provider error (503): overloaded".into())),
            TextBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("too late".into())
            }
        }
    }
}

#[derive(Default)]
pub struct FakeImage {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageGenerator for FakeImage {
    async fn generate(&self, _prompt: &str) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from_static(b"\x89PNG fake image"))
    }
}

#[derive(Default)]
pub struct FakeMedia {
    pub uploads: Mutex<Vec<(usize, String, UploadOptions)>>,
}

impl FakeMedia {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaHost for FakeMedia {
    async fn upload(&self, data: Bytes, mime_type: &str, options: UploadOptions) -> Result<HostedMedia> {
        let mut uploads = self.uploads.lock().unwrap();
        let n = uploads.len() + 1;
        let folder = options.folder.clone().unwrap_or_default();
        uploads.push((data.len(), mime_type.to_string(), options));

        let public_id = if folder.is_empty() {
            format!("img{}", n)
        } else {
            format!("{}/img{}", folder, n)
        };
        Ok(HostedMedia {
            secure_url: format!("https://media.test/{}.png", public_id),
            public_id,
        })
    }

    fn transformed_url(&self, public_id: &str, transformation: &str) -> String {
        format!("https://media.test/{}/{}", transformation, public_id)
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub text: Arc<FakeText>,
    pub image: Arc<FakeImage>,
    pub media: Arc<FakeMedia>,
    pub entitlements: MemoryEntitlementStore,
    pub ledger: MemoryLedger,
    pub dispatcher: MeteredDispatcher,
}

impl Harness {
    pub fn new(behavior: TextBehavior) -> Self {
        Self::with_config(behavior, DispatchConfig::default())
    }

    pub fn with_config(behavior: TextBehavior, config: DispatchConfig) -> Self {
        let text = Arc::new(FakeText::new(behavior));
        let image = Arc::new(FakeImage::default());
        let media = Arc::new(FakeMedia::default());
        let entitlements = MemoryEntitlementStore::new();
        let ledger = MemoryLedger::new();

        let dispatcher = MeteredDispatcher::new(
            providers(&text, &image, &media),
            Arc::new(ledger.clone()),
            Arc::new(entitlements.clone()),
            UsageLogger::new("test-node".into()),
            config,
        );

        Self {
            text,
            image,
            media,
            entitlements,
            ledger,
            dispatcher,
        }
    }

    /// Seed a user and return the context the gate would build for them
    pub fn user(&self, user_id: &str, plan: Plan, free_usage: u32) -> DecisionContext {
        self.entitlements.insert(EntitlementRecord {
            user_id: user_id.into(),
            plan,
            free_usage,
        });
        DecisionContext::new(user_id, plan, free_usage)
    }

    /// Re-read a user's context from the store
    pub async fn refresh(&self, user_id: &str) -> DecisionContext {
        use aiverse::entitlements::EntitlementStore;
        let record = self.entitlements.get(user_id).await.unwrap();
        DecisionContext::from(&record)
    }

    pub async fn free_usage(&self, user_id: &str) -> u32 {
        use aiverse::entitlements::EntitlementStore;
        self.entitlements.get(user_id).await.unwrap().free_usage
    }
}

pub fn providers(text: &Arc<FakeText>, image: &Arc<FakeImage>, media: &Arc<FakeMedia>) -> Providers {
    Providers {
        text: text.clone(),
        image: image.clone(),
        media: media.clone(),
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Single-page PDF with one line of Helvetica text on its text layer
pub fn text_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_at = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        xref.push_str(&format!("{:010} 00000 n \n", offset));
    }
    pdf.extend_from_slice(xref.as_bytes());
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    pdf
}
