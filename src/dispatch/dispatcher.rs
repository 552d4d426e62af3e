//! The metered dispatcher
//!
//! Order of effects for one call:
//!
//! 1. authorize against the caller's decision context
//! 2. validate and shape the payload (no paid call on bad input)
//! 3. invoke the provider under the configured timeout
//! 4. append the creation to the ledger
//! 5. for free-tier operations by non-premium users, increment free usage
//!
//! A failure at 2 or 3 leaves the ledger and the counter untouched. A failed
//! increment at 5 is logged and the response still succeeds.

use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{Operation, OperationRequest};
use crate::auth::{check_access, AccessPolicy};
use crate::config::Args;
use crate::entitlements::{DecisionContext, EntitlementStore};
use crate::ledger::{Creation, CreationLedger, NewCreation};
use crate::logging::{EventType, UsageEvent, UsageLogger};
use crate::services::cloudinary::gen_remove_transformation;
use crate::services::{resume, Providers, UploadOptions, UploadedFile};
use crate::types::{AiverseError, Result};

const DEFAULT_ARTICLE_TOKENS: u32 = 500;
const MAX_ARTICLE_TOKENS: u32 = 8192;
const BLOG_TITLE_TOKENS: u32 = 120;
const RESUME_REVIEW_TOKENS: u32 = 1000;

const IMAGE_FOLDER: &str = "aiverse_images";
const OBJECT_REMOVAL_FOLDER: &str = "AI_Object_Removal";
const BACKGROUND_REMOVAL: &str = "e_background_removal";
const RESUME_REVIEW_PROMPT: &str = "Resume Review";

/// Dispatcher limits
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Free-tier calls allowed before denial
    pub quota_ceiling: u32,
    pub provider_timeout: Duration,
    pub max_resume_bytes: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            quota_ceiling: 10,
            provider_timeout: Duration::from_secs(60),
            max_resume_bytes: 5 * 1024 * 1024,
        }
    }
}

impl DispatchConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            quota_ceiling: args.free_usage_limit,
            provider_timeout: args.provider_timeout(),
            max_resume_bytes: args.max_resume_bytes,
        }
    }
}

/// Result of a successful dispatch
#[derive(Debug, Clone)]
pub struct Outcome {
    pub operation: Operation,
    pub creation: Creation,
}

impl Outcome {
    pub fn message(&self) -> &'static str {
        self.operation.success_message()
    }

    pub fn content(&self) -> &str {
        &self.creation.content
    }
}

/// Provider work for one validated request
enum ProviderCall {
    Chat { prompt: String, max_tokens: u32 },
    TextToImage { prompt: String },
    RemoveBackground { image: UploadedFile },
    RemoveObject { image: UploadedFile, object: String },
}

/// A validated request: what to call and what to record
struct Prepared {
    ledger_prompt: String,
    publish: bool,
    call: ProviderCall,
}

/// Runs metered operations
pub struct MeteredDispatcher {
    providers: Providers,
    ledger: Arc<dyn CreationLedger>,
    entitlements: Arc<dyn EntitlementStore>,
    usage: UsageLogger,
    config: DispatchConfig,
}

impl MeteredDispatcher {
    pub fn new(
        providers: Providers,
        ledger: Arc<dyn CreationLedger>,
        entitlements: Arc<dyn EntitlementStore>,
        usage: UsageLogger,
        config: DispatchConfig,
    ) -> Self {
        Self {
            providers,
            ledger,
            entitlements,
            usage,
            config,
        }
    }

    /// Apply the operation's access policy to the caller
    pub async fn authorize(&self, ctx: &DecisionContext, op: Operation) -> Result<()> {
        let decision = check_access(
            op.policy(),
            ctx.plan(),
            ctx.free_usage(),
            self.config.quota_ceiling,
        );

        if let Err(denial) = decision {
            info!(
                user_id = %ctx.user_id(),
                operation = %op,
                plan = %ctx.plan(),
                free_usage = ctx.free_usage(),
                "Operation denied: {}",
                denial.message()
            );
            self.usage
                .log(self.event(EventType::OperationDenied, ctx, op))
                .await;
            return Err(AiverseError::EntitlementDenied(denial.message().into()));
        }

        Ok(())
    }

    /// Authorize, run and record one operation
    pub async fn dispatch(&self, ctx: &DecisionContext, request: OperationRequest) -> Result<Outcome> {
        let op = request.operation();
        self.authorize(ctx, op).await?;

        let started = Instant::now();
        let result = self.run(ctx, op, request).await;

        if let Err(e) = &result {
            warn!(user_id = %ctx.user_id(), operation = %op, error = %e, "Operation failed");
            self.usage
                .log(
                    self.event(EventType::OperationFailed, ctx, op)
                        .with_duration(started.elapsed().as_millis() as u64)
                        .with_metadata(serde_json::json!({ "error": e.kind() })),
                )
                .await;
        }

        result
    }

    async fn run(&self, ctx: &DecisionContext, op: Operation, request: OperationRequest) -> Result<Outcome> {
        let prepared = self.prepare(request).await?;

        let started = Instant::now();
        let content = tokio::time::timeout(self.config.provider_timeout, self.invoke(prepared.call))
            .await
            .map_err(|_| AiverseError::Upstream("Provider request timed out".into()))??;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if content.trim().is_empty() {
            return Err(AiverseError::Upstream("Provider returned no content".into()));
        }

        self.usage
            .log(self.event(EventType::OperationInvoked, ctx, op).with_duration(elapsed_ms))
            .await;

        let creation = self
            .ledger
            .append(NewCreation {
                user_id: ctx.user_id().to_string(),
                prompt: prepared.ledger_prompt,
                content,
                creation_type: op.creation_type(),
                publish: prepared.publish,
            })
            .await?;

        info!(
            user_id = %ctx.user_id(),
            operation = %op,
            creation_id = %creation.id,
            duration_ms = elapsed_ms,
            "Creation recorded"
        );
        self.usage
            .log(
                self.event(EventType::CreationRecorded, ctx, op)
                    .with_creation(&creation.id),
            )
            .await;

        if op.policy() == AccessPolicy::FreeTierWithQuota && !ctx.plan().is_premium() {
            self.meter(ctx, op).await;
        }

        Ok(Outcome {
            operation: op,
            creation,
        })
    }

    /// Best-effort free-usage increment after a recorded success
    async fn meter(&self, ctx: &DecisionContext, op: Operation) {
        match self.entitlements.increment_free_usage(ctx.user_id()).await {
            Ok(()) => {
                debug!(user_id = %ctx.user_id(), used = ctx.free_usage() + 1, "Free usage incremented");
                self.usage
                    .log(self.event(EventType::QuotaIncremented, ctx, op))
                    .await;
            }
            Err(e) => {
                warn!(user_id = %ctx.user_id(), error = %e, "Free usage increment failed");
            }
        }
    }

    /// Validate the raw payload and decide the provider call
    async fn prepare(&self, request: OperationRequest) -> Result<Prepared> {
        Ok(match request {
            OperationRequest::Article { prompt, length } => {
                let prompt = require_prompt(prompt)?;
                let max_tokens = match length {
                    None | Some(0) => DEFAULT_ARTICLE_TOKENS,
                    Some(n) => n.min(MAX_ARTICLE_TOKENS),
                };
                Prepared {
                    ledger_prompt: prompt.clone(),
                    publish: false,
                    call: ProviderCall::Chat { prompt, max_tokens },
                }
            }
            OperationRequest::BlogTitle { prompt } => {
                let prompt = require_prompt(prompt)?;
                Prepared {
                    ledger_prompt: prompt.clone(),
                    publish: false,
                    call: ProviderCall::Chat {
                        prompt,
                        max_tokens: BLOG_TITLE_TOKENS,
                    },
                }
            }
            OperationRequest::Image { prompt, publish } => {
                let prompt = require_prompt(prompt)?;
                Prepared {
                    ledger_prompt: prompt.clone(),
                    publish,
                    call: ProviderCall::TextToImage { prompt },
                }
            }
            OperationRequest::RemoveBackground { image } => {
                let image = image.ok_or_else(|| {
                    AiverseError::Validation("Please upload a valid image file.".into())
                })?;
                Prepared {
                    ledger_prompt: "Removed background from image".into(),
                    publish: false,
                    call: ProviderCall::RemoveBackground { image },
                }
            }
            OperationRequest::RemoveObject { image, object } => {
                let image =
                    image.ok_or_else(|| AiverseError::Validation("No image file uploaded.".into()))?;
                let object = object
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .ok_or_else(|| {
                        AiverseError::Validation("Please describe the object to remove.".into())
                    })?;
                Prepared {
                    ledger_prompt: format!("Removed {} from image", object),
                    publish: false,
                    call: ProviderCall::RemoveObject { image, object },
                }
            }
            OperationRequest::ReviewResume { resume } => {
                let file = resume.ok_or_else(|| {
                    AiverseError::Validation("Please upload a valid resume file.".into())
                })?;
                if file.size() > self.config.max_resume_bytes {
                    return Err(AiverseError::Validation(format!(
                        "Resume exceeds the allowed size limit ({}MB).",
                        self.config.max_resume_bytes / (1024 * 1024)
                    )));
                }
                let text = resume::extract_text(file.read().await?).await?;
                Prepared {
                    ledger_prompt: RESUME_REVIEW_PROMPT.into(),
                    publish: false,
                    call: ProviderCall::Chat {
                        prompt: resume::review_prompt(&text),
                        max_tokens: RESUME_REVIEW_TOKENS,
                    },
                }
            }
        })
    }

    /// Call the providers; returns the creation content
    async fn invoke(&self, call: ProviderCall) -> Result<String> {
        let media = &self.providers.media;

        match call {
            ProviderCall::Chat { prompt, max_tokens } => {
                self.providers.text.complete(&prompt, max_tokens).await
            }
            ProviderCall::TextToImage { prompt } => {
                let png = self.providers.image.generate(&prompt).await?;
                let hosted = media
                    .upload(
                        png,
                        "image/png",
                        UploadOptions {
                            folder: Some(IMAGE_FOLDER.into()),
                            transformation: None,
                        },
                    )
                    .await?;
                Ok(hosted.secure_url)
            }
            ProviderCall::RemoveBackground { image } => {
                let data = Bytes::from(image.read().await?);
                let hosted = media
                    .upload(
                        data,
                        image.content_type(),
                        UploadOptions {
                            folder: None,
                            transformation: Some(BACKGROUND_REMOVAL.into()),
                        },
                    )
                    .await?;
                Ok(hosted.secure_url)
            }
            ProviderCall::RemoveObject { image, object } => {
                let data = Bytes::from(image.read().await?);
                let hosted = media
                    .upload(
                        data,
                        image.content_type(),
                        UploadOptions {
                            folder: Some(OBJECT_REMOVAL_FOLDER.into()),
                            transformation: None,
                        },
                    )
                    .await?;
                Ok(media.transformed_url(&hosted.public_id, &gen_remove_transformation(&object)))
            }
        }
    }

    fn event(&self, event_type: EventType, ctx: &DecisionContext, op: Operation) -> UsageEvent {
        self.usage
            .event(event_type)
            .with_user(ctx.user_id())
            .with_plan(ctx.plan())
            .with_operation(op.slug())
    }
}

fn require_prompt(prompt: Option<String>) -> Result<String> {
    prompt
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AiverseError::Validation("Please enter a valid prompt.".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_prompt_is_validation_error() {
        assert!(require_prompt(None).is_err());
        assert!(require_prompt(Some("   ".into())).is_err());
        assert_eq!(require_prompt(Some(" hi ".into())).unwrap(), "hi");
    }

    #[test]
    fn test_outcome_exposes_message_and_content() {
        let outcome = Outcome {
            operation: Operation::GenerateBlogTitle,
            creation: Creation {
                id: "id".into(),
                user_id: "u".into(),
                prompt: "p".into(),
                content: "Ten titles".into(),
                creation_type: crate::ledger::CreationType::BlogTitle,
                publish: false,
                likes: vec![],
                created_at: chrono::Utc::now(),
            },
        };
        assert_eq!(outcome.message(), "Blog titles generated successfully!");
        assert_eq!(outcome.content(), "Ten titles");
    }
}
