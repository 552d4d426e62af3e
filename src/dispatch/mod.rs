//! Metered operation dispatch
//!
//! Every AI feature is one variant of the closed [`Operation`] set. Each
//! variant declares its access policy, the creation type it records and the
//! message returned on success; the [`MeteredDispatcher`] runs all of them
//! through the same authorize, validate, invoke, record, meter sequence.

pub mod dispatcher;

pub use dispatcher::{DispatchConfig, MeteredDispatcher, Outcome};

use std::fmt;

use crate::auth::AccessPolicy;
use crate::ledger::CreationType;
use crate::services::UploadedFile;

/// A metered AI operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GenerateArticle,
    GenerateBlogTitle,
    GenerateImage,
    RemoveBackground,
    RemoveObject,
    ReviewResume,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::GenerateArticle,
        Operation::GenerateBlogTitle,
        Operation::GenerateImage,
        Operation::RemoveBackground,
        Operation::RemoveObject,
        Operation::ReviewResume,
    ];

    /// Route slug under `/api/ai/`
    pub fn slug(self) -> &'static str {
        match self {
            Operation::GenerateArticle => "generate-article",
            Operation::GenerateBlogTitle => "generate-blog-title",
            Operation::GenerateImage => "generate-image",
            Operation::RemoveBackground => "remove-bg",
            Operation::RemoveObject => "remove-object",
            Operation::ReviewResume => "review-resume",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.slug() == slug)
    }

    pub fn policy(self) -> AccessPolicy {
        match self {
            Operation::GenerateArticle | Operation::GenerateBlogTitle => {
                AccessPolicy::FreeTierWithQuota
            }
            Operation::GenerateImage
            | Operation::RemoveBackground
            | Operation::RemoveObject
            | Operation::ReviewResume => AccessPolicy::PremiumOnly,
        }
    }

    pub fn creation_type(self) -> CreationType {
        match self {
            Operation::GenerateArticle => CreationType::Article,
            Operation::GenerateBlogTitle => CreationType::BlogTitle,
            Operation::GenerateImage | Operation::RemoveBackground | Operation::RemoveObject => {
                CreationType::Image
            }
            Operation::ReviewResume => CreationType::ResumeReview,
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            Operation::GenerateArticle => "Article generated successfully!",
            Operation::GenerateBlogTitle => "Blog titles generated successfully!",
            Operation::GenerateImage => "Image generated successfully!",
            Operation::RemoveBackground => "Background removed successfully!",
            Operation::RemoveObject => "Object removed successfully!",
            Operation::ReviewResume => "Resume reviewed successfully!",
        }
    }

    /// Multipart file field the operation expects, if any
    pub fn upload_field(self) -> Option<&'static str> {
        match self {
            Operation::RemoveBackground | Operation::RemoveObject => Some("image"),
            Operation::ReviewResume => Some("resume"),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Raw operation payload as received; validated by the dispatcher
#[derive(Debug)]
pub enum OperationRequest {
    Article {
        prompt: Option<String>,
        length: Option<u32>,
    },
    BlogTitle {
        prompt: Option<String>,
    },
    Image {
        prompt: Option<String>,
        publish: bool,
    },
    RemoveBackground {
        image: Option<UploadedFile>,
    },
    RemoveObject {
        image: Option<UploadedFile>,
        object: Option<String>,
    },
    ReviewResume {
        resume: Option<UploadedFile>,
    },
}

impl OperationRequest {
    pub fn operation(&self) -> Operation {
        match self {
            OperationRequest::Article { .. } => Operation::GenerateArticle,
            OperationRequest::BlogTitle { .. } => Operation::GenerateBlogTitle,
            OperationRequest::Image { .. } => Operation::GenerateImage,
            OperationRequest::RemoveBackground { .. } => Operation::RemoveBackground,
            OperationRequest::RemoveObject { .. } => Operation::RemoveObject,
            OperationRequest::ReviewResume { .. } => Operation::ReviewResume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugs_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_slug(op.slug()), Some(op));
        }
        assert_eq!(Operation::from_slug("generate-video"), None);
    }

    #[test]
    fn test_only_text_operations_are_free_tier() {
        let free: Vec<_> = Operation::ALL
            .into_iter()
            .filter(|op| op.policy() == AccessPolicy::FreeTierWithQuota)
            .collect();
        assert_eq!(free, vec![Operation::GenerateArticle, Operation::GenerateBlogTitle]);
    }

    #[test]
    fn test_upload_fields() {
        assert_eq!(Operation::RemoveObject.upload_field(), Some("image"));
        assert_eq!(Operation::ReviewResume.upload_field(), Some("resume"));
        assert_eq!(Operation::GenerateImage.upload_field(), None);
    }
}
