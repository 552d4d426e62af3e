//! Creation ledger and like aggregate
//!
//! Every successful metered operation appends one immutable creation. After
//! the insert only the like set changes, and only through
//! [`LikeAggregate::toggle_like`], which both backends implement as a single
//! atomic read-modify-write so concurrent toggles never lose an update.

pub mod memory;
pub mod mongo;

pub use memory::MemoryLedger;
pub use mongo::MongoLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{AiverseError, Result};

/// Kind of content a creation holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreationType {
    #[serde(rename = "article")]
    Article,
    #[serde(rename = "blog-title")]
    BlogTitle,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "resume-review")]
    ResumeReview,
}

impl CreationType {
    pub fn as_str(self) -> &'static str {
        match self {
            CreationType::Article => "article",
            CreationType::BlogTitle => "blog-title",
            CreationType::Image => "image",
            CreationType::ResumeReview => "resume-review",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "article" => Some(CreationType::Article),
            "blog-title" => Some(CreationType::BlogTitle),
            "image" => Some(CreationType::Image),
            "resume-review" => Some(CreationType::ResumeReview),
            _ => None,
        }
    }
}

impl fmt::Display for CreationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A creation about to be appended
#[derive(Debug, Clone)]
pub struct NewCreation {
    pub user_id: String,
    pub prompt: String,
    pub content: String,
    pub creation_type: CreationType,
    pub publish: bool,
}

impl NewCreation {
    /// Content must be non-empty; the ledger never records a failed call
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(AiverseError::Internal(
                "Refusing to record a creation without an owner".into(),
            ));
        }
        if self.content.trim().is_empty() {
            return Err(AiverseError::Internal(
                "Refusing to record a creation without content".into(),
            ));
        }
        Ok(())
    }
}

/// A recorded creation as served to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creation {
    pub id: String,
    pub user_id: String,
    pub prompt: String,
    pub content: String,
    #[serde(rename = "type")]
    pub creation_type: CreationType,
    pub publish: bool,
    pub likes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Creation {
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }
}

/// Append-only store of creations
#[async_trait]
pub trait CreationLedger: Send + Sync {
    /// Record a creation; created_at is assigned by the store
    async fn append(&self, creation: NewCreation) -> Result<Creation>;

    /// All of a user's creations, newest first
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Creation>>;

    /// All published creations from every user, newest first
    async fn list_published(&self) -> Result<Vec<Creation>>;
}

/// Per-creation like sets
#[async_trait]
pub trait LikeAggregate: Send + Sync {
    /// Add `user_id` to the creation's like set if absent, otherwise remove
    /// it. Returns the like count after the toggle. Unknown ids are
    /// `NotFound`; a blank `user_id` is `Unauthenticated`.
    async fn toggle_like(&self, creation_id: &str, user_id: &str) -> Result<usize>;
}

pub(crate) fn creation_not_found() -> AiverseError {
    AiverseError::NotFound("Creation not found".into())
}

/// A like needs an authenticated user behind it
pub(crate) fn require_liker(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(AiverseError::Unauthenticated(
            "Unauthorized - user not authenticated".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_type_labels() {
        for ty in [
            CreationType::Article,
            CreationType::BlogTitle,
            CreationType::Image,
            CreationType::ResumeReview,
        ] {
            assert_eq!(CreationType::from_label(ty.as_str()), Some(ty));
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
        }
        assert_eq!(CreationType::from_label("video"), None);
    }

    #[test]
    fn test_empty_content_is_refused() {
        let creation = NewCreation {
            user_id: "u1".into(),
            prompt: "p".into(),
            content: "   ".into(),
            creation_type: CreationType::Article,
            publish: false,
        };
        assert!(creation.validate().is_err());
    }

    #[test]
    fn test_creation_serializes_type_field() {
        let creation = Creation {
            id: "abc".into(),
            user_id: "u1".into(),
            prompt: "p".into(),
            content: "c".into(),
            creation_type: CreationType::BlogTitle,
            publish: true,
            likes: vec!["u2".into()],
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&creation).unwrap();
        assert_eq!(json["type"], "blog-title");
        assert_eq!(json["likes"][0], "u2");
    }

    #[test]
    fn test_require_liker_rejects_blank_user() {
        assert_eq!(require_liker("").unwrap_err().status_code(), 401);
        assert_eq!(require_liker("  ").unwrap_err().status_code(), 401);
        assert!(require_liker("user_2abc").is_ok());
    }
}
