//! Creation document schema
//!
//! One row per successful metered operation. Only `likes` ever changes after
//! the insert.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for creations
pub const CREATION_COLLECTION: &str = "creations";

/// Creation document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CreationDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Owner of the creation
    pub user_id: String,

    /// Prompt or description of the request
    pub prompt: String,

    /// Generated markdown or media URL
    pub content: String,

    /// Creation type label (article, blog-title, image, resume-review)
    #[serde(rename = "type")]
    pub creation_type: String,

    /// Visible in the public feed
    #[serde(default)]
    pub publish: bool,

    /// Users who liked this creation
    #[serde(default)]
    pub likes: Vec<String>,
}

impl IntoIndexes for CreationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Dashboard: a user's creations, newest first
            (
                doc! { "user_id": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_created_index".to_string())
                        .build(),
                ),
            ),
            // Community feed: published creations, newest first
            (
                doc! { "publish": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("publish_created_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for CreationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
