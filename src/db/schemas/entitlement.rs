//! Entitlement document schema
//!
//! Mirrors the plan and free-usage counter the identity provider keeps for
//! each user.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for entitlements
pub const ENTITLEMENT_COLLECTION: &str = "entitlements";

/// Entitlement document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct EntitlementDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Identity provider user id
    pub user_id: String,

    /// Plan label ("free" or "premium")
    #[serde(default = "default_plan")]
    pub plan: String,

    /// Successful free-tier calls so far
    #[serde(default)]
    pub free_usage: i64,
}

fn default_plan() -> String {
    "free".to_string()
}

impl IntoIndexes for EntitlementDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "user_id": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("user_id_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for EntitlementDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
