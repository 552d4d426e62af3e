//! MongoDB-backed creation ledger
//!
//! Like toggles run as one `findOneAndUpdate` with an aggregation-pipeline
//! update, so the membership test and the write happen server-side on a
//! single document.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use tracing::warn;

use super::{creation_not_found, require_liker, Creation, CreationLedger, CreationType, LikeAggregate, NewCreation};
use crate::db::schemas::{CreationDoc, Metadata, CREATION_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{AiverseError, Result};

/// Creation ledger stored in the `creations` collection
pub struct MongoLedger {
    collection: MongoCollection<CreationDoc>,
}

impl MongoLedger {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo.collection::<CreationDoc>(CREATION_COLLECTION).await?;
        Ok(Self { collection })
    }

    async fn list(&self, filter: Document) -> Result<Vec<Creation>> {
        let docs = self
            .collection
            .find_sorted(filter, doc! { "metadata.created_at": -1, "_id": -1 })
            .await?;

        Ok(docs.into_iter().filter_map(|d| doc_to_creation(d).ok()).collect())
    }
}

#[async_trait]
impl CreationLedger for MongoLedger {
    async fn append(&self, creation: NewCreation) -> Result<Creation> {
        creation.validate()?;

        let doc = CreationDoc {
            _id: None,
            metadata: Metadata::new(),
            user_id: creation.user_id,
            prompt: creation.prompt,
            content: creation.content,
            creation_type: creation.creation_type.as_str().to_string(),
            publish: creation.publish,
            likes: Vec::new(),
        };

        let mut inserted = doc.clone();
        inserted._id = Some(self.collection.insert_one(doc).await?);

        doc_to_creation(inserted)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Creation>> {
        self.list(doc! { "user_id": user_id }).await
    }

    async fn list_published(&self) -> Result<Vec<Creation>> {
        self.list(doc! { "publish": true }).await
    }
}

#[async_trait]
impl LikeAggregate for MongoLedger {
    async fn toggle_like(&self, creation_id: &str, user_id: &str) -> Result<usize> {
        require_liker(user_id)?;
        let id = ObjectId::parse_str(creation_id).map_err(|_| creation_not_found())?;

        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": id }, toggle_pipeline(user_id))
            .await?
            .ok_or_else(creation_not_found)?;

        Ok(updated.likes.len())
    }
}

/// Pipeline update: remove `user_id` from `likes` if present, else append it.
/// The id is wrapped in `$literal` so a leading `$` is never read as a path.
fn toggle_pipeline(user_id: &str) -> Vec<Document> {
    let user = doc! { "$literal": user_id };
    let likes = doc! { "$ifNull": ["$likes", []] };
    vec![doc! {
        "$set": {
            "likes": {
                "$cond": {
                    "if": { "$in": [user.clone(), likes.clone()] },
                    "then": {
                        "$filter": {
                            "input": likes.clone(),
                            "cond": { "$ne": ["$$this", user.clone()] },
                        }
                    },
                    "else": { "$concatArrays": [likes, [user]] },
                }
            },
            "metadata.updated_at": "$$NOW",
        }
    }]
}

fn doc_to_creation(doc: CreationDoc) -> Result<Creation> {
    let id = doc
        ._id
        .ok_or_else(|| AiverseError::Database("Creation document has no _id".into()))?;

    let creation_type = CreationType::from_label(&doc.creation_type).ok_or_else(|| {
        warn!(id = %id, "Skipping creation with unknown type '{}'", doc.creation_type);
        AiverseError::Database(format!("Unknown creation type: {}", doc.creation_type))
    })?;

    let created_at = doc
        .metadata
        .created_at
        .unwrap_or_else(|| id.timestamp())
        .to_chrono();

    Ok(Creation {
        id: id.to_hex(),
        user_id: doc.user_id,
        prompt: doc.prompt,
        content: doc.content,
        creation_type,
        publish: doc.publish,
        likes: doc.likes,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_pipeline_shape() {
        let pipeline = toggle_pipeline("u1");
        assert_eq!(pipeline.len(), 1);

        let set = pipeline[0].get_document("$set").unwrap();
        let cond = set
            .get_document("likes")
            .unwrap()
            .get_document("$cond")
            .unwrap();
        assert!(cond.contains_key("if"));
        assert!(cond.get_document("then").unwrap().contains_key("$filter"));
        assert!(cond.get_document("else").unwrap().contains_key("$concatArrays"));
    }

    #[test]
    fn test_toggle_pipeline_wraps_user_id_in_literal() {
        let pipeline = toggle_pipeline("$likes");
        let cond = pipeline[0]
            .get_document("$set")
            .unwrap()
            .get_document("likes")
            .unwrap()
            .get_document("$cond")
            .unwrap();
        let literal = doc! { "$literal": "$likes" };

        let member = cond.get_document("if").unwrap().get_array("$in").unwrap();
        assert_eq!(member[0].as_document(), Some(&literal));

        let ne = cond
            .get_document("then")
            .unwrap()
            .get_document("$filter")
            .unwrap()
            .get_document("cond")
            .unwrap()
            .get_array("$ne")
            .unwrap();
        assert_eq!(ne[1].as_document(), Some(&literal));

        let concat = cond
            .get_document("else")
            .unwrap()
            .get_array("$concatArrays")
            .unwrap();
        let appended = concat[1].as_array().unwrap();
        assert_eq!(appended[0].as_document(), Some(&literal));
    }

    #[test]
    fn test_doc_to_creation_falls_back_to_id_timestamp() {
        let id = ObjectId::new();
        let doc = CreationDoc {
            _id: Some(id),
            metadata: Metadata::default(),
            user_id: "u1".into(),
            prompt: "p".into(),
            content: "c".into(),
            creation_type: "image".into(),
            publish: true,
            likes: vec![],
        };

        let creation = doc_to_creation(doc).unwrap();
        assert_eq!(creation.id, id.to_hex());
        assert_eq!(creation.creation_type, CreationType::Image);
        assert_eq!(creation.created_at.timestamp(), id.timestamp().timestamp_millis() / 1000);
    }

    #[test]
    fn test_doc_with_unknown_type_is_rejected() {
        let doc = CreationDoc {
            _id: Some(ObjectId::new()),
            creation_type: "video".into(),
            ..Default::default()
        };
        assert!(doc_to_creation(doc).is_err());
    }
}
