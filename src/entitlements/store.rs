//! Entitlement storage backends
//!
//! `MongoEntitlementStore` keeps records in the `entitlements` collection and
//! relies on single-document atomic updates. `MemoryEntitlementStore` backs
//! dev mode and tests; each record lives in one DashMap shard so mutations
//! on the same user are serialized.

use async_trait::async_trait;
use bson::{doc, DateTime};
use dashmap::DashMap;
use std::sync::Arc;

use super::EntitlementRecord;
use crate::auth::Plan;
use crate::db::schemas::{EntitlementDoc, ENTITLEMENT_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::Result;

/// Trait for entitlement persistence - allows swapping implementations
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Current record; users with no record get the first-sign-in default
    async fn get(&self, user_id: &str) -> Result<EntitlementRecord>;

    /// Set a premium user's free-usage counter to zero.
    ///
    /// Conditional on the stored plan still being premium and the counter
    /// being non-zero. Returns whether a write happened.
    async fn reset_free_usage(&self, user_id: &str) -> Result<bool>;

    /// Atomically add one to the user's free-usage counter
    async fn increment_free_usage(&self, user_id: &str) -> Result<()>;
}

// =============================================================================
// MongoDB Implementation
// =============================================================================

/// MongoDB-backed entitlement store
pub struct MongoEntitlementStore {
    collection: MongoCollection<EntitlementDoc>,
}

impl MongoEntitlementStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo
            .collection::<EntitlementDoc>(ENTITLEMENT_COLLECTION)
            .await?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl EntitlementStore for MongoEntitlementStore {
    async fn get(&self, user_id: &str) -> Result<EntitlementRecord> {
        let doc = self.collection.find_one(doc! { "user_id": user_id }).await?;

        Ok(match doc {
            Some(doc) => EntitlementRecord {
                user_id: doc.user_id,
                plan: Plan::from_label(&doc.plan),
                free_usage: doc.free_usage.clamp(0, u32::MAX as i64) as u32,
            },
            None => EntitlementRecord::first_sign_in(user_id),
        })
    }

    async fn reset_free_usage(&self, user_id: &str) -> Result<bool> {
        let result = self
            .collection
            .update_one(
                doc! {
                    "user_id": user_id,
                    "plan": Plan::Premium.as_str(),
                    "free_usage": { "$ne": 0 },
                },
                doc! {
                    "$set": {
                        "free_usage": 0_i64,
                        "metadata.updated_at": DateTime::now(),
                    }
                },
            )
            .await?;

        Ok(result.modified_count > 0)
    }

    async fn increment_free_usage(&self, user_id: &str) -> Result<()> {
        let now = DateTime::now();
        self.collection
            .upsert_one(
                doc! { "user_id": user_id },
                doc! {
                    "$inc": { "free_usage": 1_i64 },
                    "$set": { "metadata.updated_at": now },
                    "$setOnInsert": {
                        "plan": Plan::Free.as_str(),
                        "metadata.created_at": now,
                    },
                },
            )
            .await?;

        Ok(())
    }
}

// =============================================================================
// In-memory Implementation
// =============================================================================

/// In-memory entitlement store for dev mode and tests
#[derive(Clone, Default)]
pub struct MemoryEntitlementStore {
    records: Arc<DashMap<String, EntitlementRecord>>,
}

impl MemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a user's record, as the identity provider would
    pub fn insert(&self, record: EntitlementRecord) {
        self.records.insert(record.user_id.clone(), record);
    }

    /// Change a user's plan, keeping their counter
    pub fn set_plan(&self, user_id: &str, plan: Plan) {
        self.records
            .entry(user_id.to_string())
            .or_insert_with(|| EntitlementRecord::first_sign_in(user_id))
            .plan = plan;
    }
}

#[async_trait]
impl EntitlementStore for MemoryEntitlementStore {
    async fn get(&self, user_id: &str) -> Result<EntitlementRecord> {
        Ok(self
            .records
            .get(user_id)
            .map(|r| r.value().clone())
            .unwrap_or_else(|| EntitlementRecord::first_sign_in(user_id)))
    }

    async fn reset_free_usage(&self, user_id: &str) -> Result<bool> {
        match self.records.get_mut(user_id) {
            Some(mut record) if record.needs_reset() => {
                record.free_usage = 0;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_free_usage(&self, user_id: &str) -> Result<()> {
        let mut record = self
            .records
            .entry(user_id.to_string())
            .or_insert_with(|| EntitlementRecord::first_sign_in(user_id));
        record.free_usage = record.free_usage.saturating_add(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_user_gets_default_record() {
        let store = MemoryEntitlementStore::new();
        let record = store.get("new-user").await.unwrap();
        assert_eq!(record, EntitlementRecord::first_sign_in("new-user"));
    }

    #[tokio::test]
    async fn test_reset_only_applies_to_premium() {
        let store = MemoryEntitlementStore::new();
        store.insert(EntitlementRecord {
            user_id: "free".into(),
            plan: Plan::Free,
            free_usage: 3,
        });
        store.insert(EntitlementRecord {
            user_id: "paid".into(),
            plan: Plan::Premium,
            free_usage: 9,
        });

        assert!(!store.reset_free_usage("free").await.unwrap());
        assert_eq!(store.get("free").await.unwrap().free_usage, 3);

        assert!(store.reset_free_usage("paid").await.unwrap());
        assert_eq!(store.get("paid").await.unwrap().free_usage, 0);

        // Second reset is a no-op
        assert!(!store.reset_free_usage("paid").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = MemoryEntitlementStore::new();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment_free_usage("u1").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.get("u1").await.unwrap().free_usage, 32);
    }

    #[tokio::test]
    async fn test_set_plan_keeps_counter() {
        let store = MemoryEntitlementStore::new();
        store.increment_free_usage("u1").await.unwrap();
        store.set_plan("u1", Plan::Premium);

        let record = store.get("u1").await.unwrap();
        assert_eq!(record.plan, Plan::Premium);
        assert_eq!(record.free_usage, 1);
    }
}
