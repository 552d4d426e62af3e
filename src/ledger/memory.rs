//! In-memory creation ledger for dev mode and tests
//!
//! Creations are keyed by ObjectId so ids look the same as with MongoDB. A
//! like toggle holds the DashMap shard lock for its creation while it reads
//! and rewrites the like set.

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{creation_not_found, require_liker, Creation, CreationLedger, LikeAggregate, NewCreation};
use crate::types::Result;

struct Entry {
    /// Insertion order, breaks created_at ties
    seq: u64,
    creation: Creation,
}

/// DashMap-backed ledger
#[derive(Clone, Default)]
pub struct MemoryLedger {
    creations: Arc<DashMap<ObjectId, Entry>>,
    next_seq: Arc<AtomicU64>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded creations
    pub fn len(&self) -> usize {
        self.creations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creations.is_empty()
    }

    fn collect_where(&self, keep: impl Fn(&Creation) -> bool) -> Vec<Creation> {
        let mut matched: Vec<(u64, Creation)> = self
            .creations
            .iter()
            .filter(|e| keep(&e.value().creation))
            .map(|e| (e.value().seq, e.value().creation.clone()))
            .collect();

        matched.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b_seq.cmp(a_seq))
        });

        matched.into_iter().map(|(_, c)| c).collect()
    }
}

#[async_trait]
impl CreationLedger for MemoryLedger {
    async fn append(&self, creation: NewCreation) -> Result<Creation> {
        creation.validate()?;

        let id = ObjectId::new();
        let recorded = Creation {
            id: id.to_hex(),
            user_id: creation.user_id,
            prompt: creation.prompt,
            content: creation.content,
            creation_type: creation.creation_type,
            publish: creation.publish,
            likes: Vec::new(),
            created_at: Utc::now(),
        };

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.creations.insert(
            id,
            Entry {
                seq,
                creation: recorded.clone(),
            },
        );

        Ok(recorded)
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Creation>> {
        Ok(self.collect_where(|c| c.user_id == user_id))
    }

    async fn list_published(&self) -> Result<Vec<Creation>> {
        Ok(self.collect_where(|c| c.publish))
    }
}

#[async_trait]
impl LikeAggregate for MemoryLedger {
    async fn toggle_like(&self, creation_id: &str, user_id: &str) -> Result<usize> {
        require_liker(user_id)?;
        let id = ObjectId::parse_str(creation_id).map_err(|_| creation_not_found())?;
        let mut entry = self.creations.get_mut(&id).ok_or_else(creation_not_found)?;

        let likes = &mut entry.creation.likes;
        if let Some(pos) = likes.iter().position(|u| u == user_id) {
            likes.remove(pos);
        } else {
            likes.push(user_id.to_string());
        }

        Ok(entry.creation.like_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::CreationType;

    fn new_creation(user: &str, publish: bool) -> NewCreation {
        NewCreation {
            user_id: user.into(),
            prompt: "prompt".into(),
            content: "content".into(),
            creation_type: CreationType::Image,
            publish,
        }
    }

    #[tokio::test]
    async fn test_lists_newest_first() {
        let ledger = MemoryLedger::new();
        let first = ledger.append(new_creation("u1", true)).await.unwrap();
        let second = ledger.append(new_creation("u1", false)).await.unwrap();
        let third = ledger.append(new_creation("u2", true)).await.unwrap();

        let mine: Vec<_> = ledger
            .list_by_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(mine, vec![second.id, first.id.clone()]);

        let feed: Vec<_> = ledger
            .list_published()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(feed, vec![third.id, first.id]);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_set() {
        let ledger = MemoryLedger::new();
        let c = ledger.append(new_creation("u1", true)).await.unwrap();

        assert_eq!(ledger.toggle_like(&c.id, "u2").await.unwrap(), 1);
        assert_eq!(ledger.toggle_like(&c.id, "u2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_toggle_unknown_id_is_not_found() {
        let ledger = MemoryLedger::new();
        let err = ledger
            .toggle_like(&ObjectId::new().to_hex(), "u1")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);

        let err = ledger.toggle_like("not-an-id", "u1").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_toggle_without_user_is_unauthenticated() {
        let ledger = MemoryLedger::new();
        let c = ledger.append(new_creation("u1", true)).await.unwrap();

        for user in ["", "   "] {
            let err = ledger.toggle_like(&c.id, user).await.unwrap_err();
            assert_eq!(err.status_code(), 401);
        }
        assert!(ledger.list_published().await.unwrap()[0].likes.is_empty());
    }
}
