//! Like aggregate and ledger ordering tests
//!
//! Covers:
//! - Toggle oscillation for a single user
//! - Concurrent toggles from many users without lost updates
//! - Published feed filtering and newest-first order

use std::collections::HashSet;
use std::sync::Arc;

use aiverse::ledger::{CreationLedger, CreationType, LikeAggregate, MemoryLedger, NewCreation};

fn creation(user: &str, prompt: &str, publish: bool) -> NewCreation {
    NewCreation {
        user_id: user.into(),
        prompt: prompt.into(),
        content: format!("content for {}", prompt),
        creation_type: CreationType::Image,
        publish,
    }
}

// =============================================================================
// Toggle semantics
// =============================================================================

#[tokio::test]
async fn test_toggle_oscillates() {
    let ledger = MemoryLedger::new();
    let c = ledger.append(creation("owner", "sunset", true)).await.unwrap();

    let counts = [
        ledger.toggle_like(&c.id, "fan").await.unwrap(),
        ledger.toggle_like(&c.id, "fan").await.unwrap(),
        ledger.toggle_like(&c.id, "fan").await.unwrap(),
    ];
    assert_eq!(counts, [1, 0, 1]);

    let feed = ledger.list_published().await.unwrap();
    assert_eq!(feed[0].likes, vec!["fan".to_string()]);
}

#[tokio::test]
async fn test_likes_never_duplicate() {
    let ledger = MemoryLedger::new();
    let c = ledger.append(creation("owner", "forest", true)).await.unwrap();

    ledger.toggle_like(&c.id, "a").await.unwrap();
    ledger.toggle_like(&c.id, "b").await.unwrap();
    ledger.toggle_like(&c.id, "a").await.unwrap();
    ledger.toggle_like(&c.id, "a").await.unwrap();

    let likes = &ledger.list_published().await.unwrap()[0].likes;
    let unique: HashSet<_> = likes.iter().collect();
    assert_eq!(likes.len(), unique.len());
    assert_eq!(unique.len(), 2);
}

#[tokio::test]
async fn test_owner_can_like_own_creation() {
    let ledger = MemoryLedger::new();
    let c = ledger.append(creation("owner", "river", false)).await.unwrap();
    assert_eq!(ledger.toggle_like(&c.id, "owner").await.unwrap(), 1);
}

// =============================================================================
// Concurrent like safety
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_toggles_from_distinct_users() {
    let ledger = Arc::new(MemoryLedger::new());
    let c = ledger.append(creation("owner", "city", true)).await.unwrap();

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let id = c.id.clone();
            tokio::spawn(async move { ledger.toggle_like(&id, &format!("user-{}", i)).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let likes = &ledger.list_published().await.unwrap()[0].likes;
    assert_eq!(likes.len(), 64);
    let unique: HashSet<_> = likes.iter().collect();
    assert_eq!(unique.len(), 64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_even_toggles_cancel_out() {
    let ledger = Arc::new(MemoryLedger::new());
    let c = ledger.append(creation("owner", "harbor", true)).await.unwrap();

    // Each user toggles twice; the final set must be empty
    let handles: Vec<_> = (0..32)
        .flat_map(|i| [i, i])
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let id = c.id.clone();
            tokio::spawn(async move { ledger.toggle_like(&id, &format!("user-{}", i)).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(ledger.list_published().await.unwrap()[0].likes.is_empty());
}

#[tokio::test]
async fn test_unknown_creation_is_not_found() {
    let ledger = MemoryLedger::new();
    let err = ledger
        .toggle_like("65f0c0ffee65f0c0ffee65f0", "fan")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.to_string(), "Creation not found");
}

// =============================================================================
// Published feed filter & order
// =============================================================================

#[tokio::test]
async fn test_published_feed_filters_and_orders() {
    let ledger = MemoryLedger::new();
    let a = ledger.append(creation("u1", "a", true)).await.unwrap();
    let _hidden = ledger.append(creation("u2", "b", false)).await.unwrap();
    let c = ledger.append(creation("u3", "c", true)).await.unwrap();
    let d = ledger.append(creation("u1", "d", true)).await.unwrap();

    let feed = ledger.list_published().await.unwrap();
    let ids: Vec<_> = feed.iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids, vec![d.id, c.id, a.id]);
    assert!(feed.iter().all(|c| c.publish));
    assert!(feed.iter().all(|c| c.likes.is_empty()));

    for pair in feed.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
}

#[tokio::test]
async fn test_user_list_includes_unpublished() {
    let ledger = MemoryLedger::new();
    ledger.append(creation("u1", "public", true)).await.unwrap();
    ledger.append(creation("u1", "private", false)).await.unwrap();
    ledger.append(creation("u2", "other", true)).await.unwrap();

    let mine = ledger.list_by_user("u1").await.unwrap();
    let prompts: Vec<_> = mine.iter().map(|c| c.prompt.as_str()).collect();
    assert_eq!(prompts, vec!["private", "public"]);
}
