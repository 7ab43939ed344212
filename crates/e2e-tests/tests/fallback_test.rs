//! Dual-engine write routing E2E tests.
//!
//! Writes go to both engines; when the primary fails the fallback absorbs
//! the write. Reads stay on the primary.

use pretty_assertions::assert_eq;

use e2e_tests::TestHarness;
use scribe_indexing::SearchEngine;
use scribe_types::{EntityType, Post, SearchCriteria};

#[tokio::test]
async fn test_write_twice_when_both_healthy() {
    let harness = TestHarness::new();
    harness.put(Post::new(11, "Pinning explained", "Why futures move"));

    assert!(harness.service.index_entity(EntityType::Post, 11).await);

    let primary = TestHarness::lookup(harness.primary.as_ref(), EntityType::Post, 11)
        .await
        .expect("primary holds the post");
    let fallback = TestHarness::lookup(harness.fallback.as_ref(), EntityType::Post, 11)
        .await
        .expect("fallback holds the post");

    assert_eq!(primary.title, fallback.title);
    assert_eq!(primary.content, fallback.content);
    assert_eq!(primary.title, "Pinning explained");
}

#[tokio::test]
async fn test_fallback_absorbs_primary_failure() {
    let (harness, primary) = TestHarness::with_mock_primary();
    primary.set_fail_writes(true);
    harness.put(Post::new(3, "Still saved", "Fallback keeps it"));

    assert!(harness.service.index_entity(EntityType::Post, 3).await);

    assert!(primary.is_empty());
    // Two attempts per write under the harness retry policy
    assert_eq!(primary.write_attempts(), 2);
    let row = harness
        .storage
        .find_search_index(EntityType::Post, 3)
        .unwrap()
        .expect("fallback row written");
    assert_eq!(row.title, "Still saved");
}

#[tokio::test]
async fn test_reads_fail_closed_when_primary_down() {
    let (harness, primary) = TestHarness::with_mock_primary();
    harness.put(Post::new(1, "Findable", "body"));
    harness.service.index_entity(EntityType::Post, 1).await;

    primary.set_fail_reads(true);
    let results = harness.service.search(&SearchCriteria::new("findable")).await;
    assert!(results.is_empty());
    assert_eq!(results.engine, "mock-primary");

    // The fallback still has it for direct queries
    let fallback = harness
        .fallback
        .search(&SearchCriteria::new("findable"))
        .await
        .unwrap();
    assert_eq!(fallback.total, 1);
}

#[tokio::test]
async fn test_primary_recovers_after_transient_failure() {
    let (harness, primary) = TestHarness::with_mock_primary();
    primary.fail_next_writes(1);
    harness.put(Post::new(9, "Retried", "body"));

    assert!(harness.service.index_entity(EntityType::Post, 9).await);
    assert!(primary.get(EntityType::Post, 9).is_some());
}

#[tokio::test]
async fn test_remove_entity_clears_both_engines() {
    let harness = TestHarness::new();
    harness.put(Post::new(5, "Short lived", "body"));
    harness.service.index_entity(EntityType::Post, 5).await;

    assert!(harness.service.remove_entity(EntityType::Post, 5).await);
    assert!(TestHarness::lookup(harness.primary.as_ref(), EntityType::Post, 5)
        .await
        .is_none());
    assert!(TestHarness::lookup(harness.fallback.as_ref(), EntityType::Post, 5)
        .await
        .is_none());
}
