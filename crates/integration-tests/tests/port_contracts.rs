//! Store contracts checked against the in-memory store, plus failure
//! propagation through a mocked store.

use std::sync::Arc;

use domains::{AppError, MockStore, StoreError, SystemClock};
use integration_tests::{contracts, World};
use services::Services;

#[tokio::test]
async fn uncommitted_work_is_discarded() -> anyhow::Result<()> {
    contracts::uncommitted_work_is_discarded(&World::new()).await
}

#[tokio::test]
async fn pair_uniqueness_is_enforced_by_the_store() -> anyhow::Result<()> {
    contracts::pair_uniqueness_is_enforced_by_the_store(&World::new()).await
}

#[tokio::test]
async fn like_uniqueness_is_per_user_and_target() -> anyhow::Result<()> {
    contracts::like_uniqueness_is_per_user_and_target(&World::new()).await
}

#[tokio::test]
async fn usernames_match_case_insensitively() -> anyhow::Result<()> {
    contracts::usernames_match_case_insensitively(&World::new()).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn crossed_blocks_both_succeed() -> anyhow::Result<()> {
    contracts::crossed_blocks_leave_one_blocked_edge(Arc::new(World::new()), 10).await
}

#[tokio::test]
async fn feed_orders_and_pages() -> anyhow::Result<()> {
    contracts::feed_orders_and_pages(&World::new()).await
}

#[tokio::test]
async fn backend_failures_surface_as_internal() {
    let mut store = MockStore::new();
    store
        .expect_begin()
        .times(2)
        .returning(|| Err(StoreError::Backend(anyhow::anyhow!("connection reset"))));
    let services = Services::new(Arc::new(store), Arc::new(SystemClock));

    let err = services.relationships.send_request("ann", "ben").await.unwrap_err();
    assert_eq!(err.kind(), "internal");
    let err = services.graph.friends_of("ann").await.unwrap_err();
    assert!(matches!(err, AppError::Internal(msg) if msg.contains("connection reset")));
}
