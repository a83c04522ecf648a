//! Behaviour every `Store` adapter must share.
//!
//! Each check takes a [`World`] so the same assertions run against the
//! in-memory store and against PostgreSQL.

use std::sync::Arc;

use anyhow::ensure;
use chrono::Utc;
use domains::{AppError, Friendship, FriendshipStatus, Like, LikeTarget, SnippetSort, StoreError};
use uuid::Uuid;

use crate::World;

pub async fn uncommitted_work_is_discarded(world: &World) -> anyhow::Result<()> {
    let [ann, ben] = world.users(["ann", "ben"]).await?;

    {
        let mut uow = world.store.begin().await?;
        uow.insert_friendship(&Friendship::request(ann.id, ben.id, Utc::now())).await?;
    }

    ensure!(world.edges_between(&ann, &ben).await?.is_empty(), "dropped unit of work left an edge");
    Ok(())
}

pub async fn pair_uniqueness_is_enforced_by_the_store(world: &World) -> anyhow::Result<()> {
    let [ann, ben] = world.users(["ann", "ben"]).await?;

    let mut uow = world.store.begin().await?;
    uow.insert_friendship(&Friendship::request(ann.id, ben.id, Utc::now())).await?;
    uow.commit().await?;

    let mut uow = world.store.begin().await?;
    let err = uow
        .insert_friendship(&Friendship::request(ben.id, ann.id, Utc::now()))
        .await
        .err()
        .ok_or_else(|| anyhow::anyhow!("reversed edge was accepted"))?;
    ensure!(matches!(err, StoreError::UniqueViolation(_)), "unexpected store error: {err}");
    ensure!(matches!(AppError::from(err), AppError::Conflict(_)), "unique violation must surface as Conflict");
    Ok(())
}

pub async fn like_uniqueness_is_per_user_and_target(world: &World) -> anyhow::Result<()> {
    let [ann, ben] = world.users(["ann", "ben"]).await?;
    let snippet = world.snippet(&ann, "x.rs").await?;
    let page = world.page(&ann, "About").await?;
    let like = |user_id, target| Like { id: Uuid::now_v7(), user_id, target, created_at: Utc::now() };
    let on_snippet = LikeTarget::Snippet(snippet.id);

    let mut uow = world.store.begin().await?;
    uow.insert_like(&like(ann.id, on_snippet)).await?;
    uow.insert_like(&like(ben.id, on_snippet)).await?;
    uow.insert_like(&like(ann.id, LikeTarget::Page(page.id))).await?;
    uow.commit().await?;

    let mut uow = world.store.begin().await?;
    let duplicate = uow.insert_like(&like(ann.id, on_snippet)).await;
    ensure!(matches!(duplicate, Err(StoreError::UniqueViolation(_))), "duplicate like: {duplicate:?}");
    drop(uow);

    let mut uow = world.store.begin().await?;
    let snippet_likes = uow.count_likes(on_snippet).await?;
    let page_likes = uow.count_likes(LikeTarget::Page(page.id)).await?;
    ensure!((snippet_likes, page_likes) == (2, 1), "like counts: {snippet_likes} on snippet, {page_likes} on page");
    Ok(())
}

pub async fn usernames_match_case_insensitively(world: &World) -> anyhow::Result<()> {
    let [ann] = world.users(["Ann"]).await?;

    let mut uow = world.store.begin().await?;
    let found = uow.user_by_username("aNN").await?.map(|u| u.id);
    ensure!(found == Some(ann.id), "case-insensitive lookup found {found:?}");
    let prefix = uow.user_by_username("an").await?;
    ensure!(prefix.is_none(), "prefix must not match");
    Ok(())
}

/// Crossed requests for the same pair, raced `rounds` times: exactly one
/// wins and the loser sees `Conflict`.
pub async fn crossed_requests_leave_one_edge(world: Arc<World>, rounds: usize) -> anyhow::Result<()> {
    for round in 0..rounds {
        let (left, right) = (format!("left{round}"), format!("right{round}"));
        let a = world.user(&left).await?;
        let b = world.user(&right).await?;

        let forward = {
            let (world, from, to) = (world.clone(), left.clone(), right.clone());
            tokio::spawn(async move { world.services.relationships.send_request(&from, &to).await })
        };
        let backward = {
            let (world, from, to) = (world.clone(), right.clone(), left.clone());
            tokio::spawn(async move { world.services.relationships.send_request(&from, &to).await })
        };
        let results = [forward.await?, backward.await?];

        ensure!(results.iter().filter(|r| r.is_ok()).count() == 1, "round {round}: {results:?}");
        ensure!(results.iter().any(|r| matches!(r, Err(AppError::Conflict(_)))), "round {round}: {results:?}");
        ensure!(world.edges_between(&a, &b).await?.len() == 1, "round {round}: edge count");
    }
    Ok(())
}

/// Crossed blocks never fail; one Blocked edge survives.
pub async fn crossed_blocks_leave_one_blocked_edge(world: Arc<World>, rounds: usize) -> anyhow::Result<()> {
    for round in 0..rounds {
        let (left, right) = (format!("blocker{round}"), format!("blocked{round}"));
        let a = world.user(&left).await?;
        let b = world.user(&right).await?;

        let forward = {
            let (world, from, to) = (world.clone(), left.clone(), right.clone());
            tokio::spawn(async move { world.services.relationships.block(&from, &to).await })
        };
        let backward = {
            let (world, from, to) = (world.clone(), right.clone(), left.clone());
            tokio::spawn(async move { world.services.relationships.block(&from, &to).await })
        };
        let results = [forward.await?, backward.await?];

        ensure!(results.iter().all(|r| r.is_ok()), "round {round}: {results:?}");
        let edges = world.edges_between(&a, &b).await?;
        ensure!(edges.len() == 1, "round {round}: {} edges", edges.len());
        ensure!(edges[0].status == FriendshipStatus::Blocked, "round {round}: {:?}", edges[0].status);
    }
    Ok(())
}

/// Ordering, owner filter and page bookkeeping of the snippet feed.
pub async fn feed_orders_and_pages(world: &World) -> anyhow::Result<()> {
    let [ann, ben] = world.users(["ann", "ben"]).await?;
    let alpha = world.snippet(&ann, "Alpha").await?;
    let beta = world.snippet(&ben, "beta").await?;
    world.snippet(&ann, "Gamma").await?;
    let svc = &world.services.interactions;

    svc.toggle_like(ben.id, LikeTarget::Snippet(beta.id)).await?;
    svc.toggle_like(ann.id, LikeTarget::Snippet(beta.id)).await?;
    svc.toggle_like(ann.id, LikeTarget::Snippet(alpha.id)).await?;
    svc.add_comment(ben.id, alpha.id, "first").await?;

    let titles = |items: &[domains::SnippetSummary]| -> Vec<String> {
        items.iter().map(|s| s.snippet.title.clone()).collect()
    };

    let popular = svc.snippet_feed(None, SnippetSort::Popular, 1, 10).await?;
    ensure!(titles(&popular.items) == ["beta", "Alpha", "Gamma"], "popular: {:?}", titles(&popular.items));
    ensure!(popular.items[0].like_count == 2 && popular.items[1].comment_count == 1, "popular counters");

    let latest = svc.snippet_feed(None, SnippetSort::Latest, 1, 10).await?;
    ensure!(titles(&latest.items) == ["Gamma", "beta", "Alpha"], "latest: {:?}", titles(&latest.items));

    let first = svc.snippet_feed(None, SnippetSort::Title, 1, 2).await?;
    ensure!(titles(&first.items) == ["Alpha", "beta"], "title: {:?}", titles(&first.items));
    ensure!(first.total_count == 3 && first.total_pages == 2, "first page totals");
    ensure!(first.has_next_page && !first.has_previous_page, "first page flags");

    let second = svc.snippet_feed(None, SnippetSort::Title, 2, 2).await?;
    ensure!(titles(&second.items) == ["Gamma"], "second page: {:?}", titles(&second.items));
    ensure!(!second.has_next_page && second.has_previous_page, "last page flags");

    let owned = svc.snippet_feed(Some("ben"), SnippetSort::Latest, 1, 10).await?;
    ensure!(owned.total_count == 1 && owned.items[0].snippet.id == beta.id, "owner filter");
    Ok(())
}
