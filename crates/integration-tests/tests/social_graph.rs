use domains::{AppError, FriendshipStatus};
use integration_tests::{names, World};

#[tokio::test]
async fn pending_lists_split_incoming_and_outgoing() -> anyhow::Result<()> {
    let world = World::new();
    world.users(["ann", "ben", "cat"]).await?;
    let rel = &world.services.relationships;
    let graph = &world.services.graph;

    rel.send_request("ann", "cat").await?;
    rel.send_request("ben", "cat").await?;

    let incoming = graph.friend_requests_for("cat").await?;
    assert_eq!(incoming.len(), 2);
    assert!(incoming.iter().all(|v| v.status == FriendshipStatus::Pending && v.addressee_name == "cat"));

    let sent = graph.sent_requests_by("ann").await?;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].addressee_name, "cat");
    assert!(graph.sent_requests_by("cat").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn friends_exclude_pending_declined_and_blocked_edges() -> anyhow::Result<()> {
    let world = World::new();
    world.users(["ann", "ben", "cat", "dan", "eve"]).await?;
    let rel = &world.services.relationships;

    rel.send_request("ann", "ben").await?;
    rel.accept("ann", "ben").await?;
    rel.send_request("cat", "ann").await?;
    rel.accept("cat", "ann").await?;
    rel.send_request("ann", "dan").await?;
    rel.send_request("eve", "ann").await?;
    rel.decline("eve", "ann").await?;

    let mut friends = names(&world.services.graph.friends_of("ann").await?);
    friends.sort();
    assert_eq!(friends, ["ben", "cat"]);

    rel.block("ann", "cat").await?;
    assert_eq!(names(&world.services.graph.friends_of("ann").await?), ["ben"]);
    assert_eq!(names(&world.services.graph.blocked_by("ann").await?), ["cat"]);
    assert!(world.services.graph.blocked_by("cat").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn mutual_friends_are_sorted_by_username() -> anyhow::Result<()> {
    let world = World::new();
    world.users(["ann", "ben", "zed", "kim", "lou"]).await?;
    let rel = &world.services.relationships;

    for (a, b) in [("ann", "zed"), ("ann", "kim"), ("ann", "lou"), ("zed", "ben"), ("ben", "kim")] {
        rel.send_request(a, b).await?;
        rel.accept(a, b).await?;
    }

    let mutual = world.services.graph.mutual_friends("ann", "ben").await?;
    assert_eq!(names(&mutual), ["kim", "zed"]);
    assert!(world.services.graph.mutual_friends("lou", "ben").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn graph_queries_accept_ids_and_reject_unknown_users() -> anyhow::Result<()> {
    let world = World::new();
    let [ann, _ben] = world.users(["ann", "ben"]).await?;
    world.services.relationships.send_request("ben", "ann").await?;

    let by_id = world.services.graph.friend_requests_for(&ann.id.to_string()).await?;
    assert_eq!(by_id.len(), 1);
    assert_eq!(by_id[0].requester_name, "ben");

    assert!(matches!(
        world.services.graph.friends_of("ghost").await,
        Err(AppError::NotFound(..))
    ));
    Ok(())
}
