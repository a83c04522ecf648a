//! # Social Graph Reader
//!
//! Read-side views derived from stored friendship edges.

use std::collections::HashSet;
use std::sync::Arc;

use domains::{
    AppError, Friendship, FriendshipStatus, FriendshipView, Result, Store, UnitOfWork, User,
    UserSummary,
};
use uuid::Uuid;

use crate::directory::{find_user, summaries};

pub struct SocialGraph {
    store: Arc<dyn Store>,
}

async fn require_user(uow: &mut dyn UnitOfWork, identifier: &str) -> Result<User> {
    find_user(uow, identifier)
        .await?
        .ok_or_else(|| AppError::not_found("user", identifier))
}

/// Maps each edge to the party opposite `user_id`, keeping edge order.
async fn counterparts(uow: &mut dyn UnitOfWork, user_id: Uuid, edges: &[Friendship]) -> Result<Vec<UserSummary>> {
    let ids: Vec<Uuid> = edges.iter().filter_map(|edge| edge.other_party(user_id)).collect();
    let mut by_id = summaries(uow, &ids).await?;
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

impl SocialGraph {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Pending requests addressed to `user`, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn friend_requests_for(&self, user: &str) -> Result<Vec<FriendshipView>> {
        let mut uow = self.store.begin().await?;
        let addressee = require_user(uow.as_mut(), user).await?;
        let edges = uow.incoming_friendships(addressee.id, FriendshipStatus::Pending).await?;
        self.views(uow.as_mut(), &addressee, edges).await
    }

    /// Pending requests `user` has sent and nobody has answered yet.
    #[tracing::instrument(skip(self))]
    pub async fn sent_requests_by(&self, user: &str) -> Result<Vec<FriendshipView>> {
        let mut uow = self.store.begin().await?;
        let requester = require_user(uow.as_mut(), user).await?;
        let edges = uow.outgoing_friendships(requester.id, FriendshipStatus::Pending).await?;
        self.views(uow.as_mut(), &requester, edges).await
    }

    /// Everyone holding an Accepted edge with `user`, whichever side asked.
    #[tracing::instrument(skip(self))]
    pub async fn friends_of(&self, user: &str) -> Result<Vec<UserSummary>> {
        let mut uow = self.store.begin().await?;
        let me = require_user(uow.as_mut(), user).await?;
        let edges = uow.friendships_involving(me.id, FriendshipStatus::Accepted).await?;
        counterparts(uow.as_mut(), me.id, &edges).await
    }

    /// Users that `user` has blocked.
    #[tracing::instrument(skip(self))]
    pub async fn blocked_by(&self, user: &str) -> Result<Vec<UserSummary>> {
        let mut uow = self.store.begin().await?;
        let me = require_user(uow.as_mut(), user).await?;
        let edges = uow.outgoing_friendships(me.id, FriendshipStatus::Blocked).await?;
        counterparts(uow.as_mut(), me.id, &edges).await
    }

    /// Friends shared by both users, ordered by username.
    #[tracing::instrument(skip(self))]
    pub async fn mutual_friends(&self, user: &str, other: &str) -> Result<Vec<UserSummary>> {
        let mut uow = self.store.begin().await?;
        let a = require_user(uow.as_mut(), user).await?;
        let b = require_user(uow.as_mut(), other).await?;

        let of_b: HashSet<Uuid> = uow
            .friendships_involving(b.id, FriendshipStatus::Accepted)
            .await?
            .iter()
            .filter_map(|edge| edge.other_party(b.id))
            .collect();
        let shared: Vec<Friendship> = uow
            .friendships_involving(a.id, FriendshipStatus::Accepted)
            .await?
            .into_iter()
            .filter(|edge| edge.other_party(a.id).is_some_and(|id| of_b.contains(&id)))
            .collect();

        let mut mutual = counterparts(uow.as_mut(), a.id, &shared).await?;
        mutual.sort_by(|x, y| x.user_name.to_lowercase().cmp(&y.user_name.to_lowercase()));
        Ok(mutual)
    }

    // `anchor` is the user the edges were fetched for, so it is already loaded.
    async fn views(&self, uow: &mut dyn UnitOfWork, anchor: &User, edges: Vec<Friendship>) -> Result<Vec<FriendshipView>> {
        let others: Vec<Uuid> = edges.iter().filter_map(|e| e.other_party(anchor.id)).collect();
        let names = summaries(uow, &others).await?;
        let name_of = |id: Uuid| -> String {
            if id == anchor.id {
                anchor.username.clone()
            } else {
                names.get(&id).map(|s| s.user_name.clone()).unwrap_or_default()
            }
        };

        Ok(edges
            .iter()
            .map(|edge| FriendshipView {
                requester_id: edge.requester_id,
                requester_name: name_of(edge.requester_id),
                addressee_id: edge.addressee_id,
                addressee_name: name_of(edge.addressee_id),
                status: edge.status,
                created_at: edge.created_at,
                updated_at: edge.updated_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixed_clock, seed_user, store};
    use crate::RelationshipService;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn requests_are_listed_newest_first() {
        let store = store();
        seed_user(&store, "carol").await;
        seed_user(&store, "alice").await;
        seed_user(&store, "bob").await;

        let t0 = Utc::now();
        RelationshipService::new(store.clone(), fixed_clock(t0))
            .send_request("alice", "carol")
            .await
            .unwrap();
        RelationshipService::new(store.clone(), fixed_clock(t0 + Duration::minutes(1)))
            .send_request("bob", "carol")
            .await
            .unwrap();

        let requests = SocialGraph::new(store).friend_requests_for("carol").await.unwrap();
        let from: Vec<_> = requests.iter().map(|r| r.requester_name.as_str()).collect();
        assert_eq!(from, ["bob", "alice"]);
        assert!(requests.iter().all(|r| r.addressee_name == "carol"));
    }

    #[tokio::test]
    async fn mutual_friends_intersects_both_sides() {
        let store = store();
        for name in ["alice", "bob", "carol", "dave", "erin"] {
            seed_user(&store, name).await;
        }
        let rel = RelationshipService::new(store.clone(), fixed_clock(Utc::now()));
        // alice: carol, dave, erin  /  bob: dave, carol
        for (a, b) in [("alice", "carol"), ("dave", "alice"), ("alice", "erin"), ("bob", "dave"), ("carol", "bob")] {
            rel.send_request(a, b).await.unwrap();
            rel.accept(a, b).await.unwrap();
        }

        let graph = SocialGraph::new(store);
        let names: Vec<_> = graph
            .mutual_friends("alice", "bob")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.user_name)
            .collect();
        assert_eq!(names, ["carol", "dave"]);
    }

    #[tokio::test]
    async fn blocked_by_lists_only_own_blocks() {
        let store = store();
        for name in ["alice", "bob", "carol"] {
            seed_user(&store, name).await;
        }
        let rel = RelationshipService::new(store.clone(), fixed_clock(Utc::now()));
        rel.block("alice", "bob").await.unwrap();
        rel.block("carol", "alice").await.unwrap();

        let graph = SocialGraph::new(store);
        let blocked: Vec<_> = graph.blocked_by("alice").await.unwrap().into_iter().map(|s| s.user_name).collect();
        assert_eq!(blocked, ["bob"]);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let graph = SocialGraph::new(store());
        assert!(matches!(graph.friends_of("ghost").await, Err(AppError::NotFound(..))));
    }
}
