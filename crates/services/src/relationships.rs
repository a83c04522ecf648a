//! # Relationship Store
//!
//! Owns the friendship state machine:
//!
//! ```text
//!  (none)        --send_request(A,B)-->  Pending(A->B)
//!  Pending(A->B) --accept (by B)------>  Accepted
//!  Pending(A->B) --decline (by B)----->  Declined
//!  any | none    --block (by A or B)-->  Blocked(blocker->blocked)
//! ```
//!
//! At most one edge exists per unordered pair. Every operation runs in a
//! single unit of work; the store's pair index catches concurrent duplicates.

use std::future::Future;
use std::sync::Arc;

use domains::{
    AppError, Clock, Friendship, FriendshipStatus, FriendshipView, Result, Store, UnitOfWork, User,
};
use tracing::{info, warn};

use crate::directory::find_user;

pub struct RelationshipService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

pub(crate) fn view(edge: &Friendship, requester: &User, addressee: &User) -> FriendshipView {
    FriendshipView {
        requester_id: edge.requester_id,
        requester_name: requester.username.clone(),
        addressee_id: edge.addressee_id,
        addressee_name: addressee.username.clone(),
        status: edge.status,
        created_at: edge.created_at,
        updated_at: edge.updated_at,
    }
}

/// Resolves a party of a state-changing call. Unknown users are a caller
/// error here, not a missing resource.
async fn require_party(uow: &mut dyn UnitOfWork, identifier: &str, role: &str) -> Result<User> {
    find_user(uow, identifier)
        .await?
        .ok_or_else(|| AppError::invalid(format!("{role} {identifier:?} does not resolve to a user")))
}

const BLOCK_ATTEMPTS: u32 = 3;

/// Reruns `op` while it fails with `Conflict`, up to `attempts` times in total.
async fn retry_on_conflict<T, F, Fut>(attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(AppError::Conflict(reason)) if attempt < attempts => {
                warn!(attempt, %reason, "concurrent write on the same pair, retrying");
                attempt += 1;
            }
            outcome => return outcome,
        }
    }
}

fn request_not_found(requester: &str, addressee: &str) -> AppError {
    AppError::not_found("pending friend request", format!("{requester} -> {addressee}"))
}

impl RelationshipService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates a Pending edge from `requester` to `addressee`.
    #[tracing::instrument(skip(self))]
    pub async fn send_request(&self, requester: &str, addressee: &str) -> Result<FriendshipView> {
        let mut uow = self.store.begin().await?;
        let from = require_party(uow.as_mut(), requester, "requester").await?;
        let to = require_party(uow.as_mut(), addressee, "addressee").await?;

        if from.id == to.id {
            warn!(user_id = %from.id, "rejected self friend request");
            return Err(AppError::invalid("cannot send a friend request to yourself"));
        }

        if let Some(existing) = uow.friendship_between(from.id, to.id).await? {
            warn!(status = %existing.status, "friendship already exists for pair");
            return Err(AppError::Conflict(format!(
                "a {} relationship already exists between {} and {}",
                existing.status, from.username, to.username
            )));
        }

        let edge = Friendship::request(from.id, to.id, self.clock.now());
        uow.insert_friendship(&edge).await?;
        uow.commit().await?;

        info!(requester = %from.id, addressee = %to.id, "friend request sent");
        Ok(view(&edge, &from, &to))
    }

    /// The addressee accepts a Pending request. Direction matters: the
    /// edge must have been sent by `requester` to `addressee`.
    #[tracing::instrument(skip(self))]
    pub async fn accept(&self, requester: &str, addressee: &str) -> Result<FriendshipView> {
        self.respond(requester, addressee, FriendshipStatus::Accepted).await
    }

    /// Same lookup as [`accept`](Self::accept); leaves the edge Declined.
    #[tracing::instrument(skip(self))]
    pub async fn decline(&self, requester: &str, addressee: &str) -> Result<FriendshipView> {
        self.respond(requester, addressee, FriendshipStatus::Declined).await
    }

    async fn respond(&self, requester: &str, addressee: &str, to: FriendshipStatus) -> Result<FriendshipView> {
        let mut uow = self.store.begin().await?;
        let from_user = find_user(uow.as_mut(), requester).await?;
        let to_user = find_user(uow.as_mut(), addressee).await?;
        let (Some(from_user), Some(to_user)) = (from_user, to_user) else {
            return Err(request_not_found(requester, addressee));
        };

        let mut edge = match uow.friendship(from_user.id, to_user.id).await? {
            Some(edge) if edge.status == FriendshipStatus::Pending => edge,
            _ => return Err(request_not_found(requester, addressee)),
        };

        let now = self.clock.now();
        let transition = match to {
            FriendshipStatus::Accepted => edge.accept(now),
            _ => edge.decline(now),
        };
        transition.map_err(|e| AppError::not_found("pending friend request", e))?;

        uow.update_friendship(&edge).await?;
        uow.commit().await?;

        info!(requester = %edge.requester_id, addressee = %edge.addressee_id, status = %edge.status, "friend request answered");
        Ok(view(&edge, &from_user, &to_user))
    }

    /// Replaces whatever edge the pair has with `user -> blocked` Blocked.
    ///
    /// A concurrent write to the same pair can make the insert trip the pair
    /// index; the whole unit of work is then replayed, so the later block wins
    /// exactly as it would have run serially.
    #[tracing::instrument(skip(self))]
    pub async fn block(&self, user: &str, blocked: &str) -> Result<FriendshipView> {
        retry_on_conflict(BLOCK_ATTEMPTS, move || self.try_block(user, blocked)).await
    }

    async fn try_block(&self, user: &str, blocked: &str) -> Result<FriendshipView> {
        let mut uow = self.store.begin().await?;
        let blocker = require_party(uow.as_mut(), user, "user").await?;
        let target = require_party(uow.as_mut(), blocked, "blocked user").await?;

        if blocker.id == target.id {
            warn!(user_id = %blocker.id, "rejected self block");
            return Err(AppError::invalid("cannot block yourself"));
        }

        let removed = uow.delete_friendships_between(blocker.id, target.id).await?;
        let edge = Friendship::block(blocker.id, target.id, self.clock.now());
        uow.insert_friendship(&edge).await?;
        uow.commit().await?;

        info!(blocker = %blocker.id, blocked = %target.id, replaced = removed, "user blocked");
        Ok(view(&edge, &blocker, &target))
    }

    /// The single edge between the pair in either direction, if any.
    #[tracing::instrument(skip(self))]
    pub async fn status_between(&self, user: &str, other: &str) -> Result<Option<FriendshipView>> {
        let mut uow = self.store.begin().await?;
        let a = require_party(uow.as_mut(), user, "user").await?;
        let b = require_party(uow.as_mut(), other, "other user").await?;

        let Some(edge) = uow.friendship_between(a.id, b.id).await? else {
            return Ok(None);
        };
        let (requester, addressee) = if edge.requester_id == a.id { (&a, &b) } else { (&b, &a) };
        Ok(Some(view(&edge, requester, addressee)))
    }

    /// The requester withdraws their own Pending request.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_request(&self, requester: &str, addressee: &str) -> Result<()> {
        self.remove_edge(requester, addressee, FriendshipStatus::Pending, true).await
    }

    /// Either side ends an Accepted friendship.
    #[tracing::instrument(skip(self))]
    pub async fn unfriend(&self, user: &str, other: &str) -> Result<()> {
        self.remove_edge(user, other, FriendshipStatus::Accepted, false).await
    }

    /// Lifts a block. Only the user who placed it can.
    #[tracing::instrument(skip(self))]
    pub async fn unblock(&self, user: &str, blocked: &str) -> Result<()> {
        self.remove_edge(user, blocked, FriendshipStatus::Blocked, true).await
    }

    async fn remove_edge(&self, first: &str, second: &str, status: FriendshipStatus, directed: bool) -> Result<()> {
        let mut uow = self.store.begin().await?;
        let a = find_user(uow.as_mut(), first).await?;
        let b = find_user(uow.as_mut(), second).await?;
        let missing = || AppError::not_found(&format!("{status} relationship"), format!("{first} / {second}"));
        let (Some(a), Some(b)) = (a, b) else {
            return Err(missing());
        };

        let edge = if directed {
            uow.friendship(a.id, b.id).await?
        } else {
            uow.friendship_between(a.id, b.id).await?
        };
        match edge {
            Some(edge) if edge.status == status => {}
            _ => return Err(missing()),
        }

        uow.delete_friendships_between(a.id, b.id).await?;
        uow.commit().await?;
        info!(user = %a.id, other = %b.id, %status, "relationship removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixed_clock, seed_user, store};
    use chrono::{TimeZone, Utc};
    use domains::{MockStore, StoreError};

    #[tokio::test]
    async fn timestamps_come_from_the_clock() {
        let store = store();
        seed_user(&store, "alice").await;
        seed_user(&store, "bob").await;

        let sent_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let sent = RelationshipService::new(store.clone(), fixed_clock(sent_at))
            .send_request("alice", "bob")
            .await
            .unwrap();
        assert_eq!(sent.created_at, sent_at);
        assert_eq!(sent.updated_at, None);

        let answered_at = Utc.with_ymd_and_hms(2024, 3, 2, 18, 30, 0).unwrap();
        let accepted = RelationshipService::new(store, fixed_clock(answered_at))
            .accept("alice", "bob")
            .await
            .unwrap();
        assert_eq!(accepted.status, FriendshipStatus::Accepted);
        assert_eq!(accepted.created_at, sent_at);
        assert_eq!(accepted.updated_at, Some(answered_at));
    }

    #[tokio::test]
    async fn status_between_reports_original_direction() {
        let store = store();
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;
        let svc = RelationshipService::new(store, fixed_clock(Utc::now()));

        svc.send_request("alice", "bob").await.unwrap();
        let seen_by_bob = svc.status_between("bob", "alice").await.unwrap().unwrap();
        assert_eq!(seen_by_bob.requester_id, alice.id);
        assert_eq!(seen_by_bob.addressee_id, bob.id);
        assert_eq!(seen_by_bob.requester_name, "alice");
    }

    #[tokio::test]
    async fn cancel_is_requester_only() {
        let store = store();
        seed_user(&store, "alice").await;
        seed_user(&store, "bob").await;
        let svc = RelationshipService::new(store, fixed_clock(Utc::now()));

        svc.send_request("alice", "bob").await.unwrap();
        assert!(matches!(svc.cancel_request("bob", "alice").await, Err(AppError::NotFound(..))));
        svc.cancel_request("alice", "bob").await.unwrap();
        assert!(svc.status_between("alice", "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unblock_requires_the_blocker() {
        let store = store();
        seed_user(&store, "alice").await;
        seed_user(&store, "bob").await;
        let svc = RelationshipService::new(store, fixed_clock(Utc::now()));

        svc.block("alice", "bob").await.unwrap();
        assert!(matches!(svc.unblock("bob", "alice").await, Err(AppError::NotFound(..))));
        svc.unblock("alice", "bob").await.unwrap();
        svc.send_request("bob", "alice").await.unwrap();
    }

    #[tokio::test]
    async fn unfriend_works_from_either_side() {
        let store = store();
        seed_user(&store, "alice").await;
        seed_user(&store, "bob").await;
        let svc = RelationshipService::new(store, fixed_clock(Utc::now()));

        assert!(matches!(svc.unfriend("alice", "bob").await, Err(AppError::NotFound(..))));
        svc.send_request("alice", "bob").await.unwrap();
        assert!(matches!(svc.unfriend("bob", "alice").await, Err(AppError::NotFound(..))));
        svc.accept("alice", "bob").await.unwrap();
        svc.unfriend("bob", "alice").await.unwrap();
        assert!(svc.status_between("alice", "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conflicts_are_retried_a_bounded_number_of_times() {
        let calls = std::cell::Cell::new(0);
        let outcome = retry_on_conflict(3, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { if n < 2 { Err(AppError::Conflict("pair".into())) } else { Ok(n) } }
        })
        .await;
        assert_eq!(outcome.unwrap(), 2);

        calls.set(0);
        let outcome: Result<()> = retry_on_conflict(3, || {
            calls.set(calls.get() + 1);
            async { Err(AppError::Conflict("pair".into())) }
        })
        .await;
        assert!(matches!(outcome, Err(AppError::Conflict(_))));
        assert_eq!(calls.get(), 3);

        calls.set(0);
        let outcome: Result<()> = retry_on_conflict(3, || {
            calls.set(calls.get() + 1);
            async { Err(AppError::invalid("nope")) }
        })
        .await;
        assert!(matches!(outcome, Err(AppError::InvalidArgument(_))));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn backend_failures_surface_as_internal() {
        let mut store = MockStore::new();
        store
            .expect_begin()
            .returning(|| Err(StoreError::Backend(anyhow::anyhow!("connection refused"))));
        let svc = RelationshipService::new(Arc::new(store), fixed_clock(Utc::now()));

        let err = svc.send_request("alice", "bob").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(ref msg) if msg.contains("connection refused")));
    }
}
