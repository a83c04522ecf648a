//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be used by the binary.
//!
//! Every service call opens exactly one [`UnitOfWork`] from a [`Store`],
//! performs its reads and writes through it, and commits. Dropping a unit
//! of work without committing discards its writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AuthError, StoreError};
use crate::models::{
    CodeSnippet, Comment, Friendship, FriendshipStatus, Like, LikeTarget, Page, SnippetSort,
    SnippetSummary, User, UserTag,
};

/// Entry point to the relational store.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a transaction-scoped handle.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

/// A transaction. All repository methods run inside it.
#[async_trait]
pub trait UnitOfWork: UserRepo + FriendshipRepo + ContentRepo + InteractionRepo {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserRepo: Send {
    async fn user_by_id(&mut self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Case-insensitive exact match.
    async fn user_by_username(&mut self, username: &str) -> Result<Option<User>, StoreError>;
    /// Unknown ids are skipped; order of the result is unspecified.
    async fn users_by_ids(&mut self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;
    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError>;
}

/// Persistence for friendship edges.
///
/// Implementations must reject a second edge for the same unordered pair
/// with [`StoreError::UniqueViolation`].
#[async_trait]
pub trait FriendshipRepo: Send {
    /// The edge with exactly this direction.
    async fn friendship(
        &mut self,
        requester_id: Uuid,
        addressee_id: Uuid,
    ) -> Result<Option<Friendship>, StoreError>;

    /// The edge for the pair in either direction.
    async fn friendship_between(&mut self, a: Uuid, b: Uuid) -> Result<Option<Friendship>, StoreError>;

    async fn insert_friendship(&mut self, friendship: &Friendship) -> Result<(), StoreError>;

    /// Persists status and `updated_at` of the edge identified by its direction.
    async fn update_friendship(&mut self, friendship: &Friendship) -> Result<(), StoreError>;

    /// Deletes the pair's edge in either direction. Returns rows removed.
    async fn delete_friendships_between(&mut self, a: Uuid, b: Uuid) -> Result<u64, StoreError>;

    /// Edges addressed to `addressee_id` with `status`, newest first.
    async fn incoming_friendships(
        &mut self,
        addressee_id: Uuid,
        status: FriendshipStatus,
    ) -> Result<Vec<Friendship>, StoreError>;

    /// Edges requested by `requester_id` with `status`, newest first.
    async fn outgoing_friendships(
        &mut self,
        requester_id: Uuid,
        status: FriendshipStatus,
    ) -> Result<Vec<Friendship>, StoreError>;

    /// Edges where `user_id` plays either role, newest first.
    async fn friendships_involving(
        &mut self,
        user_id: Uuid,
        status: FriendshipStatus,
    ) -> Result<Vec<Friendship>, StoreError>;
}

#[async_trait]
pub trait ContentRepo: Send {
    async fn snippet(&mut self, id: Uuid) -> Result<Option<CodeSnippet>, StoreError>;
    async fn insert_snippet(&mut self, snippet: &CodeSnippet) -> Result<(), StoreError>;
    async fn page(&mut self, id: Uuid) -> Result<Option<Page>, StoreError>;
    async fn insert_page(&mut self, page: &Page) -> Result<(), StoreError>;

    /// Snippets (optionally of one owner) with like/comment counts.
    async fn snippet_feed(
        &mut self,
        owner_id: Option<Uuid>,
        sort: SnippetSort,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SnippetSummary>, StoreError>;
    async fn count_snippets(&mut self, owner_id: Option<Uuid>) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait InteractionRepo: Send {
    // Likes
    async fn like_by(&mut self, user_id: Uuid, target: LikeTarget) -> Result<Option<Like>, StoreError>;
    /// Rejects a second like for the same (user, target).
    async fn insert_like(&mut self, like: &Like) -> Result<(), StoreError>;
    async fn delete_like(&mut self, id: Uuid) -> Result<bool, StoreError>;
    /// Oldest first.
    async fn likes_on(&mut self, target: LikeTarget) -> Result<Vec<Like>, StoreError>;
    async fn count_likes(&mut self, target: LikeTarget) -> Result<u64, StoreError>;

    // Comments
    async fn comment(&mut self, id: Uuid) -> Result<Option<Comment>, StoreError>;
    async fn insert_comment(&mut self, comment: &Comment) -> Result<(), StoreError>;
    async fn delete_comment(&mut self, id: Uuid) -> Result<bool, StoreError>;
    /// Newest first.
    async fn comments_on(&mut self, snippet_id: Uuid) -> Result<Vec<Comment>, StoreError>;
    async fn count_comments(&mut self, snippet_id: Uuid) -> Result<u64, StoreError>;

    // User tags
    async fn user_tag(&mut self, id: Uuid) -> Result<Option<UserTag>, StoreError>;
    async fn insert_user_tag(&mut self, tag: &UserTag) -> Result<(), StoreError>;
    async fn delete_user_tag(&mut self, id: Uuid) -> Result<bool, StoreError>;
    /// Newest first.
    async fn user_tags_on(&mut self, snippet_id: Uuid) -> Result<Vec<UserTag>, StoreError>;
}

/// Time source, injectable so tests can pin timestamps.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Verifies a bearer token and yields the caller's user id.
/// Token issuance happens elsewhere.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Uuid, AuthError>;
}
