//! # In-memory store
//!
//! A process-local implementation of the storage ports, used for tests and
//! for running the server without a database.
//!
//! Units of work are serialized: `begin` takes the store lock and works on
//! a copy of the state, `commit` writes the copy back. Dropping the unit of
//! work releases the lock and discards the copy, which is a rollback.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use domains::{
    pair_key, sort_summaries, CodeSnippet, Comment, ContentRepo, Friendship, FriendshipRepo,
    FriendshipStatus, InteractionRepo, Like, LikeTarget, Page, SnippetSort, SnippetSummary, Store,
    StoreError, UnitOfWork, User, UserRepo, UserTag,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    // Vecs keep insertion order, which breaks timestamp ties deterministically.
    friendships: Vec<Friendship>,
    snippets: HashMap<Uuid, CodeSnippet>,
    pages: HashMap<Uuid, Page>,
    likes: Vec<Like>,
    comments: Vec<Comment>,
    user_tags: Vec<UserTag>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

fn newest_first<T>(mut items: Vec<T>, at: impl Fn(&T) -> chrono::DateTime<chrono::Utc>) -> Vec<T> {
    items.sort_by(|a, b| at(b).cmp(&at(a)));
    items
}

#[async_trait]
impl UserRepo for MemoryUnitOfWork {
    async fn user_by_id(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn user_by_username(&mut self, username: &str) -> Result<Option<User>, StoreError> {
        let wanted = username.to_lowercase();
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.username.to_lowercase() == wanted)
            .cloned())
    }

    async fn users_by_ids(&mut self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        Ok(ids.iter().filter_map(|id| self.working.users.get(id).cloned()).collect())
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        let wanted = user.username.to_lowercase();
        let taken = self.working.users.contains_key(&user.id)
            || self.working.users.values().any(|u| u.username.to_lowercase() == wanted);
        if taken {
            return Err(StoreError::UniqueViolation(format!("user {}", user.username)));
        }
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl FriendshipRepo for MemoryUnitOfWork {
    async fn friendship(&mut self, requester_id: Uuid, addressee_id: Uuid) -> Result<Option<Friendship>, StoreError> {
        Ok(self
            .working
            .friendships
            .iter()
            .find(|f| f.requester_id == requester_id && f.addressee_id == addressee_id)
            .cloned())
    }

    async fn friendship_between(&mut self, a: Uuid, b: Uuid) -> Result<Option<Friendship>, StoreError> {
        let key = pair_key(a, b);
        Ok(self.working.friendships.iter().find(|f| f.pair_key() == key).cloned())
    }

    async fn insert_friendship(&mut self, friendship: &Friendship) -> Result<(), StoreError> {
        if friendship.requester_id == friendship.addressee_id {
            return Err(StoreError::Backend(anyhow!("friendship edge must join two different users")));
        }
        let key = friendship.pair_key();
        if self.working.friendships.iter().any(|f| f.pair_key() == key) {
            return Err(StoreError::UniqueViolation("friendship pair".into()));
        }
        self.working.friendships.push(friendship.clone());
        Ok(())
    }

    async fn update_friendship(&mut self, friendship: &Friendship) -> Result<(), StoreError> {
        let row = self
            .working
            .friendships
            .iter_mut()
            .find(|f| f.requester_id == friendship.requester_id && f.addressee_id == friendship.addressee_id)
            .ok_or_else(|| anyhow!("no friendship row {} -> {}", friendship.requester_id, friendship.addressee_id))?;
        row.status = friendship.status;
        row.updated_at = friendship.updated_at;
        Ok(())
    }

    async fn delete_friendships_between(&mut self, a: Uuid, b: Uuid) -> Result<u64, StoreError> {
        let key = pair_key(a, b);
        let before = self.working.friendships.len();
        self.working.friendships.retain(|f| f.pair_key() != key);
        Ok((before - self.working.friendships.len()) as u64)
    }

    async fn incoming_friendships(&mut self, addressee_id: Uuid, status: FriendshipStatus) -> Result<Vec<Friendship>, StoreError> {
        let edges = self
            .working
            .friendships
            .iter()
            .filter(|f| f.addressee_id == addressee_id && f.status == status)
            .cloned()
            .collect();
        Ok(newest_first(edges, |f: &Friendship| f.created_at))
    }

    async fn outgoing_friendships(&mut self, requester_id: Uuid, status: FriendshipStatus) -> Result<Vec<Friendship>, StoreError> {
        let edges = self
            .working
            .friendships
            .iter()
            .filter(|f| f.requester_id == requester_id && f.status == status)
            .cloned()
            .collect();
        Ok(newest_first(edges, |f: &Friendship| f.created_at))
    }

    async fn friendships_involving(&mut self, user_id: Uuid, status: FriendshipStatus) -> Result<Vec<Friendship>, StoreError> {
        let edges = self
            .working
            .friendships
            .iter()
            .filter(|f| f.involves(user_id) && f.status == status)
            .cloned()
            .collect();
        Ok(newest_first(edges, |f: &Friendship| f.created_at))
    }
}

#[async_trait]
impl ContentRepo for MemoryUnitOfWork {
    async fn snippet(&mut self, id: Uuid) -> Result<Option<CodeSnippet>, StoreError> {
        Ok(self.working.snippets.get(&id).cloned())
    }

    async fn insert_snippet(&mut self, snippet: &CodeSnippet) -> Result<(), StoreError> {
        if self.working.snippets.contains_key(&snippet.id) {
            return Err(StoreError::UniqueViolation(format!("snippet {}", snippet.id)));
        }
        self.working.snippets.insert(snippet.id, snippet.clone());
        Ok(())
    }

    async fn page(&mut self, id: Uuid) -> Result<Option<Page>, StoreError> {
        Ok(self.working.pages.get(&id).cloned())
    }

    async fn insert_page(&mut self, page: &Page) -> Result<(), StoreError> {
        if self.working.pages.contains_key(&page.id) {
            return Err(StoreError::UniqueViolation(format!("page {}", page.id)));
        }
        self.working.pages.insert(page.id, page.clone());
        Ok(())
    }

    async fn snippet_feed(
        &mut self,
        owner_id: Option<Uuid>,
        sort: SnippetSort,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SnippetSummary>, StoreError> {
        let state = &self.working;
        let mut items: Vec<SnippetSummary> = state
            .snippets
            .values()
            .filter(|s| owner_id.map_or(true, |owner| s.owner_id == owner))
            .map(|s| SnippetSummary {
                snippet: s.clone(),
                like_count: state.likes.iter().filter(|l| l.target == LikeTarget::Snippet(s.id)).count() as u64,
                comment_count: state.comments.iter().filter(|c| c.snippet_id == s.id).count() as u64,
            })
            .collect();
        sort_summaries(&mut items, sort);
        Ok(items.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn count_snippets(&mut self, owner_id: Option<Uuid>) -> Result<u64, StoreError> {
        Ok(self
            .working
            .snippets
            .values()
            .filter(|s| owner_id.map_or(true, |owner| s.owner_id == owner))
            .count() as u64)
    }
}

#[async_trait]
impl InteractionRepo for MemoryUnitOfWork {
    async fn like_by(&mut self, user_id: Uuid, target: LikeTarget) -> Result<Option<Like>, StoreError> {
        Ok(self
            .working
            .likes
            .iter()
            .find(|l| l.user_id == user_id && l.target == target)
            .cloned())
    }

    async fn insert_like(&mut self, like: &Like) -> Result<(), StoreError> {
        if self.working.likes.iter().any(|l| l.user_id == like.user_id && l.target == like.target) {
            return Err(StoreError::UniqueViolation(format!("like on {}", like.target)));
        }
        self.working.likes.push(like.clone());
        Ok(())
    }

    async fn delete_like(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let before = self.working.likes.len();
        self.working.likes.retain(|l| l.id != id);
        Ok(self.working.likes.len() != before)
    }

    async fn likes_on(&mut self, target: LikeTarget) -> Result<Vec<Like>, StoreError> {
        let mut likes: Vec<Like> = self.working.likes.iter().filter(|l| l.target == target).cloned().collect();
        likes.sort_by_key(|l| l.created_at);
        Ok(likes)
    }

    async fn count_likes(&mut self, target: LikeTarget) -> Result<u64, StoreError> {
        Ok(self.working.likes.iter().filter(|l| l.target == target).count() as u64)
    }

    async fn comment(&mut self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        Ok(self.working.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<(), StoreError> {
        self.working.comments.push(comment.clone());
        Ok(())
    }

    async fn delete_comment(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let before = self.working.comments.len();
        self.working.comments.retain(|c| c.id != id);
        Ok(self.working.comments.len() != before)
    }

    async fn comments_on(&mut self, snippet_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let comments = self.working.comments.iter().filter(|c| c.snippet_id == snippet_id).cloned().collect();
        Ok(newest_first(comments, |c: &Comment| c.created_at))
    }

    async fn count_comments(&mut self, snippet_id: Uuid) -> Result<u64, StoreError> {
        Ok(self.working.comments.iter().filter(|c| c.snippet_id == snippet_id).count() as u64)
    }

    async fn user_tag(&mut self, id: Uuid) -> Result<Option<UserTag>, StoreError> {
        Ok(self.working.user_tags.iter().find(|t| t.id == id).cloned())
    }

    async fn insert_user_tag(&mut self, tag: &UserTag) -> Result<(), StoreError> {
        self.working.user_tags.push(tag.clone());
        Ok(())
    }

    async fn delete_user_tag(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let before = self.working.user_tags.len();
        self.working.user_tags.retain(|t| t.id != id);
        Ok(self.working.user_tags.len() != before)
    }

    async fn user_tags_on(&mut self, snippet_id: Uuid) -> Result<Vec<UserTag>, StoreError> {
        let tags = self.working.user_tags.iter().filter(|t| t.snippet_id == snippet_id).cloned().collect();
        Ok(newest_first(tags, |t: &UserTag| t.created_at))
    }
}
