//! Shared fixtures for the cross-crate behaviour tests.
//!
//! Every [`World`] owns a fresh store, in-memory unless a test hands it
//! another one, and a full service bundle wired against it.

pub mod contracts;
#[cfg(feature = "db-postgres")]
pub mod postgres;

use std::sync::Arc;

use chrono::Utc;
use domains::{CodeSnippet, Friendship, Page, Store, SystemClock, User};
use services::Services;
use storage_adapters::MemoryStore;
use uuid::Uuid;

pub struct World {
    pub store: Arc<dyn Store>,
    pub services: Services,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let services = Services::new(store.clone(), Arc::new(SystemClock));
        Self { store, services }
    }

    pub async fn user(&self, username: &str) -> anyhow::Result<User> {
        let user = User {
            id: Uuid::now_v7(),
            username: username.to_string(),
            first_name: username.to_string(),
            last_name: "Fixture".to_string(),
            email: format!("{username}@example.com"),
            created_at: Utc::now(),
        };
        let mut uow = self.store.begin().await?;
        uow.insert_user(&user).await?;
        uow.commit().await?;
        Ok(user)
    }

    pub async fn users<const N: usize>(&self, names: [&str; N]) -> anyhow::Result<[User; N]> {
        let mut created = Vec::with_capacity(N);
        for name in names {
            created.push(self.user(name).await?);
        }
        created
            .try_into()
            .map_err(|_| anyhow::anyhow!("fixture produced the wrong number of users"))
    }

    pub async fn snippet(&self, owner: &User, title: &str) -> anyhow::Result<CodeSnippet> {
        let snippet = CodeSnippet {
            id: Uuid::now_v7(),
            owner_id: owner.id,
            title: title.to_string(),
            language: "rust".to_string(),
            created_at: Utc::now(),
        };
        let mut uow = self.store.begin().await?;
        uow.insert_snippet(&snippet).await?;
        uow.commit().await?;
        Ok(snippet)
    }

    pub async fn page(&self, owner: &User, title: &str) -> anyhow::Result<Page> {
        let page = Page {
            id: Uuid::now_v7(),
            owner_id: owner.id,
            title: title.to_string(),
            created_at: Utc::now(),
        };
        let mut uow = self.store.begin().await?;
        uow.insert_page(&page).await?;
        uow.commit().await?;
        Ok(page)
    }

    /// Stored edges between the pair, counting both directions.
    pub async fn edges_between(&self, a: &User, b: &User) -> anyhow::Result<Vec<Friendship>> {
        let mut uow = self.store.begin().await?;
        let mut edges = Vec::new();
        edges.extend(uow.friendship(a.id, b.id).await?);
        edges.extend(uow.friendship(b.id, a.id).await?);
        Ok(edges)
    }
}

/// Usernames of the given summaries, in order.
pub fn names(users: &[domains::UserSummary]) -> Vec<String> {
    users.iter().map(|u| u.user_name.clone()).collect()
}
