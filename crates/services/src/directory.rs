//! # User Directory
//!
//! Lets callers address users either by canonical id or by username.

use std::collections::HashMap;
use std::sync::Arc;

use domains::{AppError, Result, Store, UnitOfWork, User, UserSummary};
use uuid::Uuid;

/// Looks a user up by id (UUID text) or by case-insensitive username.
///
/// Returns `Ok(None)` when nothing matches; blank identifiers are rejected.
pub(crate) async fn find_user(uow: &mut dyn UnitOfWork, identifier: &str) -> Result<Option<User>> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(AppError::invalid("user identifier must not be empty"));
    }

    if let Ok(id) = Uuid::parse_str(identifier) {
        if let Some(user) = uow.user_by_id(id).await? {
            return Ok(Some(user));
        }
    }

    Ok(uow.user_by_username(identifier).await?)
}

/// Loads summaries for `ids`, keyed by id.
///
/// Every id must exist; a missing one means a dangling reference in the
/// store and is reported as an internal failure.
pub(crate) async fn summaries(
    uow: &mut dyn UnitOfWork,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, UserSummary>> {
    let users = uow.users_by_ids(ids).await?;
    let found: HashMap<Uuid, UserSummary> = users.iter().map(|u| (u.id, UserSummary::from(u))).collect();

    if let Some(missing) = ids.iter().find(|id| !found.contains_key(id)) {
        tracing::error!(user_id = %missing, "relationship references a missing user");
        return Err(AppError::Internal(format!("dangling user reference {missing}")));
    }
    Ok(found)
}

pub struct UserDirectory {
    store: Arc<dyn Store>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolves `identifier` to a canonical user id.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, identifier: &str) -> Result<Uuid> {
        let mut uow = self.store.begin().await?;
        find_user(uow.as_mut(), identifier)
            .await?
            .map(|user| user.id)
            .ok_or_else(|| AppError::not_found("user", identifier))
    }

    pub async fn summary(&self, user_id: Uuid) -> Result<UserSummary> {
        let mut uow = self.store.begin().await?;
        uow.user_by_id(user_id)
            .await?
            .map(|user| UserSummary::from(&user))
            .ok_or_else(|| AppError::not_found("user", user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_user, store};

    #[tokio::test]
    async fn resolves_by_id_and_by_username() {
        let store = store();
        let alice = seed_user(&store, "Alice").await;
        let directory = UserDirectory::new(store);

        assert_eq!(directory.resolve(&alice.id.to_string()).await.unwrap(), alice.id);
        assert_eq!(directory.resolve("alice").await.unwrap(), alice.id);
        assert_eq!(directory.resolve("  ALICE ").await.unwrap(), alice.id);
    }

    #[tokio::test]
    async fn unknown_and_blank_identifiers_are_rejected() {
        let store = store();
        let directory = UserDirectory::new(store);

        assert!(matches!(directory.resolve("nobody").await, Err(AppError::NotFound(..))));
        assert!(matches!(
            directory.resolve(&Uuid::now_v7().to_string()).await,
            Err(AppError::NotFound(..))
        ));
        assert!(matches!(directory.resolve("   ").await, Err(AppError::InvalidArgument(_))));
    }
}
