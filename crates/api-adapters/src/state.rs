use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use domains::{AuthError, TokenVerifier};
use services::Services;
use uuid::Uuid;

use crate::error::ApiError;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    pub fn new(services: Services, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { services: Arc::new(services), verifier }
    }
}

/// The caller, authenticated from the `Authorization: Bearer` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

impl AuthUser {
    /// The caller's id in the textual form the relationship services accept.
    pub fn identifier(&self) -> String {
        self.0.to_string()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AuthError::Missing)?;

        let user_id = state.verifier.verify(token.trim()).map_err(|e| {
            tracing::warn!(error = %e, "bearer token rejected");
            e
        })?;
        Ok(AuthUser(user_id))
    }
}
