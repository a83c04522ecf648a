//! Friend requests, friendships and blocks.
//!
//! The authenticated caller is always one side of the edge; the other side
//! is addressed by user id or username in the path or body.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use domains::{FriendshipView, UserSummary};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam};
use crate::state::{AppState, AuthUser};

#[derive(Debug, Deserialize)]
pub struct FriendRequestBody {
    pub addressee: String,
}

#[derive(Debug, Deserialize)]
pub struct BlockBody {
    pub user: String,
}

pub async fn send_request(
    State(state): State<AppState>,
    caller: AuthUser,
    JsonBody(body): JsonBody<FriendRequestBody>,
) -> Result<(StatusCode, Json<FriendshipView>), ApiError> {
    let view = state
        .services
        .relationships
        .send_request(&caller.identifier(), &body.addressee)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn accept_request(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(requester): PathParam<String>,
) -> Result<Json<FriendshipView>, ApiError> {
    let view = state.services.relationships.accept(&requester, &caller.identifier()).await?;
    Ok(Json(view))
}

pub async fn decline_request(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(requester): PathParam<String>,
) -> Result<Json<FriendshipView>, ApiError> {
    let view = state.services.relationships.decline(&requester, &caller.identifier()).await?;
    Ok(Json(view))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(addressee): PathParam<String>,
) -> Result<StatusCode, ApiError> {
    state.services.relationships.cancel_request(&caller.identifier(), &addressee).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unfriend(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(other): PathParam<String>,
) -> Result<StatusCode, ApiError> {
    state.services.relationships.unfriend(&caller.identifier(), &other).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn block(
    State(state): State<AppState>,
    caller: AuthUser,
    JsonBody(body): JsonBody<BlockBody>,
) -> Result<(StatusCode, Json<FriendshipView>), ApiError> {
    let view = state.services.relationships.block(&caller.identifier(), &body.user).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn unblock(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(blocked): PathParam<String>,
) -> Result<StatusCode, ApiError> {
    state.services.relationships.unblock(&caller.identifier(), &blocked).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `null` when the two users share no edge.
pub async fn status_with(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(other): PathParam<String>,
) -> Result<Json<Option<FriendshipView>>, ApiError> {
    let view = state.services.relationships.status_between(&caller.identifier(), &other).await?;
    Ok(Json(view))
}

pub async fn incoming_requests(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<FriendshipView>>, ApiError> {
    Ok(Json(state.services.graph.friend_requests_for(&caller.identifier()).await?))
}

pub async fn sent_requests(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<FriendshipView>>, ApiError> {
    Ok(Json(state.services.graph.sent_requests_by(&caller.identifier()).await?))
}

pub async fn blocked_users(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    Ok(Json(state.services.graph.blocked_by(&caller.identifier()).await?))
}

pub async fn friends_of(
    State(state): State<AppState>,
    _caller: AuthUser,
    PathParam(user): PathParam<String>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    Ok(Json(state.services.graph.friends_of(&user).await?))
}

pub async fn mutual_friends(
    State(state): State<AppState>,
    _caller: AuthUser,
    PathParam((user, other)): PathParam<(String, String)>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    Ok(Json(state.services.graph.mutual_friends(&user, &other).await?))
}
