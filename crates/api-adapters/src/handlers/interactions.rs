//! Likes, comments, user tags and the snippet feed.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use domains::{
    AppError, CommentView, Engagement, LikeTarget, LikeToggle, Paginated, SnippetSort,
    SnippetSummary, UserSummary, UserTagView,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::state::{AppState, AuthUser};

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct TagBody {
    pub user: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub owner: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl FeedQuery {
    fn sort(&self) -> Result<SnippetSort, AppError> {
        match self.sort.as_deref() {
            Some(raw) => raw.parse().map_err(|e: domains::UnknownSortKey| AppError::invalid(e.to_string())),
            None => Ok(SnippetSort::default()),
        }
    }
}

async fn toggle(state: &AppState, caller: AuthUser, target: LikeTarget) -> Result<Json<LikeToggle>, ApiError> {
    Ok(Json(state.services.interactions.toggle_like(caller.0, target).await?))
}

pub async fn like_snippet(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<LikeToggle>, ApiError> {
    toggle(&state, caller, LikeTarget::Snippet(id)).await
}

pub async fn like_page(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<LikeToggle>, ApiError> {
    toggle(&state, caller, LikeTarget::Page(id)).await
}

pub async fn snippet_likers(
    State(state): State<AppState>,
    _caller: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    Ok(Json(state.services.interactions.likers_of(LikeTarget::Snippet(id)).await?))
}

pub async fn page_likers(
    State(state): State<AppState>,
    _caller: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    Ok(Json(state.services.interactions.likers_of(LikeTarget::Page(id)).await?))
}

pub async fn snippet_engagement(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Engagement>, ApiError> {
    let engagement = state
        .services
        .interactions
        .engagement_for(LikeTarget::Snippet(id), Some(caller.0))
        .await?;
    Ok(Json(engagement))
}

pub async fn page_engagement(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<Json<Engagement>, ApiError> {
    let engagement = state
        .services
        .interactions
        .engagement_for(LikeTarget::Page(id), Some(caller.0))
        .await?;
    Ok(Json(engagement))
}

pub async fn add_comment(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(snippet_id): PathParam<Uuid>,
    JsonBody(body): JsonBody<CommentBody>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let view = state
        .services
        .interactions
        .add_comment(caller.0, snippet_id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_comments(
    State(state): State<AppState>,
    _caller: AuthUser,
    PathParam(snippet_id): PathParam<Uuid>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    Ok(Json(state.services.interactions.comments_for(snippet_id).await?))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(comment_id): PathParam<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.services.interactions.delete_comment(caller.0, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn tag_user(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(snippet_id): PathParam<Uuid>,
    JsonBody(body): JsonBody<TagBody>,
) -> Result<(StatusCode, Json<UserTagView>), ApiError> {
    let view = state
        .services
        .interactions
        .tag_user(caller.0, &body.user, snippet_id)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn list_tags(
    State(state): State<AppState>,
    _caller: AuthUser,
    PathParam(snippet_id): PathParam<Uuid>,
) -> Result<Json<Vec<UserTagView>>, ApiError> {
    Ok(Json(state.services.interactions.user_tags_for(snippet_id).await?))
}

pub async fn remove_tag(
    State(state): State<AppState>,
    caller: AuthUser,
    PathParam(tag_id): PathParam<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.services.interactions.remove_user_tag(caller.0, tag_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn snippet_feed(
    State(state): State<AppState>,
    _caller: AuthUser,
    QueryParams(query): QueryParams<FeedQuery>,
) -> Result<Json<Paginated<SnippetSummary>>, ApiError> {
    let feed = state
        .services
        .interactions
        .snippet_feed(
            query.owner.as_deref(),
            query.sort()?,
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    Ok(Json(feed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_sort_defaults_to_latest_and_rejects_unknown_keys() {
        assert_eq!(FeedQuery::default().sort().unwrap(), SnippetSort::Latest);

        let popular = FeedQuery { sort: Some("Popular".into()), ..Default::default() };
        assert_eq!(popular.sort().unwrap(), SnippetSort::Popular);

        let bogus = FeedQuery { sort: Some("likes; DROP TABLE".into()), ..Default::default() };
        assert!(matches!(bogus.sort(), Err(AppError::InvalidArgument(_))));
    }
}
