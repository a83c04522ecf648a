//! Route table.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{friendships, health, interactions};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let social = Router::new()
        .route("/friend-requests", post(friendships::send_request))
        .route("/friend-requests/{user}", delete(friendships::cancel_request))
        .route("/friend-requests/{user}/accept", post(friendships::accept_request))
        .route("/friend-requests/{user}/decline", post(friendships::decline_request))
        .route("/friends/{user}", delete(friendships::unfriend))
        .route("/blocks", post(friendships::block))
        .route("/blocks/{user}", delete(friendships::unblock))
        .route("/relationships/{user}", get(friendships::status_with))
        .route("/me/friend-requests", get(friendships::incoming_requests))
        .route("/me/sent-requests", get(friendships::sent_requests))
        .route("/me/blocked", get(friendships::blocked_users))
        .route("/users/{user}/friends", get(friendships::friends_of))
        .route("/users/{user}/mutual-friends/{other}", get(friendships::mutual_friends));

    let content = Router::new()
        .route("/snippets", get(interactions::snippet_feed))
        .route("/snippets/{id}/like", post(interactions::like_snippet))
        .route("/snippets/{id}/likes", get(interactions::snippet_likers))
        .route("/snippets/{id}/engagement", get(interactions::snippet_engagement))
        .route(
            "/snippets/{id}/comments",
            get(interactions::list_comments).post(interactions::add_comment),
        )
        .route("/snippets/{id}/tags", get(interactions::list_tags).post(interactions::tag_user))
        .route("/pages/{id}/like", post(interactions::like_page))
        .route("/pages/{id}/likes", get(interactions::page_likers))
        .route("/pages/{id}/engagement", get(interactions::page_engagement))
        .route("/comments/{id}", delete(interactions::delete_comment))
        .route("/tags/{id}", delete(interactions::remove_tag));

    Router::new()
        .route("/health", get(health))
        .nest("/api", social.merge(content))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
