//! # Interaction Models
//!
//! Likes, comments and user tags: the per-user engagement attached to
//! snippets and pages.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserSummary;

/// Longest comment accepted after trimming, in characters.
pub const MAX_COMMENT_CHARS: usize = 1000;

/// What a like points at. Exactly one of the two, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum LikeTarget {
    Snippet(Uuid),
    Page(Uuid),
}

impl LikeTarget {
    pub fn id(&self) -> Uuid {
        match self {
            LikeTarget::Snippet(id) | LikeTarget::Page(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LikeTarget::Snippet(_) => "snippet",
            LikeTarget::Page(_) => "page",
        }
    }
}

impl fmt::Display for LikeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target: LikeTarget,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user: UserSummary,
    pub target: LikeTarget,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a like toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LikeToggle {
    Liked(LikeView),
    Unliked,
}

impl LikeToggle {
    pub fn is_liked(&self) -> bool {
        matches!(self, LikeToggle::Liked(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub snippet_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub created_by: UserSummary,
    pub target_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTag {
    pub id: Uuid,
    pub snippet_id: Uuid,
    pub tagged_user_id: Uuid,
    pub tagger_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTagView {
    pub id: Uuid,
    pub tagged_user_id: Uuid,
    pub tagged_user: UserSummary,
    pub tagger_id: Uuid,
    pub target_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Aggregated counters for a snippet or page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    pub like_count: u64,
    /// Always zero for pages, which carry no comments.
    pub comment_count: u64,
    pub liked_by_viewer: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_target_serializes_with_kind_tag() {
        let id = Uuid::nil();
        let json = serde_json::to_value(LikeTarget::Page(id)).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "page", "id": id }));
    }

    #[test]
    fn unliked_toggle_has_no_payload() {
        let json = serde_json::to_value(LikeToggle::Unliked).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "unliked" }));
    }
}
