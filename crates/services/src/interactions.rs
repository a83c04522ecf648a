//! # Interaction Aggregator
//!
//! Likes on snippets and pages, comments and user tags on snippets.
//! Mutations follow one rule: only the owner of a thing may remove it
//! (comment author for comments, snippet owner for user tags).

use std::sync::Arc;

use domains::{
    AppError, Clock, CodeSnippet, Comment, CommentView, Engagement, Like, LikeTarget, LikeToggle,
    LikeView, Paginated, Result, SnippetSort, SnippetSummary, Store, UnitOfWork, User, UserSummary,
    UserTag, UserTagView, MAX_COMMENT_CHARS,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::directory::{find_user, summaries};

/// Largest page a feed request may ask for.
pub const MAX_PAGE_SIZE: u32 = 100;

pub struct InteractionService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

async fn require_user(uow: &mut dyn UnitOfWork, user_id: Uuid) -> Result<User> {
    if user_id.is_nil() {
        return Err(AppError::invalid("user id must not be empty"));
    }
    uow.user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user", user_id))
}

async fn require_snippet(uow: &mut dyn UnitOfWork, snippet_id: Uuid) -> Result<CodeSnippet> {
    uow.snippet(snippet_id)
        .await?
        .ok_or_else(|| AppError::not_found("code snippet", snippet_id))
}

async fn require_target(uow: &mut dyn UnitOfWork, target: LikeTarget) -> Result<()> {
    let exists = match target {
        LikeTarget::Snippet(id) => uow.snippet(id).await?.is_some(),
        LikeTarget::Page(id) => uow.page(id).await?.is_some(),
    };
    if exists {
        Ok(())
    } else {
        Err(AppError::not_found(target.kind(), target.id()))
    }
}

/// Trims and bounds comment text.
fn normalize_comment(raw: &str) -> Result<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::invalid("comment content is required"));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::invalid(format!(
            "comment content cannot exceed {MAX_COMMENT_CHARS} characters"
        )));
    }
    Ok(content.to_string())
}

fn comment_view(comment: &Comment, author: UserSummary) -> CommentView {
    CommentView {
        id: comment.id,
        content: comment.content.clone(),
        created_at: comment.created_at,
        created_by: author,
        target_id: comment.snippet_id,
    }
}

fn tag_view(tag: &UserTag, tagged: UserSummary) -> UserTagView {
    UserTagView {
        id: tag.id,
        tagged_user_id: tag.tagged_user_id,
        tagged_user: tagged,
        tagger_id: tag.tagger_id,
        target_id: tag.snippet_id,
        created_at: tag.created_at,
    }
}

impl InteractionService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Likes the target, or removes the caller's existing like.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_like(&self, user_id: Uuid, target: LikeTarget) -> Result<LikeToggle> {
        let mut uow = self.store.begin().await?;
        let user = require_user(uow.as_mut(), user_id).await?;
        require_target(uow.as_mut(), target).await?;

        if let Some(existing) = uow.like_by(user.id, target).await? {
            uow.delete_like(existing.id).await?;
            uow.commit().await?;
            info!(user_id = %user.id, "like removed");
            return Ok(LikeToggle::Unliked);
        }

        let like = Like {
            id: Uuid::now_v7(),
            user_id: user.id,
            target,
            created_at: self.clock.now(),
        };
        uow.insert_like(&like).await?;
        uow.commit().await?;
        info!(user_id = %user.id, "like added");

        Ok(LikeToggle::Liked(LikeView {
            id: like.id,
            user_id: like.user_id,
            user: UserSummary::from(&user),
            target,
            created_at: like.created_at,
        }))
    }

    #[tracing::instrument(skip(self, content))]
    pub async fn add_comment(&self, user_id: Uuid, snippet_id: Uuid, content: &str) -> Result<CommentView> {
        let content = normalize_comment(content)?;
        let mut uow = self.store.begin().await?;
        let author = require_user(uow.as_mut(), user_id).await?;
        require_snippet(uow.as_mut(), snippet_id).await?;

        let comment = Comment {
            id: Uuid::now_v7(),
            snippet_id,
            author_id: author.id,
            content,
            created_at: self.clock.now(),
        };
        uow.insert_comment(&comment).await?;
        uow.commit().await?;

        info!(comment_id = %comment.id, "comment added");
        Ok(comment_view(&comment, UserSummary::from(&author)))
    }

    /// Only the author may delete a comment.
    #[tracing::instrument(skip(self))]
    pub async fn delete_comment(&self, user_id: Uuid, comment_id: Uuid) -> Result<()> {
        let mut uow = self.store.begin().await?;
        let comment = uow
            .comment(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("comment", comment_id))?;

        if comment.author_id != user_id {
            warn!(author_id = %comment.author_id, "comment deletion by non-author");
            return Err(AppError::Forbidden("you can only delete your own comments".into()));
        }

        uow.delete_comment(comment.id).await?;
        uow.commit().await?;
        info!("comment deleted");
        Ok(())
    }

    /// Tags `tagged` (id or username) on a snippet. Repeated tags are kept.
    #[tracing::instrument(skip(self))]
    pub async fn tag_user(&self, tagger_id: Uuid, tagged: &str, snippet_id: Uuid) -> Result<UserTagView> {
        let mut uow = self.store.begin().await?;
        let tagger = require_user(uow.as_mut(), tagger_id).await?;
        let tagged_user = find_user(uow.as_mut(), tagged)
            .await?
            .ok_or_else(|| AppError::not_found("user", tagged))?;
        require_snippet(uow.as_mut(), snippet_id).await?;

        let tag = UserTag {
            id: Uuid::now_v7(),
            snippet_id,
            tagged_user_id: tagged_user.id,
            tagger_id: tagger.id,
            created_at: self.clock.now(),
        };
        uow.insert_user_tag(&tag).await?;
        uow.commit().await?;

        info!(tag_id = %tag.id, tagged_user_id = %tagged_user.id, "user tagged");
        Ok(tag_view(&tag, UserSummary::from(&tagged_user)))
    }

    /// Only the owner of the tagged snippet may remove a tag, not the tagger.
    #[tracing::instrument(skip(self))]
    pub async fn remove_user_tag(&self, requester_id: Uuid, tag_id: Uuid) -> Result<()> {
        let mut uow = self.store.begin().await?;
        let tag = uow
            .user_tag(tag_id)
            .await?
            .ok_or_else(|| AppError::not_found("user tag", tag_id))?;

        let owner = uow.snippet(tag.snippet_id).await?.map(|s| s.owner_id);
        if owner != Some(requester_id) {
            warn!(snippet_id = %tag.snippet_id, "tag removal by someone other than the snippet owner");
            return Err(AppError::Forbidden(
                "you can only remove tags from your own code snippets".into(),
            ));
        }

        uow.delete_user_tag(tag.id).await?;
        uow.commit().await?;
        info!("user tag removed");
        Ok(())
    }

    /// Comments on a snippet, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn comments_for(&self, snippet_id: Uuid) -> Result<Vec<CommentView>> {
        let mut uow = self.store.begin().await?;
        require_snippet(uow.as_mut(), snippet_id).await?;
        let comments = uow.comments_on(snippet_id).await?;
        let authors: Vec<Uuid> = comments.iter().map(|c| c.author_id).collect();
        let users = summaries(uow.as_mut(), &authors).await?;

        Ok(comments
            .iter()
            .filter_map(|c| users.get(&c.author_id).map(|u| comment_view(c, u.clone())))
            .collect())
    }

    /// User tags on a snippet, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn user_tags_for(&self, snippet_id: Uuid) -> Result<Vec<UserTagView>> {
        let mut uow = self.store.begin().await?;
        require_snippet(uow.as_mut(), snippet_id).await?;
        let tags = uow.user_tags_on(snippet_id).await?;
        let tagged: Vec<Uuid> = tags.iter().map(|t| t.tagged_user_id).collect();
        let users = summaries(uow.as_mut(), &tagged).await?;

        Ok(tags
            .iter()
            .filter_map(|t| users.get(&t.tagged_user_id).map(|u| tag_view(t, u.clone())))
            .collect())
    }

    /// Users who liked the target, in the order they liked it.
    #[tracing::instrument(skip(self))]
    pub async fn likers_of(&self, target: LikeTarget) -> Result<Vec<UserSummary>> {
        let mut uow = self.store.begin().await?;
        require_target(uow.as_mut(), target).await?;
        let ids: Vec<Uuid> = uow.likes_on(target).await?.iter().map(|l| l.user_id).collect();
        let mut users = summaries(uow.as_mut(), &ids).await?;
        Ok(ids.iter().filter_map(|id| users.remove(id)).collect())
    }

    /// Counters for a snippet or page, plus whether `viewer` liked it.
    #[tracing::instrument(skip(self))]
    pub async fn engagement_for(&self, target: LikeTarget, viewer: Option<Uuid>) -> Result<Engagement> {
        let mut uow = self.store.begin().await?;
        require_target(uow.as_mut(), target).await?;

        let like_count = uow.count_likes(target).await?;
        let comment_count = match target {
            LikeTarget::Snippet(id) => uow.count_comments(id).await?,
            LikeTarget::Page(_) => 0,
        };
        let liked_by_viewer = match viewer {
            Some(user_id) => uow.like_by(user_id, target).await?.is_some(),
            None => false,
        };

        Ok(Engagement { like_count, comment_count, liked_by_viewer })
    }

    /// Snippets with their counters, optionally restricted to one owner.
    /// `page` is 1-based.
    #[tracing::instrument(skip(self))]
    pub async fn snippet_feed(
        &self,
        owner: Option<&str>,
        sort: SnippetSort,
        page: u32,
        page_size: u32,
    ) -> Result<Paginated<SnippetSummary>> {
        if page == 0 {
            return Err(AppError::invalid("page numbers start at 1"));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(AppError::invalid(format!("page size must be between 1 and {MAX_PAGE_SIZE}")));
        }

        let mut uow = self.store.begin().await?;
        let owner_id = match owner {
            Some(identifier) => Some(
                find_user(uow.as_mut(), identifier)
                    .await?
                    .ok_or_else(|| AppError::not_found("user", identifier))?
                    .id,
            ),
            None => None,
        };

        let offset = (page - 1).saturating_mul(page_size);
        let total = uow.count_snippets(owner_id).await?;
        let items = uow.snippet_feed(owner_id, sort, page_size, offset).await?;
        Ok(Paginated::new(items, total, page, page_size))
    }
}
