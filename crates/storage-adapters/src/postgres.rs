//! # PostgreSQL store
//!
//! Maps the relational schema in `migrations/` to the domain models.
//! One [`PgUnitOfWork`] wraps one database transaction; dropping it without
//! committing rolls the transaction back.

use anyhow::anyhow;
use async_trait::async_trait;
use domains::{
    CodeSnippet, Comment, ContentRepo, Friendship, FriendshipRepo, FriendshipStatus,
    InteractionRepo, Like, LikeTarget, Page, SnippetSort, SnippetSummary, Store, StoreError,
    UnitOfWork, User, UserRepo, UserTag,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

/// Unique violations become [`StoreError::UniqueViolation`]; everything else is a backend failure.
fn db_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation(db.constraint().unwrap_or("unique").to_string());
        }
    }
    StoreError::Backend(err.into())
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(db_err)?;
        Ok(Self { pool })
    }

    /// Applies pending migrations from `migrations/`.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db_err)
    }
}

// Row mapping

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id").map_err(db_err)?,
        username: row.try_get("username").map_err(db_err)?,
        first_name: row.try_get("first_name").map_err(db_err)?,
        last_name: row.try_get("last_name").map_err(db_err)?,
        email: row.try_get("email").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn friendship_from_row(row: &PgRow) -> Result<Friendship, StoreError> {
    let status: String = row.try_get("status").map_err(db_err)?;
    Ok(Friendship {
        requester_id: row.try_get("requester_id").map_err(db_err)?,
        addressee_id: row.try_get("addressee_id").map_err(db_err)?,
        status: status.parse().map_err(|e| StoreError::Backend(anyhow!("{e}")))?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn snippet_from_row(row: &PgRow) -> Result<CodeSnippet, StoreError> {
    Ok(CodeSnippet {
        id: row.try_get("id").map_err(db_err)?,
        owner_id: row.try_get("owner_id").map_err(db_err)?,
        title: row.try_get("title").map_err(db_err)?,
        language: row.try_get("language").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn like_from_row(row: &PgRow) -> Result<Like, StoreError> {
    let snippet_id: Option<Uuid> = row.try_get("snippet_id").map_err(db_err)?;
    let page_id: Option<Uuid> = row.try_get("page_id").map_err(db_err)?;
    let target = match (snippet_id, page_id) {
        (Some(id), None) => LikeTarget::Snippet(id),
        (None, Some(id)) => LikeTarget::Page(id),
        _ => return Err(StoreError::Backend(anyhow!("like row must reference exactly one target"))),
    };
    Ok(Like {
        id: row.try_get("id").map_err(db_err)?,
        user_id: row.try_get("user_id").map_err(db_err)?,
        target,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn comment_from_row(row: &PgRow) -> Result<Comment, StoreError> {
    Ok(Comment {
        id: row.try_get("id").map_err(db_err)?,
        snippet_id: row.try_get("snippet_id").map_err(db_err)?,
        author_id: row.try_get("author_id").map_err(db_err)?,
        content: row.try_get("content").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn user_tag_from_row(row: &PgRow) -> Result<UserTag, StoreError> {
    Ok(UserTag {
        id: row.try_get("id").map_err(db_err)?,
        snippet_id: row.try_get("snippet_id").map_err(db_err)?,
        tagged_user_id: row.try_get("tagged_user_id").map_err(db_err)?,
        tagger_id: row.try_get("tagger_id").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn target_columns(target: LikeTarget) -> (Option<Uuid>, Option<Uuid>) {
    match target {
        LikeTarget::Snippet(id) => (Some(id), None),
        LikeTarget::Page(id) => (None, Some(id)),
    }
}

fn target_filter(target: LikeTarget) -> &'static str {
    match target {
        LikeTarget::Snippet(_) => "snippet_id",
        LikeTarget::Page(_) => "page_id",
    }
}

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, created_at";
const FRIENDSHIP_COLUMNS: &str = "requester_id, addressee_id, status, created_at, updated_at";
const LIKE_COLUMNS: &str = "id, user_id, snippet_id, page_id, created_at";

#[async_trait]
impl UserRepo for PgUnitOfWork {
    async fn user_by_id(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn user_by_username(&mut self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE lower(username) = lower($1)"))
            .bind(username)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn users_by_ids(&mut self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_err)?;
        rows.iter().map(user_from_row).collect()
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, username, first_name, last_name, email, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl FriendshipRepo for PgUnitOfWork {
    async fn friendship(&mut self, requester_id: Uuid, addressee_id: Uuid) -> Result<Option<Friendship>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {FRIENDSHIP_COLUMNS} FROM friendships WHERE requester_id = $1 AND addressee_id = $2"
        ))
        .bind(requester_id)
        .bind(addressee_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;
        row.as_ref().map(friendship_from_row).transpose()
    }

    async fn friendship_between(&mut self, a: Uuid, b: Uuid) -> Result<Option<Friendship>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {FRIENDSHIP_COLUMNS} FROM friendships \
             WHERE (requester_id = $1 AND addressee_id = $2) OR (requester_id = $2 AND addressee_id = $1)"
        ))
        .bind(a)
        .bind(b)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;
        row.as_ref().map(friendship_from_row).transpose()
    }

    async fn insert_friendship(&mut self, friendship: &Friendship) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO friendships (requester_id, addressee_id, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(friendship.requester_id)
        .bind(friendship.addressee_id)
        .bind(friendship.status.as_str())
        .bind(friendship.created_at)
        .bind(friendship.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_friendship(&mut self, friendship: &Friendship) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE friendships SET status = $3, updated_at = $4 WHERE requester_id = $1 AND addressee_id = $2",
        )
        .bind(friendship.requester_id)
        .bind(friendship.addressee_id)
        .bind(friendship.status.as_str())
        .bind(friendship.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(anyhow!(
                "no friendship row {} -> {}",
                friendship.requester_id,
                friendship.addressee_id
            )));
        }
        Ok(())
    }

    async fn delete_friendships_between(&mut self, a: Uuid, b: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM friendships \
             WHERE (requester_id = $1 AND addressee_id = $2) OR (requester_id = $2 AND addressee_id = $1)",
        )
        .bind(a)
        .bind(b)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn incoming_friendships(&mut self, addressee_id: Uuid, status: FriendshipStatus) -> Result<Vec<Friendship>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {FRIENDSHIP_COLUMNS} FROM friendships WHERE addressee_id = $1 AND status = $2 ORDER BY created_at DESC"
        ))
        .bind(addressee_id)
        .bind(status.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;
        rows.iter().map(friendship_from_row).collect()
    }

    async fn outgoing_friendships(&mut self, requester_id: Uuid, status: FriendshipStatus) -> Result<Vec<Friendship>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {FRIENDSHIP_COLUMNS} FROM friendships WHERE requester_id = $1 AND status = $2 ORDER BY created_at DESC"
        ))
        .bind(requester_id)
        .bind(status.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;
        rows.iter().map(friendship_from_row).collect()
    }

    async fn friendships_involving(&mut self, user_id: Uuid, status: FriendshipStatus) -> Result<Vec<Friendship>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {FRIENDSHIP_COLUMNS} FROM friendships \
             WHERE (requester_id = $1 OR addressee_id = $1) AND status = $2 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(status.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;
        rows.iter().map(friendship_from_row).collect()
    }
}

#[async_trait]
impl ContentRepo for PgUnitOfWork {
    async fn snippet(&mut self, id: Uuid) -> Result<Option<CodeSnippet>, StoreError> {
        let row = sqlx::query("SELECT id, owner_id, title, language, created_at FROM code_snippets WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.as_ref().map(snippet_from_row).transpose()
    }

    async fn insert_snippet(&mut self, snippet: &CodeSnippet) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO code_snippets (id, owner_id, title, language, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(snippet.id)
            .bind(snippet.owner_id)
            .bind(&snippet.title)
            .bind(&snippet.language)
            .bind(snippet.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn page(&mut self, id: Uuid) -> Result<Option<Page>, StoreError> {
        let row = sqlx::query("SELECT id, owner_id, title, created_at FROM pages WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        match row {
            Some(row) => Ok(Some(Page {
                id: row.try_get("id").map_err(db_err)?,
                owner_id: row.try_get("owner_id").map_err(db_err)?,
                title: row.try_get("title").map_err(db_err)?,
                created_at: row.try_get("created_at").map_err(db_err)?,
            })),
            None => Ok(None),
        }
    }

    async fn insert_page(&mut self, page: &Page) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO pages (id, owner_id, title, created_at) VALUES ($1, $2, $3, $4)")
            .bind(page.id)
            .bind(page.owner_id)
            .bind(&page.title)
            .bind(page.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn snippet_feed(
        &mut self,
        owner_id: Option<Uuid>,
        sort: SnippetSort,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SnippetSummary>, StoreError> {
        let order_by = match sort {
            SnippetSort::Latest => "s.created_at DESC, s.id DESC",
            SnippetSort::Popular => "like_count DESC, s.created_at DESC, s.id DESC",
            SnippetSort::Title => "lower(s.title) ASC, s.id ASC",
        };
        let sql = format!(
            "SELECT s.id, s.owner_id, s.title, s.language, s.created_at, \
                    (SELECT COUNT(*) FROM likes l WHERE l.snippet_id = s.id) AS like_count, \
                    (SELECT COUNT(*) FROM comments c WHERE c.snippet_id = s.id) AS comment_count \
             FROM code_snippets s \
             WHERE ($1::uuid IS NULL OR s.owner_id = $1) \
             ORDER BY {order_by} \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id)
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| -> Result<SnippetSummary, StoreError> {
                let like_count: i64 = row.try_get("like_count").map_err(db_err)?;
                let comment_count: i64 = row.try_get("comment_count").map_err(db_err)?;
                Ok(SnippetSummary {
                    snippet: snippet_from_row(row)?,
                    like_count: like_count.max(0) as u64,
                    comment_count: comment_count.max(0) as u64,
                })
            })
            .collect()
    }

    async fn count_snippets(&mut self, owner_id: Option<Uuid>) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM code_snippets WHERE ($1::uuid IS NULL OR owner_id = $1)")
                .bind(owner_id)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(db_err)?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl InteractionRepo for PgUnitOfWork {
    async fn like_by(&mut self, user_id: Uuid, target: LikeTarget) -> Result<Option<Like>, StoreError> {
        let sql = format!("SELECT {LIKE_COLUMNS} FROM likes WHERE user_id = $1 AND {} = $2", target_filter(target));
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(target.id())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.as_ref().map(like_from_row).transpose()
    }

    async fn insert_like(&mut self, like: &Like) -> Result<(), StoreError> {
        let (snippet_id, page_id) = target_columns(like.target);
        sqlx::query("INSERT INTO likes (id, user_id, snippet_id, page_id, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(like.id)
            .bind(like.user_id)
            .bind(snippet_id)
            .bind(page_id)
            .bind(like.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_like(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM likes WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn likes_on(&mut self, target: LikeTarget) -> Result<Vec<Like>, StoreError> {
        let sql = format!("SELECT {LIKE_COLUMNS} FROM likes WHERE {} = $1 ORDER BY created_at ASC", target_filter(target));
        let rows = sqlx::query(&sql)
            .bind(target.id())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_err)?;
        rows.iter().map(like_from_row).collect()
    }

    async fn count_likes(&mut self, target: LikeTarget) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) AS n FROM likes WHERE {} = $1", target_filter(target));
        let row = sqlx::query(&sql)
            .bind(target.id())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)?;
        let n: i64 = row.try_get("n").map_err(db_err)?;
        Ok(n.max(0) as u64)
    }

    async fn comment(&mut self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        let row = sqlx::query("SELECT id, snippet_id, author_id, content, created_at FROM comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.as_ref().map(comment_from_row).transpose()
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO comments (id, snippet_id, author_id, content, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(comment.id)
            .bind(comment.snippet_id)
            .bind(comment.author_id)
            .bind(&comment.content)
            .bind(comment.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_comment(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn comments_on(&mut self, snippet_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, snippet_id, author_id, content, created_at FROM comments WHERE snippet_id = $1 ORDER BY created_at DESC",
        )
        .bind(snippet_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;
        rows.iter().map(comment_from_row).collect()
    }

    async fn count_comments(&mut self, snippet_id: Uuid) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM comments WHERE snippet_id = $1")
            .bind(snippet_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_err)?;
        let n: i64 = row.try_get("n").map_err(db_err)?;
        Ok(n.max(0) as u64)
    }

    async fn user_tag(&mut self, id: Uuid) -> Result<Option<UserTag>, StoreError> {
        let row = sqlx::query("SELECT id, snippet_id, tagged_user_id, tagger_id, created_at FROM user_tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.as_ref().map(user_tag_from_row).transpose()
    }

    async fn insert_user_tag(&mut self, tag: &UserTag) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO user_tags (id, snippet_id, tagged_user_id, tagger_id, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(tag.id)
        .bind(tag.snippet_id)
        .bind(tag.tagged_user_id)
        .bind(tag.tagger_id)
        .bind(tag.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete_user_tag(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM user_tags WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn user_tags_on(&mut self, snippet_id: Uuid) -> Result<Vec<UserTag>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, snippet_id, tagged_user_id, tagger_id, created_at FROM user_tags \
             WHERE snippet_id = $1 ORDER BY created_at DESC",
        )
        .bind(snippet_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;
        rows.iter().map(user_tag_from_row).collect()
    }
}
