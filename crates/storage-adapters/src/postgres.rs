//! # PostgreSQL store
//!
//! Maps the relational model onto the domain models. Link lists
//! (`User::posts`, `Post::comments`) are not stored; they are derived from
//! the foreign keys at read time, so a row insert or delete is the whole
//! link update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    Comment, CommentId, CommentPatch, CommentRepository, PageWindow, Post, PostFilter, PostId,
    PostPatch, PostRepository, RepoError, Topic, TopicId, TopicRepository, User, UserId,
    UserRepository,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            UUID PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS topics (
    id   UUID PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS posts (
    id         UUID PRIMARY KEY,
    author     UUID NOT NULL REFERENCES users(id),
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    topic      UUID NOT NULL REFERENCES topics(id),
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS posts_listing ON posts (created_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS posts_author ON posts (author);
CREATE INDEX IF NOT EXISTS posts_topic ON posts (topic);

CREATE TABLE IF NOT EXISTS comments (
    id         UUID PRIMARY KEY,
    post       UUID NOT NULL REFERENCES posts(id),
    email      TEXT NOT NULL,
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS comments_post ON comments (post, created_at, id);
"#;

const SELECT_POST: &str = "SELECT p.id, p.author, p.title, p.body, p.topic, p.created_at, \
     ARRAY(SELECT c.id FROM comments c WHERE c.post = p.id ORDER BY c.created_at, c.id) AS comment_ids \
     FROM posts p";

const SELECT_USER: &str = "SELECT u.id, u.username, u.email, u.password_hash, u.created_at, \
     ARRAY(SELECT p.id FROM posts p WHERE p.author = u.id ORDER BY p.created_at, p.id) AS post_ids \
     FROM users u";

const SELECT_COMMENT: &str = "SELECT id, post, email, title, body, created_at FROM comments";

const FILTER: &str = "($1::uuid IS NULL OR p.topic = $1) AND ($2::uuid IS NULL OR p.author = $2)";

pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    post_ids: Vec<Uuid>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id.into(),
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            posts: row.post_ids.into_iter().map(PostId::from).collect(),
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    author: Uuid,
    title: String,
    body: String,
    topic: Uuid,
    created_at: DateTime<Utc>,
    comment_ids: Vec<Uuid>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id.into(),
            author: row.author.into(),
            title: row.title,
            body: row.body,
            topic: row.topic.into(),
            created_at: row.created_at,
            comments: row.comment_ids.into_iter().map(CommentId::from).collect(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    post: Uuid,
    email: String,
    title: String,
    body: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id.into(),
            post: row.post.into(),
            email: row.email,
            title: row.title,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TopicRow {
    id: Uuid,
    name: String,
}

impl From<TopicRow> for Topic {
    fn from(row: TopicRow) -> Self {
        Topic {
            id: row.id.into(),
            name: row.name,
        }
    }
}

/// Translates driver errors into the storage error vocabulary.
fn db_err(err: sqlx::Error) -> RepoError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepoError::Conflict(db.message().to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            RepoError::MissingReference(db.message().to_string())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => RepoError::Connection(err.to_string()),
        _ => RepoError::Query(err.to_string()),
    }
}

/// Postgres takes LIMIT/OFFSET as BIGINT.
fn as_bigint(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepoError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(db_err)?;
        info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates tables and indexes that do not exist yet.
    pub async fn bootstrap_schema(&self) -> Result<(), RepoError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        debug!("schema ready");
        Ok(())
    }
}

#[async_trait]
impl PostRepository for PgStore {
    async fn count(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM posts p WHERE {FILTER}"))
            .bind(filter.topic.map(|t| *t.as_uuid()))
            .bind(filter.author.map(|a| *a.as_uuid()))
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn list(&self, filter: &PostFilter, window: PageWindow) -> Result<Vec<Post>, RepoError> {
        let sql = format!(
            "{SELECT_POST} WHERE {FILTER} ORDER BY p.created_at DESC, p.id DESC LIMIT $3 OFFSET $4"
        );
        let rows: Vec<PostRow> = sqlx::query_as(&sql)
            .bind(filter.topic.map(|t| *t.as_uuid()))
            .bind(filter.author.map(|a| *a.as_uuid()))
            .bind(as_bigint(window.limit))
            .bind(as_bigint(window.skip))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepoError> {
        let row: Option<PostRow> = sqlx::query_as(&format!("{SELECT_POST} WHERE p.id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Post::from))
    }

    /// The author row is share-locked for the duration of the insert so it
    /// cannot vanish between the check and the write.
    async fn create(&self, post: &Post) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let author: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR KEY SHARE")
                .bind(*post.author.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        if author.is_none() {
            return Err(RepoError::MissingReference(format!("user {}", post.author)));
        }

        sqlx::query(
            "INSERT INTO posts (id, author, title, body, topic, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(*post.id.as_uuid())
        .bind(*post.author.as_uuid())
        .bind(&post.title)
        .bind(&post.body)
        .bind(*post.topic.as_uuid())
        .bind(post.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn update(&self, id: PostId, patch: &PostPatch) -> Result<Option<Post>, RepoError> {
        let updated = sqlx::query(
            "UPDATE posts SET title = COALESCE($2, title), body = COALESCE($3, body), \
             topic = COALESCE($4, topic) WHERE id = $1",
        )
        .bind(*id.as_uuid())
        .bind(patch.title.as_deref())
        .bind(patch.body.as_deref())
        .bind(patch.topic.map(|t| *t.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        PostRepository::find_by_id(self, id).await
    }

    async fn delete(&self, id: PostId) -> Result<Option<Post>, RepoError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Conflicts with the key-share lock a comment insert takes on its
        // parent, so no comment can land between the two deletes.
        let row: Option<PostRow> =
            sqlx::query_as(&format!("{SELECT_POST} WHERE p.id = $1 FOR UPDATE OF p"))
                .bind(*id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let Some(post) = row.map(Post::from) else {
            return Ok(None);
        };

        let removed = sqlx::query("DELETE FROM comments WHERE post = $1")
            .bind(*id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        debug!(post = %id, comments = removed.rows_affected(), "removed post with its comments");
        Ok(Some(post))
    }
}

#[async_trait]
impl CommentRepository for PgStore {
    async fn count_for_post(&self, post: PostId) -> Result<u64, RepoError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post = $1")
            .bind(*post.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn list_for_post(
        &self,
        post: PostId,
        window: PageWindow,
    ) -> Result<Vec<Comment>, RepoError> {
        let sql = format!(
            "{SELECT_COMMENT} WHERE post = $1 ORDER BY created_at, id LIMIT $2 OFFSET $3"
        );
        let rows: Vec<CommentRow> = sqlx::query_as(&sql)
            .bind(*post.as_uuid())
            .bind(as_bigint(window.limit))
            .bind(as_bigint(window.skip))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn find_by_id(&self, id: CommentId) -> Result<Option<Comment>, RepoError> {
        let row: Option<CommentRow> = sqlx::query_as(&format!("{SELECT_COMMENT} WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Comment::from))
    }

    async fn create(&self, comment: &Comment) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO comments (id, post, email, title, body, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(*comment.id.as_uuid())
        .bind(*comment.post.as_uuid())
        .bind(&comment.email)
        .bind(&comment.title)
        .bind(&comment.body)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update(
        &self,
        id: CommentId,
        patch: &CommentPatch,
    ) -> Result<Option<Comment>, RepoError> {
        let row: Option<CommentRow> = sqlx::query_as(
            "UPDATE comments SET email = COALESCE($2, email), title = COALESCE($3, title), \
             body = COALESCE($4, body) WHERE id = $1 \
             RETURNING id, post, email, title, body, created_at",
        )
        .bind(*id.as_uuid())
        .bind(patch.email.as_deref())
        .bind(patch.title.as_deref())
        .bind(patch.body.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Comment::from))
    }

    async fn delete(&self, id: CommentId) -> Result<Option<Comment>, RepoError> {
        let row: Option<CommentRow> = sqlx::query_as(
            "DELETE FROM comments WHERE id = $1 \
             RETURNING id, post, email, title, body, created_at",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Comment::from))
    }
}

#[async_trait]
impl TopicRepository for PgStore {
    async fn find_by_id(&self, id: TopicId) -> Result<Option<Topic>, RepoError> {
        let row: Option<TopicRow> = sqlx::query_as("SELECT id, name FROM topics WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Topic::from))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Topic>, RepoError> {
        let row: Option<TopicRow> = sqlx::query_as("SELECT id, name FROM topics WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Topic::from))
    }

    async fn insert(&self, topic: &Topic) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO topics (id, name) VALUES ($1, $2)")
            .bind(*topic.id.as_uuid())
            .bind(&topic.name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Topic>, RepoError> {
        let rows: Vec<TopicRow> = sqlx::query_as("SELECT id, name FROM topics ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Topic::from).collect())
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepoError> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_USER} WHERE u.id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(User::from))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("{SELECT_USER} WHERE u.username = $1"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(User::from))
    }

    async fn create(&self, user: &User) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(*user.id.as_uuid())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
