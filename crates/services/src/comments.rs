//! Comment use cases, always scoped to a parent post.
//!
//! Every operation confirms the parent post exists first and answers
//! not-found otherwise, listing included. A comment reached through the
//! wrong parent is treated as absent.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    AppError, Comment, CommentId, CommentPatch, CommentRepository, PostId, PostRepository,
    RepoError, Result,
};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::pagination::{Page, PageRequest, PaginationConfig};
use crate::validation::Validator;

pub const EMAIL_LEN: (usize, usize) = (3, 100);
pub const TITLE_LEN: (usize, usize) = (3, 100);
pub const BODY_LEN: (usize, usize) = (10, 280);

/// Raw query string of `GET /posts/{postid}/comments`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListCommentsQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Raw body of comment create and update requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentInput {
    pub email: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
}

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
    pagination: PaginationConfig,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        posts: Arc<dyn PostRepository>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            comments,
            posts,
            pagination,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, raw_post: String, query: ListCommentsQuery) -> Result<Page<Comment>> {
        let mut v = Validator::new();
        let post: PostId = v.field("postid", Some(raw_post)).trim().into_id();
        let page = v.field("page", query.page).optional().trim().into_integer();
        let limit = v.field("limit", query.limit).optional().trim().into_integer();
        let (post, request) = v.finish((post, PageRequest { page, limit }))?;

        self.ensure_post(post).await?;

        let total = self.comments.count_for_post(post).await?;
        let window = self.pagination.resolve(request, total);
        let items = if window.limit == 0 {
            Vec::new()
        } else {
            self.comments.list_for_post(post, window).await?
        };
        Ok(Page {
            items,
            total,
            window,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, raw_post: String, raw_comment: String) -> Result<Comment> {
        let (post, comment) = parse_ids(raw_post, raw_comment)?;
        self.ensure_post(post).await?;
        self.load(post, comment).await
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, raw_post: String, input: CommentInput) -> Result<Comment> {
        let mut v = Validator::new();
        let post: PostId = v.field("postid", Some(raw_post)).trim().into_id();
        let email = v
            .field("email", input.email)
            .trim()
            .lowercase()
            .length(EMAIL_LEN.0, EMAIL_LEN.1)
            .email()
            .into_string();
        let title = v
            .field("title", input.title)
            .trim()
            .length(TITLE_LEN.0, TITLE_LEN.1)
            .escape()
            .into_string();
        let body = v
            .field("body", input.body)
            .trim()
            .length(BODY_LEN.0, BODY_LEN.1)
            .escape()
            .into_string();
        let (post, email, title, body) = v.finish((post, email, title, body))?;

        self.ensure_post(post).await?;

        let comment = Comment {
            id: CommentId::new(),
            post,
            email,
            title,
            body,
            created_at: Utc::now(),
        };
        self.comments.create(&comment).await.map_err(|err| match err {
            // parent deleted between the check and the write
            RepoError::MissingReference(_) => AppError::not_found("post", post),
            other => other.into(),
        })?;

        info!(post = %post, comment = %comment.id, "created comment");
        Ok(comment)
    }

    /// Applies the present fields of `input`. Comments carry no owner, so
    /// no ownership check applies.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        raw_post: String,
        raw_comment: String,
        input: CommentInput,
    ) -> Result<Comment> {
        let mut v = Validator::new();
        let post: PostId = v.field("postid", Some(raw_post)).trim().into_id();
        let comment: CommentId = v.field("commentid", Some(raw_comment)).trim().into_id();
        let email = v
            .field("email", input.email)
            .optional()
            .trim()
            .lowercase()
            .length(EMAIL_LEN.0, EMAIL_LEN.1)
            .email()
            .into_optional_string();
        let title = v
            .field("title", input.title)
            .optional()
            .trim()
            .length(TITLE_LEN.0, TITLE_LEN.1)
            .escape()
            .into_optional_string();
        let body = v
            .field("body", input.body)
            .optional()
            .trim()
            .length(BODY_LEN.0, BODY_LEN.1)
            .escape()
            .into_optional_string();
        let (post, comment, patch) =
            v.finish((post, comment, CommentPatch { email, title, body }))?;

        self.ensure_post(post).await?;
        self.load(post, comment).await?;

        let updated = self
            .comments
            .update(comment, &patch)
            .await?
            .ok_or_else(|| AppError::not_found("comment", comment))?;
        info!(comment = %comment, "updated comment");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, raw_post: String, raw_comment: String) -> Result<Comment> {
        let (post, comment) = parse_ids(raw_post, raw_comment)?;
        self.ensure_post(post).await?;
        self.load(post, comment).await?;

        let deleted = self
            .comments
            .delete(comment)
            .await?
            .ok_or_else(|| AppError::not_found("comment", comment))?;
        info!(post = %post, comment = %comment, "deleted comment");
        Ok(deleted)
    }

    async fn ensure_post(&self, post: PostId) -> Result<()> {
        match self.posts.find_by_id(post).await? {
            Some(_) => Ok(()),
            None => Err(AppError::not_found("post", post)),
        }
    }

    async fn load(&self, post: PostId, id: CommentId) -> Result<Comment> {
        self.comments
            .find_by_id(id)
            .await?
            .filter(|comment| comment.post == post)
            .ok_or_else(|| AppError::not_found("comment", id))
    }
}

fn parse_ids(raw_post: String, raw_comment: String) -> Result<(PostId, CommentId)> {
    let mut v = Validator::new();
    let post: PostId = v.field("postid", Some(raw_post)).trim().into_id();
    let comment: CommentId = v.field("commentid", Some(raw_comment)).trim().into_id();
    v.finish((post, comment))
}
