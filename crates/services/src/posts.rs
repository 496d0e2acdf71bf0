//! Post use cases: list, read, create, update, delete.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use domains::{
    AppError, CommentRepository, Post, PostDetail, PostFilter, PostId, PostPatch,
    PostRepository, PostSummary, Principal, RepoError, Result, Topic, TopicId, UserId,
    UserRepository, UserSummary,
};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::ownership::ensure_owner;
use crate::pagination::{Page, PageRequest, PaginationConfig};
use crate::topics::TopicResolver;
use crate::validation::Validator;

pub const TITLE_LEN: (usize, usize) = (3, 100);
pub const BODY_LEN: (usize, usize) = (3, 10_000);
pub const TOPIC_LEN: (usize, usize) = (1, 50);

/// Raw query string of `GET /posts`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPostsQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub topic: Option<String>,
    pub userid: Option<String>,
}

/// Raw body of `POST /posts` and `PUT /posts/{postid}`.
///
/// On create `topic` is a free-text name; on update it is the identifier
/// of an existing topic.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostInput {
    pub title: Option<String>,
    pub body: Option<String>,
    pub topic: Option<String>,
}

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    users: Arc<dyn UserRepository>,
    topics: TopicResolver,
    pagination: PaginationConfig,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
        users: Arc<dyn UserRepository>,
        topics: TopicResolver,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            posts,
            comments,
            users,
            topics,
            pagination,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, query: ListPostsQuery) -> Result<Page<PostSummary>> {
        let mut v = Validator::new();
        let page = v.field("page", query.page).optional().trim().into_integer();
        let limit = v.field("limit", query.limit).optional().trim().into_integer();
        let topic = v
            .field("topic", query.topic)
            .optional()
            .trim()
            .into_optional_id::<TopicId>();
        let author = v
            .field("userid", query.userid)
            .optional()
            .trim()
            .into_optional_id::<UserId>();
        let (request, filter) = v.finish((PageRequest { page, limit }, PostFilter { topic, author }))?;

        let total = self.posts.count(&filter).await?;
        let window = self.pagination.resolve(request, total);
        let posts = if window.limit == 0 {
            Vec::new()
        } else {
            self.posts.list(&filter, window).await?
        };

        let mut refs = References::default();
        let mut items = Vec::with_capacity(posts.len());
        for post in posts {
            let author = refs.author(self, post.author).await?;
            let topic = refs.topic(self, post.topic).await?;
            items.push(PostSummary {
                id: post.id,
                author,
                title: post.title,
                body: post.body,
                topic,
                created_at: post.created_at,
                comments: post.comments,
            });
        }

        Ok(Page {
            items,
            total,
            window,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, raw_id: String) -> Result<PostDetail> {
        let mut v = Validator::new();
        let id: PostId = v.field("postid", Some(raw_id)).trim().into_id();
        let id = v.finish(id)?;

        let post = self.load(id).await?;

        let mut comments = Vec::with_capacity(post.comments.len());
        for comment_id in &post.comments {
            if let Some(comment) = self.comments.find_by_id(*comment_id).await? {
                comments.push(comment);
            }
        }

        let mut refs = References::default();
        Ok(PostDetail {
            id: post.id,
            author: refs.author(self, post.author).await?,
            title: post.title,
            body: post.body,
            topic: refs.topic(self, post.topic).await?,
            created_at: post.created_at,
            comments,
        })
    }

    /// Creates a post owned by `principal`, resolving the topic name to an
    /// existing or freshly created topic.
    #[instrument(skip(self, input), fields(user = %principal.user_id))]
    pub async fn create(&self, principal: &Principal, input: PostInput) -> Result<Post> {
        let mut v = Validator::new();
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
        let topic = v
            .field("topic", input.topic)
            .trim()
            .length(TOPIC_LEN.0, TOPIC_LEN.1)
            .lookup(|name| async move {
                self.topics
                    .find_or_create(&name)
                    .await
                    .map(Ok::<_, String>)
            })
            .await?;
        let (title, body, topic) = v.finish((title, body, topic))?;
        let topic = topic.ok_or_else(|| AppError::invalid("topic", "could not be resolved"))?;

        let post = Post {
            id: PostId::new(),
            author: principal.user_id,
            title,
            body,
            topic,
            created_at: Utc::now(),
            comments: Vec::new(),
        };

        self.posts.create(&post).await.map_err(|err| match err {
            RepoError::MissingReference(_) => {
                AppError::Unauthorized("account no longer exists".to_string())
            }
            other => other.into(),
        })?;

        info!(post = %post.id, topic = %post.topic, "created post");
        Ok(post)
    }

    /// Applies the present fields of `input`. Only the author may update.
    #[instrument(skip(self, input), fields(user = %principal.user_id))]
    pub async fn update(
        &self,
        principal: &Principal,
        raw_id: String,
        input: PostInput,
    ) -> Result<Post> {
        let mut v = Validator::new();
        let id: PostId = v.field("postid", Some(raw_id)).trim().into_id();
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
        let topic = v
            .field("topic", input.topic)
            .optional()
            .trim()
            .lookup(|raw| self.existing_topic(raw))
            .await?;
        let (id, patch) = v.finish((id, PostPatch { title, body, topic }))?;

        let existing = self.load(id).await?;
        ensure_owner(principal, existing.author, "post")?;
        if patch.is_empty() {
            return Ok(existing);
        }

        let updated = self
            .posts
            .update(id, &patch)
            .await?
            .ok_or_else(|| AppError::not_found("post", id))?;
        info!(post = %id, "updated post");
        Ok(updated)
    }

    /// Deletes a post and its comments. Only the author may delete.
    #[instrument(skip(self), fields(user = %principal.user_id))]
    pub async fn delete(&self, principal: &Principal, raw_id: String) -> Result<Post> {
        let mut v = Validator::new();
        let id: PostId = v.field("postid", Some(raw_id)).trim().into_id();
        let id = v.finish(id)?;

        let existing = self.load(id).await?;
        ensure_owner(principal, existing.author, "post")?;

        let deleted = self
            .posts
            .delete(id)
            .await?
            .ok_or_else(|| AppError::not_found("post", id))?;
        info!(post = %id, comments = deleted.comments.len(), "deleted post");
        Ok(deleted)
    }

    pub async fn topics(&self) -> Result<Vec<Topic>> {
        self.topics.list().await
    }

    /// Store-backed rule for update paths: the id must already exist.
    async fn existing_topic(&self, raw: String) -> Result<std::result::Result<TopicId, String>> {
        let Ok(id) = raw.parse::<TopicId>() else {
            return Ok(Err("must be a valid identifier".to_string()));
        };
        if self.topics.exists(id).await? {
            Ok(Ok(id))
        } else {
            Ok(Err("does not name an existing topic".to_string()))
        }
    }

    async fn load(&self, id: PostId) -> Result<Post> {
        self.posts
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("post", id))
    }
}

/// Per-request cache of expanded authors and topics.
#[derive(Default)]
struct References {
    authors: HashMap<UserId, Option<UserSummary>>,
    topics: HashMap<TopicId, Option<Topic>>,
}

impl References {
    async fn author(&mut self, service: &PostService, id: UserId) -> Result<Option<UserSummary>> {
        if let Some(cached) = self.authors.get(&id) {
            return Ok(cached.clone());
        }
        let summary = service
            .users
            .find_by_id(id)
            .await?
            .as_ref()
            .map(UserSummary::from);
        self.authors.insert(id, summary.clone());
        Ok(summary)
    }

    async fn topic(&mut self, service: &PostService, id: TopicId) -> Result<Option<Topic>> {
        if let Some(cached) = self.topics.get(&id) {
            return Ok(cached.clone());
        }
        let topic = service.topics.find(id).await?;
        self.topics.insert(id, topic.clone());
        Ok(topic)
    }
}
