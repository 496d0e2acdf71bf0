//! # Core Traits (Ports)
//!
//! Storage and identity adapters implement these traits. Services only ever
//! hold them as `Arc<dyn Trait>`.

use async_trait::async_trait;

use crate::errors::{AuthError, RepoError};
use crate::models::{
    Comment, CommentId, CommentPatch, IssuedToken, PageWindow, Post, PostFilter, PostId,
    PostPatch, Principal, Topic, TopicId, User, UserId,
};

/// Persistence contract for posts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Counts posts matching `filter`.
    async fn count(&self, filter: &PostFilter) -> Result<u64, RepoError>;

    /// Lists posts matching `filter`, newest first, within `window`.
    async fn list(&self, filter: &PostFilter, window: PageWindow) -> Result<Vec<Post>, RepoError>;

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepoError>;

    /// Stores `post` and appends it to its author's post list as one unit.
    /// Fails with `MissingReference` when the author does not exist.
    async fn create(&self, post: &Post) -> Result<(), RepoError>;

    /// Applies `patch` and returns the updated post, or `None` if absent.
    async fn update(&self, id: PostId, patch: &PostPatch) -> Result<Option<Post>, RepoError>;

    /// Removes the post, its comments and the author's reference to it.
    async fn delete(&self, id: PostId) -> Result<Option<Post>, RepoError>;
}

/// Persistence contract for comments.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn count_for_post(&self, post: PostId) -> Result<u64, RepoError>;

    /// Lists a post's comments, oldest first, within `window`.
    async fn list_for_post(
        &self,
        post: PostId,
        window: PageWindow,
    ) -> Result<Vec<Comment>, RepoError>;

    async fn find_by_id(&self, id: CommentId) -> Result<Option<Comment>, RepoError>;

    /// Stores `comment` and appends it to the parent post's comment list.
    /// Fails with `MissingReference` when the parent is gone.
    async fn create(&self, comment: &Comment) -> Result<(), RepoError>;

    async fn update(
        &self,
        id: CommentId,
        patch: &CommentPatch,
    ) -> Result<Option<Comment>, RepoError>;

    /// Removes the comment and unlinks it from its parent post.
    async fn delete(&self, id: CommentId) -> Result<Option<Comment>, RepoError>;
}

/// Persistence contract for topics. Names are unique.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TopicRepository: Send + Sync {
    async fn find_by_id(&self, id: TopicId) -> Result<Option<Topic>, RepoError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Topic>, RepoError>;

    /// Inserts `topic`, failing with `RepoError::Conflict` if the name is taken.
    async fn insert(&self, topic: &Topic) -> Result<(), RepoError>;

    /// All topics, ordered by name.
    async fn list(&self) -> Result<Vec<Topic>, RepoError>;
}

/// Persistence contract for user accounts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepoError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;

    /// Inserts `user`, failing with `RepoError::Conflict` on a taken
    /// username or email.
    async fn create(&self, user: &User) -> Result<(), RepoError>;
}

/// Issues and verifies bearer tokens.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenService: Send + Sync {
    fn issue(&self, user: &User) -> Result<IssuedToken, AuthError>;

    /// Resolves a bearer token to the principal it was issued for.
    fn authenticate(&self, token: &str) -> Result<Principal, AuthError>;
}

/// One-way password hashing.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash(&self, password: &str) -> Result<String, AuthError>;

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;
}
