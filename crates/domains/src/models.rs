//! # Domain Models
//!
//! These structs represent the core entities of the blog: users, the posts
//! they author, comments left on those posts and the topics posts are filed
//! under. Identifiers are random UUIDs wrapped in per-entity newtypes so a
//! `PostId` can never be handed to a comment lookup by mistake.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Identifies a registered user.
    UserId
);
entity_id!(
    /// Identifies a blog post.
    PostId
);
entity_id!(
    /// Identifies a comment on a post.
    CommentId
);
entity_id!(
    /// Identifies a topic.
    TopicId
);

/// A registered account. Owns the posts listed in `posts`, in creation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string. Never leaves the process.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub posts: Vec<PostId>,
    pub created_at: DateTime<Utc>,
}

/// A blog post. `author` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author: UserId,
    pub title: String,
    pub body: String,
    pub topic: TopicId,
    pub created_at: DateTime<Utc>,
    /// Comments in the order they were created.
    pub comments: Vec<CommentId>,
}

/// A comment left on a post by an email-identified visitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post: PostId,
    pub email: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A topic label. Names are unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub name: String,
}

/// Public face of a user when embedded in another resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// A user's own view of their account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub posts: Vec<PostId>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            posts: user.posts,
            created_at: user.created_at,
        }
    }
}

/// A post as it appears in listings: author and topic expanded, comments
/// left as identifiers. A dangling reference expands to `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    pub id: PostId,
    pub author: Option<UserSummary>,
    pub title: String,
    pub body: String,
    pub topic: Option<Topic>,
    pub created_at: DateTime<Utc>,
    pub comments: Vec<CommentId>,
}

/// A single post with author, topic and comments expanded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostDetail {
    pub id: PostId,
    pub author: Option<UserSummary>,
    pub title: String,
    pub body: String,
    pub topic: Option<Topic>,
    pub created_at: DateTime<Utc>,
    pub comments: Vec<Comment>,
}

/// Fields of a post that may change after creation. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub topic: Option<TopicId>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.topic.is_none()
    }

    /// Applies the present fields to `post`.
    pub fn apply_to(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title.clone_from(title);
        }
        if let Some(body) = &self.body {
            post.body.clone_from(body);
        }
        if let Some(topic) = self.topic {
            post.topic = topic;
        }
    }
}

/// Fields of a comment that may change after creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentPatch {
    pub email: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
}

impl CommentPatch {
    pub fn apply_to(&self, comment: &mut Comment) {
        if let Some(email) = &self.email {
            comment.email.clone_from(email);
        }
        if let Some(title) = &self.title {
            comment.title.clone_from(title);
        }
        if let Some(body) = &self.body {
            comment.body.clone_from(body);
        }
    }
}

/// Narrows a post listing. Both fields combine with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub topic: Option<TopicId>,
    pub author: Option<UserId>,
}

impl PostFilter {
    pub fn matches(&self, post: &Post) -> bool {
        self.topic.map_or(true, |topic| post.topic == topic)
            && self.author.map_or(true, |author| post.author == author)
    }
}

/// A resolved slice of a listing: skip `skip` documents, return at most
/// `limit`. `page` is the zero-based page index the window was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub page: u64,
    pub skip: u64,
    pub limit: u64,
}

/// The authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
}

/// A freshly issued bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    /// Lifetime in seconds.
    pub expires_in: i64,
}
