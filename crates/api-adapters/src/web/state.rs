use std::sync::Arc;

use domains::{
    CommentRepository, CredentialHasher, PostRepository, TokenService, TopicRepository,
    UserRepository,
};
use services::{AccountService, CommentService, PaginationConfig, PostService, TopicResolver};

/// Shared handler state. Cloning is cheap: every service sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub accounts: Arc<AccountService>,
}

impl AppState {
    /// Wires every service over one store implementing all repositories.
    pub fn from_store<S>(
        store: Arc<S>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenService>,
        pagination: PaginationConfig,
    ) -> Self
    where
        S: PostRepository + CommentRepository + TopicRepository + UserRepository + 'static,
    {
        let posts: Arc<dyn PostRepository> = store.clone();
        let comments: Arc<dyn CommentRepository> = store.clone();
        let topics: Arc<dyn TopicRepository> = store.clone();
        let users: Arc<dyn UserRepository> = store;

        Self {
            posts: Arc::new(PostService::new(
                posts.clone(),
                comments.clone(),
                users.clone(),
                TopicResolver::new(topics),
                pagination,
            )),
            comments: Arc::new(CommentService::new(comments, posts, pagination)),
            accounts: Arc::new(AccountService::new(users, hasher, tokens)),
        }
    }
}
