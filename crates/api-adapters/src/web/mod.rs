//! # Axum adapter
//!
//! Routes:
//!
//! | Method | Path                                   | Auth |
//! |--------|----------------------------------------|------|
//! | GET    | `/posts`                               |      |
//! | POST   | `/posts`                               | yes  |
//! | GET    | `/posts/{postid}`                      |      |
//! | PUT    | `/posts/{postid}`                      | yes  |
//! | DELETE | `/posts/{postid}`                      | yes  |
//! | GET    | `/posts/{postid}/comments`             |      |
//! | POST   | `/posts/{postid}/comments`             |      |
//! | GET    | `/posts/{postid}/comments/{commentid}` |      |
//! | PUT    | `/posts/{postid}/comments/{commentid}` |      |
//! | DELETE | `/posts/{postid}/comments/{commentid}` |      |
//! | GET    | `/topics`                              |      |
//! | POST   | `/users`                               |      |
//! | GET    | `/users/me`                            | yes  |
//! | POST   | `/auth/login`                          |      |
//! | GET    | `/health`                              |      |

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};

pub use auth::AuthUser;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

use handlers::*;

/// Builds the complete application router with the standard layers applied.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health))
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{postid}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route(
            "/posts/{postid}/comments",
            get(list_comments).post(create_comment),
        )
        .route(
            "/posts/{postid}/comments/{commentid}",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
        .route("/topics", get(list_topics))
        .route("/users", post(register))
        .route("/users/me", get(me))
        .route("/auth/login", post(login))
        .with_state(state);

    middleware::with_standard_layers(routes)
}
