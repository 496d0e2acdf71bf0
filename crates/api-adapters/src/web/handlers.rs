//! Request handlers. Each one extracts raw input, hands it to a service and
//! serializes the outcome; all rules live in the services.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::HeaderName,
    response::IntoResponse,
    Json,
};
use domains::{Comment, IssuedToken, Post, PostDetail, Topic, UserProfile};
use serde::Serialize;
use services::{
    CommentInput, ListCommentsQuery, ListPostsQuery, LoginInput, Page, PostInput, RegisterInput,
};

use super::auth::AuthUser;
use super::error::ApiResult;
use super::state::AppState;

pub const TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");

/// A list body plus the size of the unpaged result set.
fn paged<T: Serialize>(page: Page<T>) -> impl IntoResponse {
    ([(TOTAL_COUNT, page.total.to_string())], Json(page.items))
}

pub async fn health() -> &'static str {
    "OK"
}

// ── Posts ───────────────────────────────────────────────────────────────────

pub async fn list_posts(
    State(state): State<AppState>,
    query: Result<Query<ListPostsQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    Ok(paged(state.posts.list(query).await?))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(postid): Path<String>,
) -> ApiResult<Json<PostDetail>> {
    Ok(Json(state.posts.get(postid).await?))
}

pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    payload: Result<Json<PostInput>, JsonRejection>,
) -> ApiResult<Json<Post>> {
    let Json(input) = payload?;
    Ok(Json(state.posts.create(&principal, input).await?))
}

pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(postid): Path<String>,
    payload: Result<Json<PostInput>, JsonRejection>,
) -> ApiResult<Json<Post>> {
    let Json(input) = payload?;
    Ok(Json(state.posts.update(&principal, postid, input).await?))
}

pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(postid): Path<String>,
) -> ApiResult<Json<Post>> {
    Ok(Json(state.posts.delete(&principal, postid).await?))
}

// ── Comments ────────────────────────────────────────────────────────────────

pub async fn list_comments(
    State(state): State<AppState>,
    Path(postid): Path<String>,
    query: Result<Query<ListCommentsQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    Ok(paged(state.comments.list(postid, query).await?))
}

pub async fn get_comment(
    State(state): State<AppState>,
    Path((postid, commentid)): Path<(String, String)>,
) -> ApiResult<Json<Comment>> {
    Ok(Json(state.comments.get(postid, commentid).await?))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(postid): Path<String>,
    payload: Result<Json<CommentInput>, JsonRejection>,
) -> ApiResult<Json<Comment>> {
    let Json(input) = payload?;
    Ok(Json(state.comments.create(postid, input).await?))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Path((postid, commentid)): Path<(String, String)>,
    payload: Result<Json<CommentInput>, JsonRejection>,
) -> ApiResult<Json<Comment>> {
    let Json(input) = payload?;
    Ok(Json(state.comments.update(postid, commentid, input).await?))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path((postid, commentid)): Path<(String, String)>,
) -> ApiResult<Json<Comment>> {
    Ok(Json(state.comments.delete(postid, commentid).await?))
}

// ── Topics and accounts ─────────────────────────────────────────────────────

pub async fn list_topics(State(state): State<AppState>) -> ApiResult<Json<Vec<Topic>>> {
    Ok(Json(state.posts.topics().await?))
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterInput>, JsonRejection>,
) -> ApiResult<Json<UserProfile>> {
    let Json(input) = payload?;
    Ok(Json(state.accounts.register(input).await?))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> ApiResult<Json<IssuedToken>> {
    let Json(input) = payload?;
    Ok(Json(state.accounts.login(input).await?))
}

pub async fn me(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.accounts.profile(&principal).await?))
}
