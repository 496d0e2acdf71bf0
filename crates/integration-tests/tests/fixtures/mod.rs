//! Shared harness: the full router over a fresh `MemoryStore`, real Argon2
//! hashing and real JWTs.

#![allow(dead_code)]

use std::sync::Arc;

use api_adapters::{router, AppState};
use auth_adapters::{Argon2Hasher, JwtAuthenticator};
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use fake::faker::internet::en::{SafeEmail, Username};
use fake::Fake;
use serde_json::{json, Value};
use services::PaginationConfig;
use storage_adapters::MemoryStore;
use tower::ServiceExt;
use uuid::Uuid;

pub const PAGE_SIZE: u64 = 10;

pub struct TestApp {
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn total_count(&self) -> u64 {
        self.headers["x-total-count"]
            .to_str()
            .unwrap()
            .parse()
            .unwrap()
    }

    pub fn items(&self) -> &Vec<Value> {
        self.body.as_array().expect("list body")
    }

    pub fn error_fields(&self) -> Vec<String> {
        self.body["errors"]
            .as_array()
            .expect("validation body")
            .iter()
            .map(|e| e["field"].as_str().unwrap().to_string())
            .collect()
    }
}

pub struct TestUser {
    pub id: String,
    pub username: String,
    pub password: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let state = AppState::from_store(
            Arc::new(MemoryStore::new()),
            Arc::new(Argon2Hasher::new()),
            Arc::new(JwtAuthenticator::new(
                b"integration-secret",
                chrono::Duration::minutes(30),
            )),
            PaginationConfig::new(PAGE_SIZE),
        );
        Self {
            router: router(state),
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None, None).await
    }

    /// Registers a fresh random user and logs them in.
    pub async fn user(&self) -> TestUser {
        let base: String = Username().fake();
        let base: String = base
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(16)
            .collect();
        let suffix = Uuid::new_v4().simple().to_string();
        let username = format!("{base}_{}", &suffix[..8]);
        let email: String = SafeEmail().fake();
        let email = format!("{}.{email}", &suffix[..8]);
        let password = "correct horse battery".to_string();

        let registered = self
            .send(
                Method::POST,
                "/users",
                None,
                Some(json!({ "username": username, "email": email, "password": password })),
            )
            .await;
        assert_eq!(registered.status, StatusCode::OK, "{:?}", registered.body);

        let login = self
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);

        TestUser {
            id: registered.body["id"].as_str().unwrap().to_string(),
            username,
            password,
            token: login.body["token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn create_post(&self, user: &TestUser, title: &str, topic: &str) -> Value {
        let created = self
            .send(
                Method::POST,
                "/posts",
                Some(&user.token),
                Some(json!({
                    "title": title,
                    "body": format!("Body of {title}"),
                    "topic": topic,
                })),
            )
            .await;
        assert_eq!(created.status, StatusCode::OK, "{:?}", created.body);
        created.body
    }

    pub async fn create_comment(&self, post_id: &str, title: &str) -> Value {
        let created = self
            .send(
                Method::POST,
                &format!("/posts/{post_id}/comments"),
                None,
                Some(json!({
                    "email": "reader@example.com",
                    "title": title,
                    "body": "Thanks for writing this up.",
                })),
            )
            .await;
        assert_eq!(created.status, StatusCode::OK, "{:?}", created.body);
        created.body
    }
}
