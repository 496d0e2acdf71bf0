mod fixtures;

use axum::http::{Method, StatusCode};
use fixtures::TestApp;
use serde_json::json;

#[tokio::test]
async fn registration_never_exposes_the_hash() {
    let app = TestApp::new();
    let registered = app
        .send(
            Method::POST,
            "/users",
            None,
            Some(json!({
                "username": "grace",
                "email": "Grace@Example.com",
                "password": "compilers are fun",
            })),
        )
        .await;
    assert_eq!(registered.status, StatusCode::OK);
    assert_eq!(registered.body["username"], "grace");
    assert_eq!(registered.body["email"], "grace@example.com");
    assert!(registered.body.get("password_hash").is_none());
    assert!(registered.body.get("password").is_none());
}

#[tokio::test]
async fn taken_usernames_conflict() {
    let app = TestApp::new();
    let ada = app.user().await;

    let duplicate = app
        .send(
            Method::POST,
            "/users",
            None,
            Some(json!({
                "username": ada.username,
                "email": "someone.else@example.com",
                "password": "another password",
            })),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn weak_registrations_are_rejected_without_echoing_secrets() {
    let app = TestApp::new();
    let rejected = app
        .send(
            Method::POST,
            "/users",
            None,
            Some(json!({ "username": "x", "email": "nope", "password": "short" })),
        )
        .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    let mut fields = rejected.error_fields();
    fields.sort();
    assert_eq!(fields, vec!["email", "password", "username"]);
    assert!(!rejected.body.to_string().contains("short"));
}

#[tokio::test]
async fn login_checks_the_password() {
    let app = TestApp::new();
    let ada = app.user().await;

    let wrong = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": ada.username, "password": "not it at all" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let unknown = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "nobody-here", "password": ada.password })),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body, unknown.body);

    let right = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": ada.username, "password": ada.password })),
        )
        .await;
    assert_eq!(right.status, StatusCode::OK);
    assert_eq!(right.body["token_type"], "Bearer");
    assert_eq!(right.body["expires_in"], 1800);
}

#[tokio::test]
async fn profile_lists_the_callers_posts() {
    let app = TestApp::new();
    let ada = app.user().await;
    let post = app.create_post(&ada, "Mine", "news").await;

    let me = app.send(Method::GET, "/users/me", Some(&ada.token), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["id"], ada.id.as_str());
    assert_eq!(me.body["posts"], json!([post["id"]]));

    let anonymous = app.get("/users/me").await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let forged = app
        .send(Method::GET, "/users/me", Some("not-a-token"), None)
        .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}
