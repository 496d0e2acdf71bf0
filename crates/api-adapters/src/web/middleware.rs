//! Standard layers: request ids, request tracing and CORS.

use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderName, Method, Request},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::handlers::TOTAL_COUNT;

pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// CORS for browser clients on other origins. Any origin may read, but only
/// the blog's methods and the headers it consumes are allowed.
pub fn cors_policy() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([TOTAL_COUNT, REQUEST_ID])
        .max_age(Duration::from_secs(3600))
}

/// Wraps `router` so every request gets an `x-request-id` (generated unless
/// the client sent one), a tracing span carrying it, and the id echoed back
/// on the response.
pub fn with_standard_layers(router: Router) -> Router {
    router
        .layer(cors_policy())
        .layer(PropagateRequestIdLayer::new(REQUEST_ID))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(&REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
}
