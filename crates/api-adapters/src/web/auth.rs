//! Bearer-token extractor for protected routes.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use domains::{AppError, AuthError, Principal};

use super::error::ApiError;
use super::state::AppState;

/// The caller's principal, resolved from `Authorization: Bearer <token>`.
/// Extraction fails with 401 when the header is missing or the token does
/// not verify.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::from(AuthError::MissingCredential))?;

        let principal = state.accounts.authenticate(token)?;
        Ok(Self(principal))
    }
}
