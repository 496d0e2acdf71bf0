//! HS256 bearer tokens via `jsonwebtoken`.

use chrono::{Duration, Utc};
use domains::{AuthError, IssuedToken, Principal, TokenService, User, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id as a UUID string.
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtAuthenticator {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }
}

impl TokenService for JwtAuthenticator {
    fn issue(&self, user: &User) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        Ok(IssuedToken {
            token,
            token_type: "Bearer",
            expires_in: self.ttl.num_seconds(),
        })
    }

    fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "rejected bearer token");
            AuthError::InvalidToken(e.to_string())
        })?;
        let user_id: UserId = data
            .claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidToken("subject is not a user id".to_string()))?;
        Ok(Principal {
            user_id,
            username: data.claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: UserId::new(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            posts: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_tokens_authenticate_as_their_user() {
        let auth = JwtAuthenticator::new(b"test-secret", Duration::minutes(5));
        let ada = user();

        let issued = auth.issue(&ada).unwrap();
        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.expires_in, 300);

        let principal = auth.authenticate(&issued.token).unwrap();
        assert_eq!(principal.user_id, ada.id);
        assert_eq!(principal.username, "ada");
    }

    #[test]
    fn foreign_signatures_are_rejected() {
        let ours = JwtAuthenticator::new(b"ours", Duration::minutes(5));
        let theirs = JwtAuthenticator::new(b"theirs", Duration::minutes(5));

        let token = theirs.issue(&user()).unwrap().token;
        assert!(matches!(
            ours.authenticate(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        // well past the default 60s leeway
        let auth = JwtAuthenticator::new(b"secret", Duration::minutes(-10));
        let token = auth.issue(&user()).unwrap().token;
        assert!(auth.authenticate(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let auth = JwtAuthenticator::new(b"secret", Duration::minutes(5));
        assert!(auth.authenticate("not.a.jwt").is_err());
    }
}
