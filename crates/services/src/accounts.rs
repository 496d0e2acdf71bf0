//! Registration, login and token-based identity.

use std::sync::Arc;

use chrono::Utc;
use domains::{
    AppError, CredentialHasher, IssuedToken, Principal, Result, TokenService, User, UserId,
    UserProfile, UserRepository,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::validation::Validator;

pub const USERNAME_LEN: (usize, usize) = (3, 30);
pub const EMAIL_LEN: (usize, usize) = (3, 100);
pub const PASSWORD_LEN: (usize, usize) = (8, 128);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    pub username: Option<String>,
    pub password: Option<String>,
}

pub struct AccountService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenService>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            users,
            hasher,
            tokens,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn register(&self, input: RegisterInput) -> Result<UserProfile> {
        let mut v = Validator::new();
        let username = v
            .field("username", input.username)
            .trim()
            .length(USERNAME_LEN.0, USERNAME_LEN.1)
            .into_string();
        let email = v
            .field("email", input.email)
            .trim()
            .lowercase()
            .length(EMAIL_LEN.0, EMAIL_LEN.1)
            .email()
            .into_string();
        let password = v
            .field("password", input.password)
            .redact()
            .length(PASSWORD_LEN.0, PASSWORD_LEN.1)
            .into_string();
        if username.chars().any(char::is_whitespace) {
            v.reject("username", "must not contain whitespace");
        }
        let (username, email, password) = v.finish((username, email, password))?;

        let user = User {
            id: UserId::new(),
            username,
            email,
            password_hash: self.hasher.hash(&password).await?,
            posts: Vec::new(),
            created_at: Utc::now(),
        };
        self.users.create(&user).await?;

        info!(user = %user.id, username = %user.username, "registered user");
        Ok(user.into())
    }

    /// Verifies credentials and issues a bearer token. Unknown usernames and
    /// wrong passwords are indistinguishable to the caller.
    #[instrument(skip(self, input))]
    pub async fn login(&self, input: LoginInput) -> Result<IssuedToken> {
        let mut v = Validator::new();
        let username = v.field("username", input.username).trim().into_string();
        let password = v.field("password", input.password).redact().into_string();
        let (username, password) = v.finish((username, password))?;

        let rejected = || AppError::Unauthorized("invalid username or password".to_string());

        let Some(user) = self.users.find_by_username(&username).await? else {
            warn!(%username, "login for unknown user");
            return Err(rejected());
        };
        if !self.hasher.verify(&password, &user.password_hash).await? {
            warn!(user = %user.id, "login with wrong password");
            return Err(rejected());
        }

        Ok(self.tokens.issue(&user)?)
    }

    /// Resolves a bearer token to its principal.
    pub fn authenticate(&self, token: &str) -> Result<Principal> {
        Ok(self.tokens.authenticate(token)?)
    }

    pub async fn profile(&self, principal: &Principal) -> Result<UserProfile> {
        self.users
            .find_by_id(principal.user_id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| AppError::not_found("user", principal.user_id))
    }
}
