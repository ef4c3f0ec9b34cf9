//! The user aggregate persisted by the account repositories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use docbridge_core::document::Document;

/// Identifier of a [`User`]. Freshly generated ids are v4 UUID strings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new() -> Self {
        UserId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        UserId(value)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

/// An external identity bound to a user, e.g. `auth0|abc123`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Auth {
    pub provider: String,
    pub sub: String,
}

impl Auth {
    /// Builds an auth from a full subject. The provider is the part before the first `|`.
    pub fn from_sub(sub: impl Into<String>) -> Self {
        let sub = sub.into();
        let provider = sub
            .split_once('|')
            .map(|(provider, _)| provider.to_string())
            .unwrap_or_default();

        Auth { provider, sub }
    }
}

/// A pending or completed email verification.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub verified: bool,
}

impl Verification {
    pub fn new(code: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Verification { code: code.into(), expires_at, verified: false }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// An outstanding password reset request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PasswordReset {
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    pub fn new(token: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        PasswordReset { token: token.into(), created_at }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub auths: Vec<Auth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset: Option<PasswordReset>,
}

impl User {
    /// A user with a fresh id and no auths.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        User {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            auths: Vec::new(),
            verification: None,
            password_reset: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<UserId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.add_auth(auth);
        self
    }

    pub fn with_verification(mut self, verification: Verification) -> Self {
        self.verification = Some(verification);
        self
    }

    pub fn with_password_reset(mut self, password_reset: PasswordReset) -> Self {
        self.password_reset = Some(password_reset);
        self
    }

    /// Binds `auth` unless an auth with the same subject is already bound.
    pub fn add_auth(&mut self, auth: Auth) -> bool {
        if self.contains_auth(&auth.sub) {
            return false;
        }

        self.auths.push(auth);
        true
    }

    pub fn contains_auth(&self, sub: &str) -> bool {
        self.auths.iter().any(|auth| auth.sub == sub)
    }

    pub fn has_verification_code(&self, code: &str) -> bool {
        self.verification
            .as_ref()
            .is_some_and(|verification| verification.code == code)
    }

    pub fn has_password_reset_token(&self, token: &str) -> bool {
        self.password_reset
            .as_ref()
            .is_some_and(|reset| reset.token == token)
    }
}

impl Document for User {
    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn collection_name() -> &'static str {
        "users"
    }
}
