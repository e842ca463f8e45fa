//! Identity providers: who the journey belongs to.

use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::error::AuthError;

/// Opaque identity of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplies a user id once signed in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    async fn sign_in(&self) -> Result<UserId, AuthError>;

    async fn sign_out(&self);

    fn current_user(&self) -> Option<UserId>;
}

/// Anonymous device identity. Every sign-in yields the same device id, so
/// the remote document outlives the session. The caller persists the id
/// (see `LibSqlDocumentStore::device_id`).
pub struct AnonymousIdentity {
    device_id: UserId,
    current: Mutex<Option<UserId>>,
}

impl AnonymousIdentity {
    pub fn with_device_id(id: impl Into<String>) -> Self {
        Self {
            device_id: UserId::new(id),
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl IdentityProvider for AnonymousIdentity {
    fn name(&self) -> &str {
        "anonymous"
    }

    async fn sign_in(&self) -> Result<UserId, AuthError> {
        let user = self.device_id.clone();
        *lock(&self.current) = Some(user.clone());
        info!(user_id = %user, "Signed in anonymously");
        Ok(user)
    }

    async fn sign_out(&self) {
        if let Some(user) = lock(&self.current).take() {
            info!(user_id = %user, "Signed out");
        }
    }

    fn current_user(&self) -> Option<UserId> {
        lock(&self.current).clone()
    }
}

/// Sign-in with a host-issued custom token of the form `<uid>.<signature>`.
///
/// The signature is opaque here; the host that issued the token vouches for
/// it. Only the shape is checked.
pub struct CustomTokenIdentity {
    token: SecretString,
    current: Mutex<Option<UserId>>,
}

impl CustomTokenIdentity {
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            current: Mutex::new(None),
        }
    }

    fn subject(&self) -> Result<UserId, AuthError> {
        let token = self.token.expose_secret().trim();
        let (uid, signature) = token
            .split_once('.')
            .ok_or_else(|| AuthError::InvalidToken("missing signature segment".to_string()))?;
        if signature.is_empty() {
            return Err(AuthError::InvalidToken("empty signature".to_string()));
        }
        if uid.is_empty()
            || !uid
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(AuthError::InvalidToken("malformed subject".to_string()));
        }
        Ok(UserId::new(uid))
    }
}

#[async_trait]
impl IdentityProvider for CustomTokenIdentity {
    fn name(&self) -> &str {
        "custom_token"
    }

    async fn sign_in(&self) -> Result<UserId, AuthError> {
        let user = self.subject()?;
        *lock(&self.current) = Some(user.clone());
        info!(user_id = %user, "Signed in with custom token");
        Ok(user)
    }

    async fn sign_out(&self) {
        if let Some(user) = lock(&self.current).take() {
            info!(user_id = %user, "Signed out");
        }
    }

    fn current_user(&self) -> Option<UserId> {
        lock(&self.current).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
