//! Injected auth state container.
//!
//! Components take a [`SessionStore`] at construction instead of reading
//! ambient global state. Clones share the same session.

use std::sync::Arc;

use parking_lot::RwLock;

/// Wrapper for bearer tokens that keeps them out of logs.
///
/// Debug and Display never show the value; use `expose()` when building
/// the request header.
#[derive(Clone, PartialEq, Eq)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString(••••••••)")
    }
}

impl std::fmt::Display for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "••••••••")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<String>,
    pub token: Option<SecureString>,
}

impl Session {
    /// Authenticated iff both a user id and a non-empty token are present.
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some() && self.token.as_ref().is_some_and(|t| !t.expose().is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticated(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        let store = Self::new();
        store.sign_in(user_id, token);
        store
    }

    pub fn sign_in(&self, user_id: impl Into<String>, token: impl Into<String>) {
        let mut session = self.inner.write();
        session.user_id = Some(user_id.into());
        session.token = Some(SecureString::new(token));
    }

    pub fn sign_out(&self) {
        *self.inner.write() = Session::default();
    }

    /// Install a token without a known user id (e.g. a CLI invocation
    /// that only needs authenticated requests).
    pub fn set_token(&self, token: impl Into<String>) {
        self.inner.write().token = Some(SecureString::new(token));
    }

    pub fn snapshot(&self) -> Session {
        self.inner.read().clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.read().user_id.clone()
    }

    pub fn token(&self) -> Option<SecureString> {
        self.inner.read().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().is_authenticated()
    }
}
