// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Login gate and session persistence

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::store::{KeyValueStore, CURRENT_USER_KEY};
use crate::Result;

/// The authenticated identity of the current user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub logged_in: bool,
}

impl Session {
    fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            logged_in: true,
        }
    }
}

/// Checks a username/password pair
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Fixed username to password table
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    users: BTreeMap<String, String>,
}

impl StaticCredentials {
    pub fn new(users: BTreeMap<String, String>) -> Self {
        Self { users }
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> bool {
        self.users.get(username).is_some_and(|expected| expected == password)
    }
}

/// Owns the current session and its persisted username
pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    verifier: Box<dyn CredentialVerifier>,
    current: Option<Session>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KeyValueStore>, verifier: Box<dyn CredentialVerifier>) -> Self {
        Self {
            store,
            verifier,
            current: None,
        }
    }

    /// Rebuild the session from the persisted username, if any
    pub fn restore_session(&mut self) -> Option<Session> {
        let saved = match self.store.get(CURRENT_USER_KEY) {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Failed to read saved user: {}", e);
                None
            }
        };

        let username = saved.filter(|u| !u.is_empty())?;
        debug!("Restored session for {}", username);
        let session = Session::new(username);
        self.current = Some(session.clone());
        Some(session)
    }

    /// Check credentials and start a session
    ///
    /// The username is trimmed before lookup; the password is compared as given.
    /// A failed attempt leaves any existing session untouched.
    pub fn login(&mut self, username: &str, password: &str) -> Result<Session> {
        let username = username.trim();
        if username.is_empty() || !self.verifier.verify(username, password) {
            info!("Rejected login for '{}'", username);
            return Err(AuthError::InvalidCredentials.into());
        }

        self.store.set(CURRENT_USER_KEY, username)?;
        let session = Session::new(username);
        self.current = Some(session.clone());
        info!("Logged in as {}", username);
        Ok(session)
    }

    /// End the session and forget the persisted username
    pub fn logout(&mut self) -> Result<()> {
        self.store.remove(CURRENT_USER_KEY)?;
        if let Some(session) = self.current.take() {
            info!("Logged out {}", session.username);
        }
        Ok(())
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.current.as_ref().is_some_and(|s| s.logged_in)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::store::MemoryStore;
    use crate::EcoClassError;

    fn manager(store: Arc<dyn KeyValueStore>) -> SessionManager {
        let users = AppConfig::default().auth.users;
        SessionManager::new(store, Box::new(StaticCredentials::new(users)))
    }

    #[test]
    fn test_login_and_restore() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut sessions = manager(store.clone());

        let session = sessions.login("admin", "admin123").unwrap();
        assert_eq!(session.username, "admin");
        assert!(sessions.is_logged_in());

        // fresh manager over the same store, as after a reload
        let mut reloaded = manager(store);
        let restored = reloaded.restore_session().unwrap();
        assert_eq!(restored.username, "admin");
        assert!(restored.logged_in);
    }

    #[test]
    fn test_bad_credentials_leave_state_unchanged() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut sessions = manager(store.clone());

        let attempts = [
            ("admin", "wrong"),
            ("admin", "Admin123"),
            ("admin", "admin123 "),
            ("nobody", "admin123"),
            ("", ""),
            ("user", "admin123"),
        ];
        for (user, pass) in attempts {
            let err = sessions.login(user, pass).unwrap_err();
            assert!(matches!(err, EcoClassError::Auth(AuthError::InvalidCredentials)));
            assert!(!sessions.is_logged_in());
        }
        assert_eq!(store.get(CURRENT_USER_KEY).unwrap(), None);

        // an existing session survives a failed attempt
        sessions.login("user", "123456").unwrap();
        assert!(sessions.login("admin", "nope").is_err());
        assert_eq!(sessions.current().unwrap().username, "user");
        assert_eq!(store.get(CURRENT_USER_KEY).unwrap().as_deref(), Some("user"));
    }

    #[test]
    fn test_username_is_trimmed() {
        let mut sessions = manager(Arc::new(MemoryStore::new()));
        let session = sessions.login("  admin ", "admin123").unwrap();
        assert_eq!(session.username, "admin");
    }

    #[test]
    fn test_logout_clears_persisted_user() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut sessions = manager(store.clone());
        sessions.login("user", "123456").unwrap();

        sessions.logout().unwrap();
        assert!(sessions.current().is_none());
        assert_eq!(store.get(CURRENT_USER_KEY).unwrap(), None);
        assert!(manager(store).restore_session().is_none());
    }

    #[test]
    fn test_restore_on_empty_store() {
        let mut sessions = manager(Arc::new(MemoryStore::new()));
        assert!(sessions.restore_session().is_none());
        assert!(!sessions.is_logged_in());
    }

    struct AllowAll;

    impl CredentialVerifier for AllowAll {
        fn verify(&self, _username: &str, _password: &str) -> bool {
            true
        }
    }

    #[test]
    fn test_custom_verifier() {
        let mut sessions = SessionManager::new(Arc::new(MemoryStore::new()), Box::new(AllowAll));
        assert_eq!(sessions.login("guest", "").unwrap().username, "guest");
    }
}
