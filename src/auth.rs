// MIT License - Copyright (c) 2026 SafeHome Project

//! Panel authentication and the lockout trial counter.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::constants;
use crate::storage::{Storage, UserRow};

/// Role a panel user logs in as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRole {
    Master,
    Guest,
}

impl LoginRole {
    pub fn username(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Guest => "guest",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Master => "Master",
            Self::Guest => "Guest",
        }
    }
}

/// Credential check collaborator.
pub trait Authenticator: Send + Sync {
    /// `credential` is `None` for a passwordless attempt (guest accounts
    /// may have no password at all — distinct from an empty string).
    fn verify(&self, role: LoginRole, credential: Option<&str>) -> bool;
}

/// [`Authenticator`] backed by the user table in storage.
pub struct StorageAuthenticator {
    storage: Arc<dyn Storage>,
}

impl StorageAuthenticator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

impl Authenticator for StorageAuthenticator {
    fn verify(&self, role: LoginRole, credential: Option<&str>) -> bool {
        let row = match self.storage.get_user(role.username()) {
            Ok(Some(row)) => row,
            Ok(None) => {
                debug!(role = role.label(), "no such panel user");
                return false;
            }
            Err(err) => {
                warn!(error = %err, "user lookup failed");
                return false;
            }
        };
        match (&row.password, credential) {
            (Some(stored), Some(given)) => stored == given,
            (None, None) => true,
            _ => false,
        }
    }
}

/// Tracks login state and the failed-trial counter for the panel.
pub struct LoginManager {
    authenticator: Arc<dyn Authenticator>,
    storage: Arc<dyn Storage>,
    max_trials: u32,
    trials: u32,
    logged_in: Option<LoginRole>,
}

impl LoginManager {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        storage: Arc<dyn Storage>,
        max_trials: u32,
    ) -> Self {
        Self {
            authenticator,
            storage,
            max_trials,
            trials: 0,
            logged_in: None,
        }
    }

    /// Attempt a password login. Failure counts toward the lockout limit.
    pub fn login(&mut self, role: LoginRole, credential: &str) -> bool {
        if self.authenticator.verify(role, Some(credential)) {
            info!(role = role.label(), "panel login succeeded");
            self.trials = 0;
            self.logged_in = Some(role);
            true
        } else {
            self.trials += 1;
            info!(
                role = role.label(),
                trials = self.trials,
                "panel login failed"
            );
            false
        }
    }

    /// Attempt a passwordless (guest) login. Failure does NOT count toward
    /// the lockout limit; the panel reverts to digit entry instead.
    pub fn try_passwordless(&mut self, role: LoginRole) -> bool {
        if self.authenticator.verify(role, None) {
            info!(role = role.label(), "passwordless panel login succeeded");
            self.trials = 0;
            self.logged_in = Some(role);
            true
        } else {
            debug!(role = role.label(), "passwordless login rejected");
            false
        }
    }

    pub fn logout(&mut self) {
        self.logged_in = None;
    }

    /// Reset the failed-trial counter (lock expiry).
    pub fn reset_trials(&mut self) {
        self.trials = 0;
    }

    pub fn is_login_trials_exceeded(&self) -> bool {
        self.trials >= self.max_trials
    }

    pub fn trials_left(&self) -> u32 {
        self.max_trials.saturating_sub(self.trials)
    }

    pub fn current_role(&self) -> Option<LoginRole> {
        self.logged_in
    }

    pub fn is_master(&self) -> bool {
        self.logged_in == Some(LoginRole::Master)
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.is_some()
    }

    /// Commit a new master password. The caller has already verified the
    /// confirmation entry matches.
    pub fn change_master_password(&mut self, new_password: &str) -> bool {
        if new_password.len() != constants::PANEL_PASSWORD_LENGTH
            || !new_password.chars().all(|c| c.is_ascii_digit())
        {
            return false;
        }
        let row = UserRow {
            username: LoginRole::Master.username().to_string(),
            password: Some(new_password.to_string()),
        };
        match self.storage.update_user(&row) {
            Ok(()) => {
                info!("master password changed");
                true
            }
            Err(err) => {
                warn!(error = %err, "failed to persist master password");
                false
            }
        }
    }
}

impl std::fmt::Debug for LoginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginManager")
            .field("trials", &self.trials)
            .field("logged_in", &self.logged_in)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn manager(master_pw: &str, guest_pw: Option<&str>) -> (LoginManager, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        storage.seed_user(UserRow {
            username: "master".to_string(),
            password: Some(master_pw.to_string()),
        });
        storage.seed_user(UserRow {
            username: "guest".to_string(),
            password: guest_pw.map(str::to_string),
        });
        let auth = Arc::new(StorageAuthenticator::new(storage.clone() as Arc<dyn Storage>));
        (
            LoginManager::new(auth, storage.clone() as Arc<dyn Storage>, 3),
            storage,
        )
    }

    #[test]
    fn test_trial_counter_counts_failures_and_resets_on_success() {
        let (mut mgr, _) = manager("1234", None);
        assert!(!mgr.login(LoginRole::Master, "0000"));
        assert!(!mgr.login(LoginRole::Master, "1111"));
        assert_eq!(mgr.trials_left(), 1);
        assert!(!mgr.is_login_trials_exceeded());

        assert!(mgr.login(LoginRole::Master, "1234"));
        assert_eq!(mgr.trials_left(), 3);
        assert!(mgr.is_master());
    }

    #[test]
    fn test_three_failures_exceed_the_limit() {
        let (mut mgr, _) = manager("1234", None);
        for _ in 0..3 {
            assert!(!mgr.login(LoginRole::Master, "0000"));
        }
        assert!(mgr.is_login_trials_exceeded());
    }

    #[test]
    fn test_passwordless_guest_login() {
        let (mut mgr, _) = manager("1234", None);
        assert!(mgr.try_passwordless(LoginRole::Guest));
        assert_eq!(mgr.current_role(), Some(LoginRole::Guest));
        assert!(!mgr.is_master());
    }

    #[test]
    fn test_failed_passwordless_login_does_not_count_a_trial() {
        let (mut mgr, _) = manager("1234", Some("9999"));
        assert!(!mgr.try_passwordless(LoginRole::Guest));
        assert_eq!(mgr.trials_left(), 3);
    }

    #[test]
    fn test_empty_string_is_not_a_none_credential() {
        let (mut mgr, _) = manager("1234", None);
        // Guest has no password; an empty-string credential must not match.
        assert!(!mgr.login(LoginRole::Guest, ""));
    }

    #[test]
    fn test_change_master_password_validates_and_persists() {
        let (mut mgr, storage) = manager("1234", None);
        assert!(!mgr.change_master_password("12a4"));
        assert!(!mgr.change_master_password("123"));
        assert!(mgr.change_master_password("5678"));
        let row = storage.get_user("master").unwrap().unwrap();
        assert_eq!(row.password.as_deref(), Some("5678"));

        storage.set_fail_writes(true);
        assert!(!mgr.change_master_password("0000"));
    }
}
