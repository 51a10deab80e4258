//! # Auth Service
//!
//! Credential lookup against the configured account list, with the signed-in
//! user kept in session storage under [`CURRENT_USER_KEY`] as JSON.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared::{AuthUser, Subject, UserRole};
use std::sync::Arc;
use tracing::{info, warn};

use crate::storage::SessionStorage;

pub const CURRENT_USER_KEY: &str = "currentUser";

/// One portal account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: UserRole,
    /// Codes of the subjects a faculty member teaches
    #[serde(default)]
    pub subjects: Vec<String>,
}

impl AccountConfig {
    fn to_user(&self) -> AuthUser {
        AuthUser {
            id: self.id.clone(),
            email: self.email.clone(),
            role: self.role,
            name: self.name.clone(),
        }
    }
}

pub fn default_accounts() -> Vec<AccountConfig> {
    vec![
        AccountConfig {
            id: "1".to_string(),
            email: "faculty@portal.local".to_string(),
            name: "Dr. Amit Sharma".to_string(),
            password: "change-me-faculty".to_string(),
            role: UserRole::Faculty,
            subjects: vec!["CS301".to_string(), "CS401".to_string()],
        },
        AccountConfig {
            id: "2".to_string(),
            email: "admin@portal.local".to_string(),
            name: "Prof. Admin".to_string(),
            password: "change-me-admin".to_string(),
            role: UserRole::Admin,
            subjects: vec![
                "CS201".to_string(),
                "CS302".to_string(),
                "CS301".to_string(),
                "CS401".to_string(),
            ],
        },
    ]
}

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<Vec<AccountConfig>>,
    session: Arc<dyn SessionStorage>,
}

impl AuthService {
    pub fn new(accounts: Vec<AccountConfig>, session: Arc<dyn SessionStorage>) -> Self {
        Self {
            accounts: Arc::new(accounts),
            session,
        }
    }

    /// Check credentials and remember the user on success
    pub fn login(&self, email: &str, password: &str) -> Result<Option<AuthUser>> {
        let email = email.trim();
        let account = self
            .accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email) && a.password == password);

        match account {
            Some(account) => {
                let user = account.to_user();
                self.set_current_user(Some(&user))?;
                info!("Logged in {} as {:?}", user.email, user.role);
                Ok(Some(user))
            }
            None => {
                warn!("Invalid email or password for {}", email);
                Ok(None)
            }
        }
    }

    pub fn get_current_user(&self) -> Result<Option<AuthUser>> {
        let Some(json) = self.session.get_item(CURRENT_USER_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!("Discarding unreadable stored user: {}", e);
                self.session.remove_item(CURRENT_USER_KEY)?;
                Ok(None)
            }
        }
    }

    pub fn set_current_user(&self, user: Option<&AuthUser>) -> Result<()> {
        match user {
            Some(user) => {
                let json = serde_json::to_string(user).context("Failed to serialize user")?;
                self.session.set_item(CURRENT_USER_KEY, &json)
            }
            None => self.session.remove_item(CURRENT_USER_KEY),
        }
    }

    pub fn logout(&self) -> Result<()> {
        info!("Logging out");
        self.set_current_user(None)
    }

    /// Subjects the user may mark: all of them for admins, the configured
    /// codes for faculty
    pub fn subjects_for(&self, user: &AuthUser, subjects: &[Subject]) -> Vec<Subject> {
        if user.role == UserRole::Admin {
            return subjects.to_vec();
        }
        let Some(account) = self.accounts.iter().find(|a| a.id == user.id) else {
            return Vec::new();
        };
        subjects
            .iter()
            .filter(|s| account.subjects.iter().any(|code| code == &s.code))
            .cloned()
            .collect()
    }
}
