//! The access gate: a two-state session machine in front of every
//! query, feedback, and history operation.

use std::sync::Arc;

use tracing::{debug, info};

use imagechat_core::error::{Error, Result};
use imagechat_core::traits::UserStore;
use imagechat_core::types::User;

/// Session state, owned by the gate. Downstream components never see it;
/// they receive a resolved `User` or a rejection.
#[derive(Debug, Clone, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated(User),
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }

    /// The authenticated user, or `NotAuthenticated`.
    pub fn authenticated_user(&self) -> Result<&User> {
        match self {
            Session::Authenticated(user) => Ok(user),
            Session::Anonymous => Err(Error::NotAuthenticated),
        }
    }
}

pub struct AccessGate {
    users: Arc<dyn UserStore>,
}

impl AccessGate {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Attempt a login. The prior session state is discarded before the
    /// credential check, so a failed login can never leave another
    /// account's session behind.
    pub fn login(&self, session: &mut Session, email: &str, password: &str) -> Result<User> {
        *session = Session::Anonymous;
        let user = self
            .users
            .verify_credentials(email, password)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        match user {
            Some(user) => {
                info!("user {} logged in", user.id);
                *session = Session::Authenticated(user.clone());
                Ok(user)
            }
            None => {
                debug!("login rejected for {}", email);
                Err(Error::InvalidCredentials)
            }
        }
    }

    /// Unconditional transition to `Anonymous`.
    pub fn logout(&self, session: &mut Session) {
        *session = Session::Anonymous;
    }

    /// Entry-point reset used by the login/signup surfaces.
    pub fn clear(&self, session: &mut Session) {
        *session = Session::Anonymous;
    }

    /// Create an account. Never touches the session: the new user still
    /// has to log in explicitly.
    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        if name.trim().is_empty() {
            return Err(Error::MissingField("name"));
        }
        if email.trim().is_empty() {
            return Err(Error::MissingField("email"));
        }
        if password.is_empty() {
            return Err(Error::MissingField("password"));
        }

        let existing = self
            .users
            .find_by_email(email)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        if existing.is_some() {
            return Err(Error::DuplicateEmail(email.to_string()));
        }

        let user = self
            .users
            .create_user(name, email, password)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        info!("registered user {} ({})", user.id, user.email);
        Ok(user)
    }

    /// Resolve the current user, rejecting anonymous sessions before any
    /// downstream component is invoked.
    pub fn require_user<'a>(&self, session: &'a Session) -> Result<&'a User> {
        session.authenticated_user()
    }
}
