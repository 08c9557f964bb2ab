//! Session information

use serde::Serialize;

use crate::model::users::{Role, User};

/// Lifecycle state derived from a session snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated,
    Failed,
}

/// Session snapshot
///
/// This is what every view reads. `role` is a copy of `user.role` taken at login or restore and
/// it is never touched by profile updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// Authenticated user
    pub user: Option<User>,
    /// Opaque credential, meaningful only to the authentication service
    pub token: Option<String>,
    /// Role fixed at the moment of authentication
    pub role: Option<Role>,
    /// Epoch millis when this session started
    pub login_time: Option<i64>,
    /// Login request in flight
    pub is_loading: bool,
    /// Last login failure message
    pub error: Option<String>,
    /// Informational message for the login view (eg. session expired)
    pub notice: Option<String>,
}

impl Session {
    /// Builds an authenticated session
    pub fn authenticated(user: User, token: String, login_time: i64) -> Self {
        Self {
            role: Some(user.role.clone()),
            user: Some(user),
            token: Some(token),
            login_time: Some(login_time),
            ..Default::default()
        }
    }

    /// True iff both the user and a non-empty token are present
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.as_deref().is_some_and(|token| !token.is_empty())
    }

    pub fn state(&self) -> SessionState {
        if self.is_authenticated() {
            SessionState::Authenticated
        } else if self.is_loading {
            SessionState::Authenticating
        } else if self.error.is_some() {
            SessionState::Failed
        } else {
            SessionState::Anonymous
        }
    }
}

/// Durable projection of an authenticated session
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSession {
    pub token: String,
    pub user: User,
    /// Epoch millis
    pub login_time: i64,
    pub remember_me: bool,
}

impl From<PersistedSession> for Session {
    fn from(record: PersistedSession) -> Self {
        Session::authenticated(record.user, record.token, record.login_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::users::UserId;

    #[test]
    fn states() {
        let mut session = Session::default();
        assert_eq!(session.state(), SessionState::Anonymous);

        session.is_loading = true;
        assert_eq!(session.state(), SessionState::Authenticating);

        session.is_loading = false;
        session.error = Some("Invalid email or password.".to_owned());
        assert_eq!(session.state(), SessionState::Failed);

        let session = Session::authenticated(User::new(UserId::Number(1), Role::Job), "T1".into(), 0);
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.role, Some(Role::Job));
    }

    #[test]
    fn empty_token_is_not_authenticated() {
        let session = Session::authenticated(User::new(UserId::Number(1), Role::Admin), String::new(), 0);
        assert!(!session.is_authenticated());
    }
}
