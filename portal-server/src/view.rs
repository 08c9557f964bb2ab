//! GraphQL views of the session

use async_graphql::{Enum, Json, SimpleObject};
use session_core::{Decision, Session, SessionState, User};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum State {
    Anonymous,
    Authenticating,
    Authenticated,
    Failed,
}

impl From<SessionState> for State {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Anonymous => Self::Anonymous,
            SessionState::Authenticating => Self::Authenticating,
            SessionState::Authenticated => Self::Authenticated,
            SessionState::Failed => Self::Failed,
        }
    }
}

/// Read-only session snapshot
#[derive(Debug, Clone, SimpleObject)]
pub struct SessionView {
    pub state: State,
    pub authenticated: bool,
    /// Role fixed at login
    pub role: Option<String>,
    /// User profile record
    pub user: Option<Json<User>>,
    /// Epoch millis of the session start
    pub login_time: Option<i64>,
    pub loading: bool,
    /// Login failure message
    pub error: Option<String>,
    /// Informational message, eg. session expiry
    pub notice: Option<String>,
}

impl From<Session> for SessionView {
    fn from(session: Session) -> Self {
        Self {
            state: session.state().into(),
            authenticated: session.is_authenticated(),
            role: session.role.map(String::from),
            user: session.user.map(Json),
            login_time: session.login_time,
            loading: session.is_loading,
            error: session.error,
            notice: session.notice,
        }
    }
}

/// Route guard action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum Action {
    Render,
    Redirect,
}

/// Route guard verdict
#[derive(Debug, Clone, SimpleObject)]
pub struct Authorization {
    pub action: Action,
    /// Redirect target
    pub target: Option<String>,
    /// Message to show at the redirect target
    pub notice: Option<String>,
}

impl From<Decision> for Authorization {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Render => Self {
                action: Action::Render,
                target: None,
                notice: None,
            },
            Decision::Redirect { target, notice } => Self {
                action: Action::Redirect,
                target: Some(target),
                notice,
            },
        }
    }
}
