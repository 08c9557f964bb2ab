//! Authentication gateway
//!
//! The only place talking to the remote authentication service. Results of remote calls are
//! turned into session store transitions; nothing else in the crate reaches the service.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::model::{ProfileUpdate, Role, User};
use crate::store::{self, SessionStore};

mod http;

pub use http::{AuthConfig, HttpAuthService};

/// Shown when the service rejects a login without saying why
pub const LOGIN_REJECTED_MESSAGE: &str = "Invalid email or password.";

/// Shown when the service can't be reached
pub const SERVICE_UNAVAILABLE_MESSAGE: &str =
    "Unable to reach the authentication service. Please try again.";

/// Failure reported by the remote service
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The service answered, but refused the request
    #[error("Request rejected: {}", message.as_deref().unwrap_or("no reason given"))]
    Rejected {
        status: Option<u16>,
        message: Option<String>,
    },
    /// The service couldn't be reached or answered with garbage
    #[error("Transport failure: {0}")]
    Transport(String),
}

impl RemoteError {
    /// Message safe to show to the user
    fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Rejected {
                message: Some(message),
                ..
            } if !message.is_empty() => message.clone(),
            Self::Rejected { .. } => fallback.to_owned(),
            Self::Transport(_) => SERVICE_UNAVAILABLE_MESSAGE.to_owned(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Login refused, the message is meant for the user
    #[error("{0}")]
    LoginFailed(String),
    /// Remote operation refused, the message is meant for the user
    #[error("{0}")]
    Rejected(String),
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error(transparent)]
    Store(#[from] store::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Login credentials
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Successful login answer
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

/// Remote authentication service
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, RemoteError>;

    async fn request_password_reset(&self, email: &str, role: &Role) -> Result<(), RemoteError>;

    async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), RemoteError>;

    async fn update_profile(
        &self,
        token: &str,
        fields: &ProfileUpdate,
    ) -> Result<User, RemoteError>;
}

/// Gateway between views, the remote service and the session store
#[derive(Clone)]
pub struct AuthGateway {
    service: Arc<dyn AuthService>,
    store: SessionStore,
}

impl AuthGateway {
    pub fn new(service: Arc<dyn AuthService>, store: SessionStore) -> Self {
        Self { service, store }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Logs in, driving the store through authenticating to either authenticated or failed
    #[instrument(skip(self))]
    pub async fn login(&self, credentials: &Credentials, remember_me: bool) -> Result<()> {
        self.store.login_start()?;

        let message = match self.service.login(credentials).await {
            Ok(LoginResponse { user, token }) if !token.is_empty() => {
                self.store.login_success(user, token, remember_me).await?;
                return Ok(());
            }
            Ok(_) => {
                warn!("Authentication service answered without a token");
                LOGIN_REJECTED_MESSAGE.to_owned()
            }
            Err(err) => {
                if matches!(err, RemoteError::Transport(_)) {
                    warn!(%err, "Login request failed");
                }
                err.user_message(LOGIN_REJECTED_MESSAGE)
            }
        };

        self.store.login_failure(message.clone())?;
        Err(Error::LoginFailed(message))
    }

    /// Ends the session locally. The service is not asked, so this always succeeds.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.store.logout().await
    }

    /// Asks the service to send password reset instructions
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str, role: &Role) -> Result<()> {
        self.service
            .request_password_reset(email, role)
            .await
            .map_err(|err| {
                warn!(%err, "Password reset request failed");
                Error::Rejected(err.user_message("Cannot request password reset."))
            })?;

        info!("Password reset requested");
        Ok(())
    }

    /// Sets a new password using the reset token
    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        self.service
            .reset_password(token, new_password)
            .await
            .map_err(|err| {
                warn!(%err, "Password reset failed");
                Error::Rejected(err.user_message("Cannot reset password."))
            })?;

        info!("Password reset");
        Ok(())
    }

    /// Updates the profile remotely, then merges the returned user into the session that asked
    #[instrument(skip(self))]
    pub async fn update_profile(&self, fields: &ProfileUpdate) -> Result<User> {
        let token = self
            .store
            .snapshot()
            .token
            .filter(|token| !token.is_empty())
            .ok_or(Error::NotAuthenticated)?;

        let user = self
            .service
            .update_profile(&token, fields)
            .await
            .map_err(|err| {
                warn!(%err, "Profile update failed");
                Error::Rejected(err.user_message("Cannot update profile."))
            })?;

        let update = ProfileUpdate::try_from(&user).map_err(store::Error::from)?;
        match self.store.update_profile(&token, &update).await {
            Ok(user) => Ok(user),
            Err(store::Error::Superseded { .. }) => {
                warn!("Session replaced during profile update, dropping the result");
                Err(Error::NotAuthenticated)
            }
            Err(err) => Err(err.into()),
        }
    }
}
