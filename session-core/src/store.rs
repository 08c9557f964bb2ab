//! Session store
//!
//! Holds the canonical session snapshot and applies the lifecycle transitions:
//!
//! ```text
//! Anonymous --login-start--> Authenticating --login-success--> Authenticated
//!     ^                        |       ^                          |    ^
//!     |                 login-failure  login-start         profile-update
//!     |                        v       |                          |    |
//!     |                        Failed -+                          +----+
//!     +--------------------------- logout ------------------------+
//! ```
//!
//! Every transition is applied to the snapshot before the call returns, so all readers observe
//! it right away. Persistence and the expiry clock follow the snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::clock::{self, ClockConfig, ClockHandle, ExpiryCheck};
use crate::guard::{self, Decision, RouteTable};
use crate::model::{PersistedSession, ProfileUpdate, Role, Session, SessionState, User};
use crate::storage::Persistence;

pub const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please log in again.";
pub const SESSION_INVALID_NOTICE: &str = "Your session is no longer valid. Please log in again.";

const EVENTS_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot apply {event} to a session in {state:?} state")]
    InvalidTransition {
        event: &'static str,
        state: SessionState,
    },
    #[error("Session was replaced before {event} completed")]
    Superseded { event: &'static str },
    #[error("Login succeeded without a token")]
    MissingToken,
    #[error("Invalid profile update")]
    InvalidProfile(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// User logged out
    Explicit,
    /// Session lifetime is over
    Expired,
    /// Authenticated session without a provable start
    Corrupted,
}

impl LogoutReason {
    fn notice(self) -> Option<&'static str> {
        match self {
            Self::Explicit => None,
            Self::Expired => Some(SESSION_EXPIRED_NOTICE),
            Self::Corrupted => Some(SESSION_INVALID_NOTICE),
        }
    }
}

/// Session transitions as seen by views
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoginStart,
    LoginSuccess { role: Role },
    LoginFailure { message: String },
    Logout { reason: LogoutReason },
    ProfileUpdated,
}

struct StoreInner {
    /// Current snapshot
    state: watch::Sender<Session>,
    /// Transition events
    events: broadcast::Sender<SessionEvent>,
    persistence: Persistence,
    clock: ClockConfig,
    /// Expiry check of the current session
    timer: Mutex<Option<ClockHandle>>,
    /// Whether the current session made it into storage
    durable: AtomicBool,
}

/// Shared handle to the session store
#[derive(Clone)]
pub struct SessionStore(Arc<StoreInner>);

/// Non-owning handle, held by the expiry clock
pub(crate) struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub(crate) fn upgrade(&self) -> Option<SessionStore> {
        self.0.upgrade().map(SessionStore)
    }
}

impl SessionStore {
    /// Creates a store with an anonymous session
    pub fn new(persistence: Persistence, clock: ClockConfig) -> Self {
        Self::with_session(Session::default(), persistence, clock)
    }

    fn with_session(session: Session, persistence: Persistence, clock: ClockConfig) -> Self {
        let (state, _) = watch::channel(session);
        let (events, _) = broadcast::channel(EVENTS_CAPACITY);

        Self(Arc::new(StoreInner {
            state,
            events,
            persistence,
            clock,
            timer: Mutex::new(None),
            durable: AtomicBool::new(false),
        }))
    }

    /// Creates a store with the session found in storage, if any
    pub async fn restore(persistence: Persistence, clock: ClockConfig) -> Self {
        let Some(record) = persistence.read().await else {
            info!("No stored session, starting anonymous");
            return Self::new(persistence, clock);
        };

        info!(role = %record.user.role, remember_me = record.remember_me, "Restoring stored session");
        let store = Self::with_session(record.into(), persistence, clock);
        store.0.durable.store(true, Ordering::SeqCst);
        store.arm_clock();
        store
    }

    /// Current session snapshot
    pub fn snapshot(&self) -> Session {
        self.0.state.borrow().clone()
    }

    /// Receiver notified on every session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.0.state.subscribe()
    }

    /// Receiver of transition events
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.0.events.subscribe()
    }

    /// Authorizes a protected route against the current session
    pub fn authorize(&self, routes: &RouteTable, allowed: &[Role]) -> Decision {
        guard::authorize(&self.0.state.borrow(), routes, allowed)
    }

    /// Authorizes a public-only route against the current session
    pub fn authorize_public(&self, routes: &RouteTable) -> Decision {
        guard::authorize_public(&self.0.state.borrow(), routes)
    }

    pub fn persistence(&self) -> &Persistence {
        &self.0.persistence
    }

    pub fn clock_config(&self) -> ClockConfig {
        self.0.clock
    }

    fn downgrade(&self) -> WeakStore {
        WeakStore(Arc::downgrade(&self.0))
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.0.events.send(event);
    }

    /// Applies `transition` atomically, publishing the snapshot only if it succeeded
    fn transition<T>(&self, transition: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        let mut result = None;
        self.0.state.send_if_modified(|session| {
            let outcome = transition(session);
            let modified = outcome.is_ok();
            result = Some(outcome);
            modified
        });

        // `send_if_modified` always runs the closure
        result.unwrap_or_else(|| {
            Err(Error::InvalidTransition {
                event: "transition",
                state: self.0.state.borrow().state(),
            })
        })
    }

    /// Marks login as in progress
    pub fn login_start(&self) -> Result<()> {
        self.transition(|session| match session.state() {
            SessionState::Anonymous | SessionState::Failed => {
                session.is_loading = true;
                session.error = None;
                session.notice = None;
                Ok(())
            }
            state => Err(Error::InvalidTransition {
                event: "login-start",
                state,
            }),
        })?;

        debug!("Login started");
        self.emit(SessionEvent::LoginStart);
        Ok(())
    }

    /// Completes login, persisting the session and starting its expiry clock
    pub async fn login_success(&self, user: User, token: String, remember_me: bool) -> Result<()> {
        if token.is_empty() {
            return Err(Error::MissingToken);
        }

        let record = self.0.persistence.record(token, user, remember_me);
        self.transition(|session| match session.state() {
            SessionState::Authenticating => {
                *session = Session::authenticated(
                    record.user.clone(),
                    record.token.clone(),
                    record.login_time,
                );
                Ok(())
            }
            state => Err(Error::InvalidTransition {
                event: "login-success",
                state,
            }),
        })?;

        let role = record.user.role.clone();
        info!(%role, remember_me, "Logged in");

        if !self.persist(&record).await {
            return Err(Error::Superseded {
                event: "login-success",
            });
        }

        self.arm_clock();
        self.emit(SessionEvent::LoginSuccess { role });
        Ok(())
    }

    /// Writes the record, degrading to an in-memory only session on failure.
    ///
    /// Returns `false` if the session was replaced while writing. The record is removed again then.
    async fn persist(&self, record: &PersistedSession) -> bool {
        let written = self.0.persistence.write(record).await;

        let superseded = self.0.state.borrow().token.as_deref() != Some(record.token.as_str());
        if superseded {
            if let Err(err) = self.0.persistence.clear().await {
                warn!(%err, "Cannot clear stored session");
            }
            return false;
        }

        match written {
            Ok(()) => self.0.durable.store(true, Ordering::SeqCst),
            Err(err) => {
                warn!(%err, "Cannot persist session, it won't survive a restart");
                self.0.durable.store(false, Ordering::SeqCst);
            }
        }
        true
    }

    /// Records a login failure
    pub fn login_failure(&self, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        self.transition(|session| match session.state() {
            SessionState::Authenticating => {
                session.is_loading = false;
                session.error = Some(message.clone());
                Ok(())
            }
            state => Err(Error::InvalidTransition {
                event: "login-failure",
                state,
            }),
        })?;

        info!(%message, "Login failed");
        self.emit(SessionEvent::LoginFailure { message });
        Ok(())
    }

    /// Ends the session. Always succeeds, also when there is no session.
    pub async fn logout(&self) {
        self.terminate(LogoutReason::Explicit).await
    }

    async fn terminate(&self, reason: LogoutReason) {
        // Cancelled only at the very end, as this may run on the clock task itself
        let timer = self.0.timer.lock().take();

        let previous = self.0.state.send_replace(Session {
            notice: reason.notice().map(Into::into),
            ..Default::default()
        });
        self.0.durable.store(false, Ordering::SeqCst);

        if let Err(err) = self.0.persistence.clear().await {
            warn!(%err, "Cannot clear stored session");
        }

        info!(
            ?reason,
            was_authenticated = previous.is_authenticated(),
            "Logged out"
        );
        self.emit(SessionEvent::Logout { reason });

        if let Some(timer) = timer {
            timer.cancel();
        }
    }

    /// Merges profile fields into the user of the session holding `token`. Token and role are
    /// never changed.
    pub async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> Result<User> {
        let user = self.transition(|session| {
            let state = session.state();
            if state == SessionState::Authenticated && session.token.as_deref() != Some(token) {
                return Err(Error::Superseded {
                    event: "profile-update",
                });
            }

            let user = session
                .user
                .as_mut()
                .filter(|_| state == SessionState::Authenticated)
                .ok_or(Error::InvalidTransition {
                    event: "profile-update",
                    state,
                })?;

            let mut updated = user.clone();
            updated.merge(update)?;
            *user = updated.clone();
            Ok(updated)
        })?;

        if let Err(err) = self.0.persistence.update_user(token, &user).await {
            warn!(%err, "Cannot persist updated profile");
        }

        info!(user = %user.id, "Profile updated");
        self.emit(SessionEvent::ProfileUpdated);
        Ok(user)
    }

    /// Checks the current session against its lifetime, terminating it when it's over.
    ///
    /// The login time is taken from storage. If storage couldn't be written for this session or
    /// is unreadable, the in-memory login time is used instead.
    pub async fn check_expiry(&self) -> ExpiryCheck {
        let session = self.snapshot();
        if !session.is_authenticated() {
            return ExpiryCheck::Inactive;
        }

        let login_time = match self.0.persistence.login_time().await {
            Ok(Some(login_time)) => Some(login_time),
            Ok(None) if !self.0.durable.load(Ordering::SeqCst) => session.login_time,
            Ok(None) => None,
            Err(err) => {
                warn!(%err, "Cannot read stored login time, using in-memory one");
                session.login_time
            }
        };

        let now = self.0.persistence.now_millis();
        let check = ExpiryCheck::evaluate(login_time, now, self.0.clock.ttl());
        let reason = match check {
            ExpiryCheck::Expired => LogoutReason::Expired,
            ExpiryCheck::Corrupted => LogoutReason::Corrupted,
            check => return check,
        };

        // Session replaced while reading storage
        let superseded = self.0.state.borrow().token != session.token;
        if superseded {
            return ExpiryCheck::Inactive;
        }

        info!(?check, "Terminating session");
        self.terminate(reason).await;
        check
    }

    /// Starts the expiry clock for the current session, replacing the previous one
    fn arm_clock(&self) {
        let handle = clock::arm(self.downgrade(), self.0.clock.check_interval());
        if let Some(previous) = self.0.timer.lock().replace(handle) {
            previous.cancel();
        }
    }

    #[cfg(test)]
    fn clock_armed(&self) -> bool {
        self.0
            .timer
            .lock()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}
