//! Session persistence
//!
//! The session record lives in one of two storage areas. The `Remember` area survives process
//! restarts, the `Session` area lives only as long as the process does. Which one is used is
//! decided by the "remember me" choice at login; the other area is always wiped so that a stale
//! record can never be picked up after the active one is cleared.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::TimeSource;
use crate::model::{PersistedSession, User};

mod memory;
mod sqlite;

pub use memory::MemoryArea;
pub use sqlite::{Durable, SqliteArea};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const LOGIN_TIME_KEY: &str = "loginTime";
pub const REMEMBER_ME_KEY: &str = "rememberMe";

/// All the keys of a record, always written and cleared as a unit
pub const RECORD_KEYS: [&str; 4] = [TOKEN_KEY, USER_KEY, LOGIN_TIME_KEY, REMEMBER_ME_KEY];

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage area unavailable: {0}")]
    Unavailable(String),
    #[error("Storage quota exceeded while writing {key}")]
    QuotaExceeded { key: String },
    #[error("No complete session record stored")]
    MissingRecord,
    #[error("Cannot serialize user record")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage database failure")]
    Database(#[from] sqlx::Error),
    #[error("Cannot migrate storage database")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Key/value storage backend
#[async_trait]
pub trait StorageArea: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Storage area selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    /// Durable, survives restarts
    Remember,
    /// Ephemeral, process lifetime only
    Session,
}

impl Area {
    pub fn for_remember_me(remember_me: bool) -> Self {
        if remember_me {
            Self::Remember
        } else {
            Self::Session
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Remember => Self::Session,
            Self::Session => Self::Remember,
        }
    }
}

/// Persistence adapter
///
/// The only component allowed to write the storage areas.
#[derive(Clone)]
pub struct Persistence {
    remember: Arc<dyn StorageArea>,
    session: Arc<dyn StorageArea>,
    time: Arc<dyn TimeSource>,
}

impl Persistence {
    pub fn new(
        remember: Arc<dyn StorageArea>,
        session: Arc<dyn StorageArea>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            remember,
            session,
            time,
        }
    }

    /// Persistence keeping both areas in memory
    pub fn in_memory(time: Arc<dyn TimeSource>) -> Self {
        Self::new(
            Arc::new(MemoryArea::new()),
            Arc::new(MemoryArea::new()),
            time,
        )
    }

    /// Current time of the underlying time source, epoch millis
    pub fn now_millis(&self) -> i64 {
        self.time.now_millis()
    }

    /// Builds a record for a session starting now
    pub fn record(&self, token: String, user: User, remember_me: bool) -> PersistedSession {
        PersistedSession {
            token,
            user,
            login_time: self.now_millis(),
            remember_me,
        }
    }

    fn area(&self, area: Area) -> &dyn StorageArea {
        match area {
            Area::Remember => self.remember.as_ref(),
            Area::Session => self.session.as_ref(),
        }
    }

    /// Writes the record into the area selected by `remember_me`, wiping the other area.
    ///
    /// The other area is cleared even if writing the record failed. A failed write also removes
    /// whatever was partially written, so no mixed record survives.
    pub async fn write(&self, record: &PersistedSession) -> Result<()> {
        let target = Area::for_remember_me(record.remember_me);
        let user = serde_json::to_string(&record.user)?;

        let written = self.write_area(target, record, &user).await;
        let cleared = self.clear_area(target.other()).await;

        if written.is_err() {
            if let Err(err) = self.clear_area(target).await {
                warn!(?target, %err, "Cannot remove partially written session record");
            }
        }

        written.and(cleared)
    }

    async fn write_area(&self, area: Area, record: &PersistedSession, user: &str) -> Result<()> {
        let storage = self.area(area);
        storage.set(TOKEN_KEY, &record.token).await?;
        storage.set(USER_KEY, user).await?;
        storage
            .set(LOGIN_TIME_KEY, &record.login_time.to_string())
            .await?;
        storage
            .set(REMEMBER_ME_KEY, if record.remember_me { "true" } else { "false" })
            .await?;
        Ok(())
    }

    /// Reads the stored record, remember area first.
    ///
    /// Incomplete or malformed records are treated as absent, and so are read failures.
    pub async fn read(&self) -> Option<PersistedSession> {
        for area in [Area::Remember, Area::Session] {
            match self.read_area(area).await {
                Ok(Some(record)) => return Some(record),
                Ok(None) => {}
                Err(err) => warn!(?area, %err, "Cannot read session record, treating as absent"),
            }
        }
        None
    }

    /// Finds the area holding a complete record.
    ///
    /// Unlike `read`, a failure is reported if no record was found and any area couldn't be read.
    async fn active(&self) -> Result<Option<(Area, PersistedSession)>> {
        let mut failure = None;
        for area in [Area::Remember, Area::Session] {
            match self.read_area(area).await {
                Ok(Some(record)) => return Ok(Some((area, record))),
                Ok(None) => {}
                Err(err) => failure = failure.or(Some(err)),
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    async fn read_area(&self, area: Area) -> Result<Option<PersistedSession>> {
        let storage = self.area(area);
        let token = storage.get(TOKEN_KEY).await?;
        let user = storage.get(USER_KEY).await?;
        let login_time = storage.get(LOGIN_TIME_KEY).await?;
        let remember_me = storage.get(REMEMBER_ME_KEY).await?;

        let (Some(token), Some(user), Some(login_time), Some(remember_me)) =
            (token, user, login_time, remember_me)
        else {
            return Ok(None);
        };

        if token.is_empty() {
            debug!(?area, "Empty token stored");
            return Ok(None);
        }

        let user: User = match serde_json::from_str(&user) {
            Ok(user) => user,
            Err(err) => {
                debug!(?area, %err, "Malformed user stored");
                return Ok(None);
            }
        };

        let Ok(login_time) = login_time.parse() else {
            debug!(?area, %login_time, "Malformed login time stored");
            return Ok(None);
        };

        let remember_me = match remember_me.as_str() {
            "true" => true,
            "false" => false,
            _ => {
                debug!(?area, %remember_me, "Malformed remember me flag stored");
                return Ok(None);
            }
        };

        Ok(Some(PersistedSession {
            token,
            user,
            login_time,
            remember_me,
        }))
    }

    /// Re-writes the user of the record stored for `token`, leaving everything else untouched
    pub async fn update_user(&self, token: &str, user: &User) -> Result<()> {
        let (area, _) = self
            .active()
            .await?
            .filter(|(_, record)| record.token == token)
            .ok_or(Error::MissingRecord)?;
        let user = serde_json::to_string(user)?;
        self.area(area).set(USER_KEY, &user).await
    }

    /// Login time of the stored record
    pub async fn login_time(&self) -> Result<Option<i64>> {
        Ok(self.active().await?.map(|(_, record)| record.login_time))
    }

    /// Removes the record from both areas
    pub async fn clear(&self) -> Result<()> {
        let remember = self.clear_area(Area::Remember).await;
        let session = self.clear_area(Area::Session).await;
        remember.and(session)
    }

    /// Removes every record key from an area, reporting the first failure
    async fn clear_area(&self, area: Area) -> Result<()> {
        let storage = self.area(area);
        let mut result = Ok(());
        for key in RECORD_KEYS {
            if let Err(err) = storage.remove(key).await {
                result = result.and(Err(err));
            }
        }
        result
    }
}
