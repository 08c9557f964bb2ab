//! Session expiry clock
//!
//! Sessions have a fixed absolute lifetime counted from the login time, regardless of activity.
//! While a session is authenticated a background task re-checks its age on a fixed interval and
//! forces a logout once it's over.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, trace};

use crate::store::WeakStore;

/// Source of the current time
pub trait TimeSource: Send + Sync {
    /// Milliseconds since Unix epoch
    fn now_millis(&self) -> i64;
}

/// Wall clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcTime;

impl TimeSource for UtcTime {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven time, for testing
#[derive(Debug, Default)]
pub struct ManualTime(AtomicI64);

impl ManualTime {
    pub fn new(now_millis: i64) -> Self {
        Self(AtomicI64::new(now_millis))
    }

    pub fn set(&self, now_millis: i64) {
        self.0.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(duration_millis(by), Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Session clock configuration
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ClockConfig {
    /// Session lifetime in seconds
    #[serde(default = "ClockConfig::default_ttl_secs")]
    pub ttl_secs: u64,

    /// Seconds between expiry checks
    #[serde(default = "ClockConfig::default_check_interval_secs")]
    pub check_interval_secs: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            ttl_secs: Self::default_ttl_secs(),
            check_interval_secs: Self::default_check_interval_secs(),
        }
    }
}

impl ClockConfig {
    fn default_ttl_secs() -> u64 {
        2 * 60 * 60
    }

    fn default_check_interval_secs() -> u64 {
        60
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn check_interval(&self) -> Duration {
        // Zero period would make `interval` panic
        Duration::from_secs(self.check_interval_secs.max(1))
    }
}

/// Outcome of a single expiry check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    /// No authenticated session, or the checked one was replaced in the meantime
    Inactive,
    /// Session still valid
    Valid { remaining: Duration },
    /// Session lifetime is over, session was terminated
    Expired,
    /// No login time could be found for an authenticated session, session was terminated
    Corrupted,
}

impl ExpiryCheck {
    /// Decides on session validity from its login time
    pub fn evaluate(login_time: Option<i64>, now: i64, ttl: Duration) -> Self {
        let Some(login_time) = login_time else {
            return Self::Corrupted;
        };

        let age = now.saturating_sub(login_time);
        let ttl = duration_millis(ttl);
        if age >= ttl {
            Self::Expired
        } else {
            // Login time in the future counts as a fresh session
            let remaining = (ttl - age.max(0)) as u64;
            Self::Valid {
                remaining: Duration::from_millis(remaining),
            }
        }
    }
}

/// Handle to the running expiry check task
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct ClockHandle(JoinHandle<()>);

impl ClockHandle {
    pub fn cancel(self) {
        self.0.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Starts the recurring expiry check for the store's current session.
///
/// The first check happens immediately. The task stops on its own once the session is no longer
/// authenticated or the store is gone.
pub(crate) fn arm(store: WeakStore, period: Duration) -> ClockHandle {
    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(store) = store.upgrade() else {
                debug!("Session store dropped, stopping session clock");
                break;
            };

            match store.check_expiry().await {
                ExpiryCheck::Valid { remaining } => trace!(?remaining, "Session valid"),
                check => {
                    debug!(?check, "Session clock stopped");
                    break;
                }
            }
        }
    });

    ClockHandle(task)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(2 * 60 * 60);
    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn default_config() {
        let config = ClockConfig::default();
        assert_eq!(config.ttl(), TTL);
        assert_eq!(config.check_interval(), Duration::from_secs(60));
    }

    #[test]
    fn expired_past_ttl() {
        let login_time = NOW - duration_millis(TTL) - 1;
        assert_eq!(
            ExpiryCheck::evaluate(Some(login_time), NOW, TTL),
            ExpiryCheck::Expired
        );

        let login_time = NOW - duration_millis(TTL);
        assert_eq!(
            ExpiryCheck::evaluate(Some(login_time), NOW, TTL),
            ExpiryCheck::Expired
        );
    }

    #[test]
    fn valid_before_ttl() {
        let login_time = NOW - duration_millis(TTL) + 1000;
        assert_eq!(
            ExpiryCheck::evaluate(Some(login_time), NOW, TTL),
            ExpiryCheck::Valid {
                remaining: Duration::from_secs(1)
            }
        );
    }

    #[test]
    fn missing_login_time_is_corrupted() {
        assert_eq!(
            ExpiryCheck::evaluate(None, NOW, TTL),
            ExpiryCheck::Corrupted
        );
    }

    #[test]
    fn future_login_time_is_fresh() {
        assert_eq!(
            ExpiryCheck::evaluate(Some(NOW + 5000), NOW, TTL),
            ExpiryCheck::Valid { remaining: TTL }
        );
    }

    #[test]
    fn manual_time() {
        let time = ManualTime::new(NOW);
        time.advance(Duration::from_millis(1500));
        assert_eq!(time.now_millis(), NOW + 1500);
        time.set(0);
        assert_eq!(time.now_millis(), 0);
    }
}
