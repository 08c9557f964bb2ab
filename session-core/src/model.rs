//! Session data model

pub mod session;
pub mod users;

pub use session::{PersistedSession, Session, SessionState};
pub use users::{ProfileUpdate, Role, User, UserId};
