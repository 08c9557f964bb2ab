//! Session and role-based access control for the learning portal
//!
//! The crate establishes, persists, expires and authorizes the session of a portal user:
//!
//! * [`store::SessionStore`] holds the canonical session and applies its transitions,
//! * [`storage::Persistence`] mirrors it into a durable or an ephemeral storage area,
//! * [`clock`] terminates sessions once their fixed lifetime is over,
//! * [`guard`] decides whether a view renders or redirects,
//! * [`gateway::AuthGateway`] is the sole caller of the remote authentication service.

pub mod clock;
pub mod gateway;
pub mod guard;
pub mod model;
pub mod storage;
pub mod store;

pub use clock::{ClockConfig, ExpiryCheck, TimeSource, UtcTime};
pub use gateway::{AuthGateway, AuthService, Credentials, HttpAuthService};
pub use guard::{Decision, RouteTable};
pub use model::{ProfileUpdate, Role, Session, SessionState, User, UserId};
pub use storage::{MemoryArea, Persistence, SqliteArea, StorageArea};
pub use store::{LogoutReason, SessionEvent, SessionStore};
