//! Service global context

use std::sync::Arc;

use async_graphql::EmptySubscription;
use color_eyre::Result;
use session_core::{
    AuthGateway, AuthService, HttpAuthService, MemoryArea, Persistence, RouteTable, SessionStore,
    SqliteArea, TimeSource, UtcTime,
};
use tracing::info;

use crate::config::Config;
use crate::mutation::Mutation;
use crate::query::Query;
use crate::service::Schema;

/// Name of the durable storage area
const REMEMBER_AREA: &str = "remember";

/// Context for GraphQL schema
#[derive(Clone)]
pub struct Portal {
    /// Authentication gateway, owning the session store
    gateway: AuthGateway,
    /// Route guard redirect targets
    routes: Arc<RouteTable>,
}

impl Portal {
    pub fn new(service: Arc<dyn AuthService>, store: SessionStore, routes: RouteTable) -> Self {
        Self {
            gateway: AuthGateway::new(service, store),
            routes: Arc::new(routes),
        }
    }

    /// Context for testing purposes - both storage areas in memory
    #[cfg(test)]
    pub fn test(service: Arc<dyn AuthService>) -> Self {
        let time: Arc<dyn TimeSource> = Arc::new(UtcTime);
        let store = SessionStore::new(Persistence::in_memory(time), Default::default());
        Self::new(service, store, RouteTable::default())
    }

    /// Context from configuration
    ///
    /// The "remember me" area is kept in the configured durable storage, the session-only area
    /// lives in memory. A session found in storage is restored.
    pub async fn with_config(config: &Config) -> Result<Self> {
        let time: Arc<dyn TimeSource> = Arc::new(UtcTime);
        let remember = SqliteArea::open(&config.storage, REMEMBER_AREA).await?;
        let persistence = Persistence::new(Arc::new(remember), Arc::new(MemoryArea::new()), time);

        let store = SessionStore::restore(persistence, config.session).await;
        info!(state = ?store.snapshot().state(), "Session store ready");

        let service = HttpAuthService::new(&config.auth)?;
        Ok(Self::new(Arc::new(service), store, config.routes.clone()))
    }

    /// Builds schema with attached context
    pub fn schema(&self) -> Schema {
        Schema::build(Query::new(), Mutation::new(), EmptySubscription)
            .data(self.clone())
            .finish()
    }

    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    pub fn store(&self) -> &SessionStore {
        self.gateway.store()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}
