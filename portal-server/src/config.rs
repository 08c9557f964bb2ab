//! Service configuration

use std::net::SocketAddr;

use serde::{Deserialize, Deserializer};
use session_core::gateway::AuthConfig;
use session_core::storage::Durable;
use session_core::{ClockConfig, RouteTable};
use tracing_subscriber::filter::Directive;

/// Logging output format
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Logging {
    /// Additional filtering directives
    #[serde(default, deserialize_with = "Logging::deserialize_filters")]
    pub filters: Vec<Directive>,

    /// Logging format
    #[serde(default)]
    pub format: LogFormat,
}

impl Logging {
    fn deserialize_filters<'de, D>(deserializer: D) -> Result<Vec<Directive>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let dirs: Vec<String> = Deserialize::deserialize(deserializer)?;
        dirs.into_iter()
            .map(|dir| dir.parse().map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Top level service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address where to host the service
    #[serde(default = "Config::default_host")]
    pub host: SocketAddr,

    /// Enables GraphiQL endpoint
    #[serde(default)]
    pub graphiql: bool,

    /// Logging configuration
    #[serde(default)]
    pub logging: Logging,

    /// Remote authentication service
    pub auth: AuthConfig,

    /// Session lifetime
    #[serde(default)]
    pub session: ClockConfig,

    /// Durable session storage
    #[serde(default)]
    pub storage: Durable,

    /// Redirect targets of the route guard
    #[serde(default)]
    pub routes: RouteTable,
}

impl Config {
    fn default_host() -> SocketAddr {
        ([127, 0, 0, 1], 3030).into()
    }
}
