//! Learning portal session service
//!
//! Hosts the session and access control core, exposing it to portal views over GraphQL.

use actix_web::{App, HttpServer};
use clap::Parser;
use color_eyre::Result;
use std::io::read_to_string;
use tracing::info;
use tracing_actix_web::TracingLogger;

use crate::config::{Config, LogFormat};
use crate::opt::Opt;
use crate::portal::Portal;

mod config;
mod mutation;
mod opt;
mod portal;
mod query;
mod service;
mod view;

/// Initializes tracing collection
fn setup_tracing(config: config::Logging) -> Result<()> {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let fmt_layer = match config.format {
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let filter_layer = config
        .filters
        .into_iter()
        .fold(filter_layer, |layer, filter| layer.add_directive(filter));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Opt {
        config: mut config_file,
    } = Opt::parse();

    let config = read_to_string(&mut config_file)?;
    let config: Config = toml::from_str(&config)?;

    setup_tracing(config.logging.clone())?;
    color_eyre::install()?;

    info!(
        config = ?config_file.path().path(),
        "Tracing initialized, setting up a service"
    );

    let portal = Portal::with_config(&config).await?;
    let service_config = service::configure(config.graphiql, portal).await?;
    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .configure(service_config.clone())
    })
    .bind(config.host)?
    .run()
    .await?;

    info!("Service stopped, tearing down");
    Ok(())
}
