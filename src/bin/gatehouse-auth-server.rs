// ABOUTME: Server binary for the Gatehouse OAuth 2.0 authorization server
// ABOUTME: Loads configuration, connects the credential stores, and serves the protocol endpoints
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Gatehouse Auth Server Binary
//!
//! Starts the authorization server with pooled credential stores, the
//! external-login authenticator seam, and periodic credential garbage
//! collection.

use anyhow::Result;
use clap::Parser;
use gatehouse_auth_server::{
    auth::{DenyAllAuthenticator, FixedUserAuthenticator, ResourceOwnerAuthenticator},
    config::ServerConfig,
    database::Database,
    logging,
    oauth2::OAuth2AuthorizationServer,
    routes::{self, ServerContext},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Interval between expired-credential sweeps
const GC_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(name = "gatehouse-auth-server")]
#[command(about = "Gatehouse Auth - OAuth 2.0 authorization server for the Gatehouse platform")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    logging::init_from_env()?;

    info!("Starting Gatehouse Auth Server");
    info!("{}", config.summary());

    let database = Arc::new(Database::new(&config.database_url).await?);
    info!("Credential stores initialized: {}", config.database_url);

    let authenticator: Arc<dyn ResourceOwnerAuthenticator> =
        match std::env::var("DEV_USER_ID").ok().as_deref() {
            Some(raw) => {
                let user_id = raw.parse()?;
                warn!(
                    "DEV_USER_ID set - every session-bearing request authenticates as {user_id}; \
                     never enable this in production"
                );
                Arc::new(FixedUserAuthenticator::new(user_id))
            }
            None => Arc::new(DenyAllAuthenticator),
        };

    let auth_server = OAuth2AuthorizationServer::new(database.clone(), &config);

    // Expired single-use codes are garbage, not history; sweep them on a timer.
    let gc_database = database.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(GC_INTERVAL);
        loop {
            interval.tick().await;
            match gc_database.purge_expired_auth_codes(chrono::Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => info!("Purged {purged} expired authorization codes"),
                Err(e) => warn!("Authorization-code purge failed: {e}"),
            }
        }
    });

    let context = Arc::new(ServerContext {
        auth_server,
        authenticator,
        config: config.clone(),
    });

    let app = routes::router(context);

    let listener =
        tokio::net::TcpListener::bind((config.host.as_str(), config.http_port)).await?;
    info!("Listening on {}:{}", config.host, config.http_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gatehouse Auth Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {e}");
    }
    info!("Shutdown signal received, draining connections");
}
