// ABOUTME: Seed binary registering demo OAuth clients through the administration surface
// ABOUTME: Prints the one-time client secret; the server itself never writes client records
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Registers an OAuth client for local development and testing.
//!
//! Client administration is external to the authorization-server core; this
//! binary is that collaborator's smallest useful form.

use anyhow::Result;
use clap::Parser;
use gatehouse_auth_server::{
    config::ServerConfig,
    database::Database,
    logging,
    oauth2::registry::{ClientRegistration, ClientRegistry},
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "seed-demo-clients")]
#[command(about = "Register a demo OAuth client against the Gatehouse credential store")]
struct Args {
    /// Redirect URI to register (repeatable)
    #[arg(long, required = true)]
    redirect_uri: Vec<String>,

    /// Register a confidential client (issues a secret)
    #[arg(long)]
    confidential: bool,

    /// Display name for the client
    #[arg(long)]
    name: Option<String>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    let database = Arc::new(Database::new(&config.database_url).await?);
    let registry = ClientRegistry::new(database);

    let registered = registry
        .register(ClientRegistration {
            redirect_uris: args.redirect_uri,
            grant_types: None,
            is_confidential: args.confidential,
            client_name: args.name,
        })
        .await?;

    info!("Registered client {}", registered.client.client_id);

    println!("client_id: {}", registered.client.client_id);
    match registered.client_secret {
        Some(secret) => println!("client_secret: {secret}"),
        None => println!("client_secret: (public client, none issued)"),
    }
    println!(
        "redirect_uris: {}",
        registered.client.redirect_uris.join(" ")
    );

    Ok(())
}
