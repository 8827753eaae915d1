// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides database, server, and client registration helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]
//! Shared test utilities for `gatehouse_auth_server`

use gatehouse_auth_server::{
    config::ServerConfig,
    database::Database,
    oauth2::{
        models::{AuthorizeOutcome, AuthorizeRequest, TokenRequest},
        registry::ClientRegistration,
        OAuth2AuthorizationServer,
    },
};
use std::sync::{Arc, Once};
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard test database setup
pub async fn create_test_database() -> Arc<Database> {
    init_test_logging();
    Arc::new(Database::new("sqlite::memory:").await.unwrap())
}

/// Test server over a fresh in-memory database
pub async fn setup_server() -> (Arc<Database>, OAuth2AuthorizationServer) {
    let database = create_test_database().await;
    let server = OAuth2AuthorizationServer::new(database.clone(), &ServerConfig::default());
    (database, server)
}

/// Register a confidential client; returns (`client_id`, `client_secret`)
pub async fn register_confidential_client(
    server: &OAuth2AuthorizationServer,
    redirect_uris: &[&str],
) -> (String, String) {
    let registered = server
        .registry()
        .register(ClientRegistration {
            redirect_uris: redirect_uris.iter().map(ToString::to_string).collect(),
            grant_types: None,
            is_confidential: true,
            client_name: Some("Test Confidential Client".to_owned()),
        })
        .await
        .unwrap();

    (
        registered.client.client_id,
        registered.client_secret.unwrap(),
    )
}

/// Register a public client; returns its `client_id`
pub async fn register_public_client(
    server: &OAuth2AuthorizationServer,
    redirect_uris: &[&str],
) -> String {
    let registered = server
        .registry()
        .register(ClientRegistration {
            redirect_uris: redirect_uris.iter().map(ToString::to_string).collect(),
            grant_types: None,
            is_confidential: false,
            client_name: Some("Test Public Client".to_owned()),
        })
        .await
        .unwrap();

    registered.client.client_id
}

/// A well-formed authorization request for the given client
pub fn authorize_request(client_id: &str, redirect_uri: &str, state: &str) -> AuthorizeRequest {
    AuthorizeRequest {
        response_type: "code".to_owned(),
        client_id: client_id.to_owned(),
        redirect_uri: redirect_uri.to_owned(),
        state: Some(state.to_owned()),
        scope: Some("files:read catalog:read".to_owned()),
        code_challenge: None,
        code_challenge_method: None,
    }
}

/// Run the authorization endpoint as an authenticated user and return the code
pub async fn obtain_code(
    server: &OAuth2AuthorizationServer,
    request: AuthorizeRequest,
    user_id: Uuid,
) -> String {
    match server.authorize(request, Some(user_id)).await.unwrap() {
        AuthorizeOutcome::Granted { code, .. } => code,
        other => panic!("Expected granted authorization, got {other:?}"),
    }
}

/// A token request for the authorization code grant
pub fn code_exchange_request(
    client_id: &str,
    client_secret: Option<&str>,
    code: &str,
    redirect_uri: &str,
) -> TokenRequest {
    TokenRequest {
        grant_type: "authorization_code".to_owned(),
        client_id: client_id.to_owned(),
        client_secret: client_secret.map(ToString::to_string),
        code: Some(code.to_owned()),
        redirect_uri: Some(redirect_uri.to_owned()),
        code_verifier: None,
        refresh_token: None,
        scope: None,
    }
}

/// A token request for the refresh token grant
pub fn refresh_request(
    client_id: &str,
    client_secret: Option<&str>,
    refresh_token: &str,
) -> TokenRequest {
    TokenRequest {
        grant_type: "refresh_token".to_owned(),
        client_id: client_id.to_owned(),
        client_secret: client_secret.map(ToString::to_string),
        code: None,
        redirect_uri: None,
        code_verifier: None,
        refresh_token: Some(refresh_token.to_owned()),
        scope: None,
    }
}
