// ABOUTME: HTTP router assembly and shared request context for the auth server
// ABOUTME: Wires the OAuth endpoints, discovery document, and health checks behind tracing middleware
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Health and readiness endpoints
pub mod health;
/// OAuth 2.0 protocol endpoints
pub mod oauth2;

use crate::auth::ResourceOwnerAuthenticator;
use crate::config::ServerConfig;
use crate::oauth2::OAuth2AuthorizationServer;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state injected into every route handler
///
/// Built once at startup; there are no module-level globals. The
/// authenticator is the external session collaborator behind a trait object.
pub struct ServerContext {
    /// The authorization-server core
    pub auth_server: OAuth2AuthorizationServer,
    /// Resource-owner authentication collaborator
    pub authenticator: Arc<dyn ResourceOwnerAuthenticator>,
    /// Server configuration (issuer and login URLs)
    pub config: ServerConfig,
}

/// Build the full application router
#[must_use]
pub fn router(context: Arc<ServerContext>) -> Router {
    Router::new()
        .merge(health::HealthRoutes::routes())
        .merge(oauth2::OAuth2Routes::routes(context))
        .layer(TraceLayer::new_for_http())
}
