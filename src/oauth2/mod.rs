// ABOUTME: OAuth 2.0 authorization server implementation with opaque tokens
// ABOUTME: Provides the authorization, token, revocation, and introspection endpoint cores
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// OAuth 2.0 authorization server endpoint logic
pub mod endpoints;
/// OAuth 2.0 wire-level data models and error types
pub mod models;
/// PKCE S256 challenge verification (RFC 7636)
pub mod pkce;
/// Registered-client registry and secret verification
pub mod registry;

/// OAuth 2.0 authorization server
pub use endpoints::OAuth2AuthorizationServer;

/// Authorization request outcome (redirect, login, or denial)
pub use models::AuthorizeOutcome;
/// Authorization request
pub use models::AuthorizeRequest;
/// Introspection response (RFC 7662)
pub use models::IntrospectionResponse;
/// OAuth 2.0 error response
pub use models::OAuth2Error;
/// Revocation request (RFC 7009)
pub use models::RevokeRequest;
/// Token exchange outcome (issued or denied)
pub use models::TokenOutcome;
/// Token exchange request
pub use models::TokenRequest;
/// Token exchange response
pub use models::TokenResponse;

/// Client registry lookup and authentication
pub use registry::ClientRegistry;
