// ABOUTME: Main library entry point for the Gatehouse OAuth 2.0 authorization server
// ABOUTME: Exposes the client registry, credential stores, and OAuth 2.0 protocol endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # Gatehouse Auth Server
//!
//! The OAuth 2.0 authorization server core for the Gatehouse SaaS platform.
//! It issues, validates, rotates, and revokes the access credentials consumed
//! by the platform's resource servers.
//!
//! ## Features
//!
//! - **Authorization Code grant** with optional PKCE (S256 only)
//! - **Refresh-token rotation** with family-wide theft response on reuse
//! - **RFC 7009 revocation** and **RFC 7662 introspection** endpoints
//! - **Opaque tokens** backed by a connection-pooled `SQLite` credential store
//!
//! ## Architecture
//!
//! - **Client Registry**: registered applications and their redirect URIs
//! - **Credential Stores**: authorization codes, access tokens, refresh tokens
//! - **Endpoints**: authorize, token, revoke, introspect over axum
//! - **Collaborators**: resource-owner authentication is an injected trait;
//!   client administration writes through the seed surface, never at
//!   request time
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use gatehouse_auth_server::config::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Gatehouse Auth Server configured with port: HTTP={}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Resource-owner authentication collaborator seam
pub mod auth;

/// Configuration management loaded from the environment
pub mod config;

/// Credential stores over a pooled `SQLite` connection
pub mod database;

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Logging configuration and structured logging setup
pub mod logging;

/// Persistence models for clients, codes, and tokens
pub mod models;

/// OAuth 2.0 authorization server endpoints, registry, and wire types
pub mod oauth2;

/// HTTP routes for the authorization server and service health
pub mod routes;
