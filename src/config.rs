// ABOUTME: Environment-driven configuration for the authorization server
// ABOUTME: Loads ports, database URL, issuer URL, and credential lifetimes with validated defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Server configuration loaded from environment variables
//!
//! Environment-only configuration: every knob has a default suitable for
//! local development and is overridden by an environment variable in
//! deployment.

use anyhow::{Context, Result};
use std::env;
use tracing::info;

/// Authorization-server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Bind host
    pub host: String,
    /// Database connection URL (`sqlite:...` or `sqlite::memory:`)
    pub database_url: String,
    /// Issuer base URL advertised in the discovery document
    pub issuer_url: String,
    /// Login page of the external resource-owner authentication system;
    /// unauthenticated authorization requests are redirected here
    pub login_url: String,
    /// Authorization-code lifetime in seconds
    pub auth_code_ttl_secs: i64,
    /// Access-token lifetime in seconds
    pub access_token_ttl_secs: i64,
    /// Refresh-token lifetime in days
    pub refresh_token_ttl_days: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a set environment variable fails to parse
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let config = Self {
            http_port: env_var_or("HTTP_PORT", "8081")?
                .parse()
                .context("Invalid HTTP_PORT value")?,
            host: env_var_or("HOST", "127.0.0.1")?,
            database_url: env_var_or("DATABASE_URL", "sqlite:data/gatehouse.db")?,
            issuer_url: env_var_or("ISSUER_URL", "http://localhost:8081")?,
            login_url: env_var_or("LOGIN_URL", "/login")?,
            auth_code_ttl_secs: env_var_or("AUTH_CODE_TTL_SECS", "600")?
                .parse()
                .context("Invalid AUTH_CODE_TTL_SECS value")?,
            access_token_ttl_secs: env_var_or("ACCESS_TOKEN_TTL_SECS", "3600")?
                .parse()
                .context("Invalid ACCESS_TOKEN_TTL_SECS value")?,
            refresh_token_ttl_days: env_var_or("REFRESH_TOKEN_TTL_DAYS", "30")?
                .parse()
                .context("Invalid REFRESH_TOKEN_TTL_DAYS value")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// One-line configuration summary for startup logging
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "http={}:{} issuer={} code_ttl={}s access_ttl={}s refresh_ttl={}d",
            self.host,
            self.http_port,
            self.issuer_url,
            self.auth_code_ttl_secs,
            self.access_token_ttl_secs,
            self.refresh_token_ttl_days,
        )
    }

    fn validate(&self) -> Result<()> {
        // RFC 6749 recommends a maximum authorization-code lifetime of 10 minutes
        anyhow::ensure!(
            (60..=600).contains(&self.auth_code_ttl_secs),
            "AUTH_CODE_TTL_SECS must be between 60 and 600"
        );
        anyhow::ensure!(
            self.access_token_ttl_secs > 0,
            "ACCESS_TOKEN_TTL_SECS must be positive"
        );
        anyhow::ensure!(
            self.refresh_token_ttl_days > 0,
            "REFRESH_TOKEN_TTL_DAYS must be positive"
        );
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8081,
            host: "127.0.0.1".into(),
            database_url: "sqlite:data/gatehouse.db".into(),
            issuer_url: "http://localhost:8081".into(),
            login_url: "/login".into(),
            auth_code_ttl_secs: 600,
            access_token_ttl_secs: 3600,
            refresh_token_ttl_days: 30,
        }
    }
}

/// Read an environment variable with a default fallback
fn env_var_or(name: &str, default: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) => Ok(value),
        Err(env::VarError::NotPresent) => Ok(default.to_owned()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {name}")),
    }
}
