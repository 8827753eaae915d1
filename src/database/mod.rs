// ABOUTME: Credential store manager over a pooled SQLite connection
// ABOUTME: Owns schema migration and the atomic conditional updates the token flows rely on
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Credential stores for clients, authorization codes, and tokens
//!
//! The stores are the only owners of persisted OAuth entities. Endpoints
//! receive an injected [`Database`] handle; nothing here is a global.
//! Single-use semantics (code consumption, refresh rotation) are enforced
//! with single conditional `UPDATE` statements, never read-then-write.

mod clients;
mod codes;
mod tokens;

use crate::errors::{AppError, AppResult};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

/// Database manager for OAuth client and credential storage
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection pool and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot connect or migrations fail
    pub async fn new(database_url: &str) -> AppResult<Self> {
        // Ensure SQLite creates the database file if it doesn't exist
        let connection_options = if database_url.starts_with("sqlite:")
            && !database_url.contains(":memory:")
            && !database_url.contains('?')
        {
            format!("{database_url}?mode=rwc")
        } else {
            database_url.to_owned()
        };

        // An in-memory SQLite database exists per connection; cap the pool at
        // one connection so every request sees the same database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&connection_options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to {database_url}: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if table creation fails
    pub async fn migrate(&self) -> AppResult<()> {
        self.migrate_clients().await?;
        self.migrate_auth_codes().await?;
        self.migrate_tokens().await?;
        Ok(())
    }

    async fn migrate_clients(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_clients (
                client_id TEXT PRIMARY KEY,
                client_secret_hash TEXT,
                redirect_uris TEXT NOT NULL,
                allowed_grant_types TEXT NOT NULL,
                is_confidential BOOLEAN NOT NULL DEFAULT false,
                client_name TEXT,
                created_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn migrate_auth_codes(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS auth_codes (
                code TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                scope TEXT,
                code_challenge TEXT,
                code_challenge_method TEXT,
                expires_at INTEGER NOT NULL,
                consumed BOOLEAN NOT NULL DEFAULT false,
                family_id TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn migrate_tokens(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS access_tokens (
                token TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                scope TEXT,
                issued_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                revoked BOOLEAN NOT NULL DEFAULT false,
                refresh_token TEXT,
                family_id TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_access_tokens_family ON access_tokens(family_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS refresh_tokens (
                token TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                scope TEXT,
                issued_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                revoked BOOLEAN NOT NULL DEFAULT false,
                rotated_from TEXT,
                family_id TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_family ON refresh_tokens(family_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
