// ABOUTME: Client registry storage operations
// ABOUTME: Read-only at request time; writes come from the external administration surface
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::OAuthClient;
use chrono::DateTime;
use sqlx::Row;

impl Database {
    /// Store a registered OAuth client
    ///
    /// Called by the administration surface and the seed binary only; the
    /// protocol endpoints never write to this table.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the insert fails
    pub async fn store_client(&self, client: &OAuthClient) -> AppResult<()> {
        let redirect_uris = serde_json::to_string(&client.redirect_uris)
            .map_err(|e| AppError::database(format!("Failed to serialize redirect_uris: {e}")))?;
        let grant_types = serde_json::to_string(&client.allowed_grant_types)
            .map_err(|e| AppError::database(format!("Failed to serialize grant_types: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO oauth_clients (
                client_id, client_secret_hash, redirect_uris, allowed_grant_types,
                is_confidential, client_name, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(&client.client_id)
        .bind(&client.client_secret_hash)
        .bind(&redirect_uris)
        .bind(&grant_types)
        .bind(client.is_confidential)
        .bind(&client.client_name)
        .bind(client.created_at.timestamp())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to store OAuth client: {e}")))?;

        Ok(())
    }

    /// Look up a registered client by `client_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored row is malformed
    pub async fn get_client(&self, client_id: &str) -> AppResult<Option<OAuthClient>> {
        let row = sqlx::query(
            r"
            SELECT client_id, client_secret_hash, redirect_uris, allowed_grant_types,
                   is_confidential, client_name, created_at
            FROM oauth_clients
            WHERE client_id = $1
            ",
        )
        .bind(client_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to query OAuth client: {e}")))?;

        row.map(|r| {
            let redirect_uris: Vec<String> =
                serde_json::from_str(r.get::<String, _>("redirect_uris").as_str()).map_err(
                    |e| AppError::database(format!("Malformed redirect_uris for client: {e}")),
                )?;
            let allowed_grant_types: Vec<String> =
                serde_json::from_str(r.get::<String, _>("allowed_grant_types").as_str()).map_err(
                    |e| AppError::database(format!("Malformed grant_types for client: {e}")),
                )?;
            let created_at = DateTime::from_timestamp(r.get::<i64, _>("created_at"), 0)
                .ok_or_else(|| AppError::database("Invalid created_at timestamp"))?;

            Ok(OAuthClient {
                client_id: r.get("client_id"),
                client_secret_hash: r.get("client_secret_hash"),
                redirect_uris,
                allowed_grant_types,
                is_confidential: r.get("is_confidential"),
                client_name: r.get("client_name"),
                created_at,
            })
        })
        .transpose()
    }
}
