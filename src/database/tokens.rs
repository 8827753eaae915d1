// ABOUTME: Access- and refresh-token stores with atomic rotation and family revocation
// ABOUTME: Refresh consumption is one conditional UPDATE; losing that race is a theft signal upstream
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{AccessToken, RefreshToken};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Store a newly issued access token
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn store_access_token(&self, token: &AccessToken) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO access_tokens (
                token, client_id, user_id, scope, issued_at, expires_at,
                revoked, refresh_token, family_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(&token.token)
        .bind(&token.client_id)
        .bind(token.user_id.to_string())
        .bind(&token.scope)
        .bind(token.issued_at.timestamp())
        .bind(token.expires_at.timestamp())
        .bind(token.revoked)
        .bind(&token.refresh_token)
        .bind(token.family_id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to store access token: {e}")))?;

        Ok(())
    }

    /// Look up an access token by value
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored row is malformed
    pub async fn get_access_token(&self, token: &str) -> AppResult<Option<AccessToken>> {
        let row = sqlx::query(
            r"
            SELECT token, client_id, user_id, scope, issued_at, expires_at,
                   revoked, refresh_token, family_id
            FROM access_tokens
            WHERE token = $1
            ",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to query access token: {e}")))?;

        row.map(row_to_access_token).transpose()
    }

    /// Revoke a single access token; returns whether a live token was revoked
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn revoke_access_token(&self, token: &str) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE access_tokens SET revoked = true WHERE token = $1 AND revoked = false")
                .bind(token)
                .execute(self.pool())
                .await
                .map_err(|e| AppError::database(format!("Failed to revoke access token: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Store a newly issued refresh token
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn store_refresh_token(&self, token: &RefreshToken) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO refresh_tokens (
                token, client_id, user_id, scope, issued_at, expires_at,
                revoked, rotated_from, family_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(&token.token)
        .bind(&token.client_id)
        .bind(token.user_id.to_string())
        .bind(&token.scope)
        .bind(token.issued_at.timestamp())
        .bind(token.expires_at.timestamp())
        .bind(token.revoked)
        .bind(&token.rotated_from)
        .bind(token.family_id.to_string())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to store refresh token: {e}")))?;

        Ok(())
    }

    /// Look up a refresh token by value
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored row is malformed
    pub async fn get_refresh_token(&self, token: &str) -> AppResult<Option<RefreshToken>> {
        let row = sqlx::query(
            r"
            SELECT token, client_id, user_id, scope, issued_at, expires_at,
                   revoked, rotated_from, family_id
            FROM refresh_tokens
            WHERE token = $1
            ",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to query refresh token: {e}")))?;

        row.map(row_to_refresh_token).transpose()
    }

    /// Atomically consume a refresh token for rotation
    ///
    /// Marks the token revoked only if it is still live, bound to the given
    /// client, and unexpired, all in one conditional `UPDATE`. `None` means
    /// the token lost the race or never qualified; the caller decides whether
    /// that is a theft signal.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage operation fails
    pub async fn consume_refresh_token(
        &self,
        token: &str,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<RefreshToken>> {
        let result = sqlx::query(
            r"
            UPDATE refresh_tokens
            SET revoked = true
            WHERE token = $1
              AND client_id = $2
              AND revoked = false
              AND expires_at > $3
            ",
        )
        .bind(token)
        .bind(client_id)
        .bind(now.timestamp())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to consume refresh token: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_refresh_token(token).await
    }

    /// Revoke a single refresh token; returns whether a live token was revoked
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn revoke_refresh_token(&self, token: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = true WHERE token = $1 AND revoked = false",
        )
        .bind(token)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to revoke refresh token: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke every access and refresh token in a family
    ///
    /// The theft response: called on authorization-code replay and on reuse
    /// of a rotated-out refresh token. Returns the number of tokens revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if either update fails
    pub async fn revoke_family(&self, family_id: Uuid) -> AppResult<u64> {
        let family = family_id.to_string();

        let access = sqlx::query(
            "UPDATE access_tokens SET revoked = true WHERE family_id = $1 AND revoked = false",
        )
        .bind(&family)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to revoke access-token family: {e}")))?;

        let refresh = sqlx::query(
            "UPDATE refresh_tokens SET revoked = true WHERE family_id = $1 AND revoked = false",
        )
        .bind(&family)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to revoke refresh-token family: {e}")))?;

        Ok(access.rows_affected() + refresh.rows_affected())
    }
}

fn row_to_access_token(r: SqliteRow) -> AppResult<AccessToken> {
    let user_id = Uuid::parse_str(r.get::<String, _>("user_id").as_str())
        .map_err(|e| AppError::database(format!("Malformed user_id in access_tokens: {e}")))?;
    let family_id = Uuid::parse_str(r.get::<String, _>("family_id").as_str())
        .map_err(|e| AppError::database(format!("Malformed family_id in access_tokens: {e}")))?;
    let issued_at = DateTime::from_timestamp(r.get::<i64, _>("issued_at"), 0)
        .ok_or_else(|| AppError::database("Invalid issued_at timestamp in access_tokens"))?;
    let expires_at = DateTime::from_timestamp(r.get::<i64, _>("expires_at"), 0)
        .ok_or_else(|| AppError::database("Invalid expires_at timestamp in access_tokens"))?;

    Ok(AccessToken {
        token: r.get("token"),
        client_id: r.get("client_id"),
        user_id,
        scope: r.get("scope"),
        issued_at,
        expires_at,
        revoked: r.get("revoked"),
        refresh_token: r.get("refresh_token"),
        family_id,
    })
}

fn row_to_refresh_token(r: SqliteRow) -> AppResult<RefreshToken> {
    let user_id = Uuid::parse_str(r.get::<String, _>("user_id").as_str())
        .map_err(|e| AppError::database(format!("Malformed user_id in refresh_tokens: {e}")))?;
    let family_id = Uuid::parse_str(r.get::<String, _>("family_id").as_str())
        .map_err(|e| AppError::database(format!("Malformed family_id in refresh_tokens: {e}")))?;
    let issued_at = DateTime::from_timestamp(r.get::<i64, _>("issued_at"), 0)
        .ok_or_else(|| AppError::database("Invalid issued_at timestamp in refresh_tokens"))?;
    let expires_at = DateTime::from_timestamp(r.get::<i64, _>("expires_at"), 0)
        .ok_or_else(|| AppError::database("Invalid expires_at timestamp in refresh_tokens"))?;

    Ok(RefreshToken {
        token: r.get("token"),
        client_id: r.get("client_id"),
        user_id,
        scope: r.get("scope"),
        issued_at,
        expires_at,
        revoked: r.get("revoked"),
        rotated_from: r.get("rotated_from"),
        family_id,
    })
}
