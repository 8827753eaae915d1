// ABOUTME: Authorization-code store with atomic single-use consumption
// ABOUTME: Consumption is one conditional UPDATE so concurrent exchanges cannot both redeem a code
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::AuthorizationCode;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Store a freshly minted authorization code
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn store_auth_code(&self, auth_code: &AuthorizationCode) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO auth_codes (
                code, client_id, user_id, redirect_uri, scope,
                code_challenge, code_challenge_method, expires_at, consumed, family_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(&auth_code.code)
        .bind(&auth_code.client_id)
        .bind(auth_code.user_id.to_string())
        .bind(&auth_code.redirect_uri)
        .bind(&auth_code.scope)
        .bind(&auth_code.code_challenge)
        .bind(&auth_code.code_challenge_method)
        .bind(auth_code.expires_at.timestamp())
        .bind(auth_code.consumed)
        .bind(auth_code.family_id.map(|id| id.to_string()))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to store authorization code: {e}")))?;

        Ok(())
    }

    /// Look up an authorization code without consuming it
    ///
    /// Used after a failed consumption to distinguish (internally, never on
    /// the wire) a replayed code from an unknown one.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored row is malformed
    pub async fn get_auth_code(&self, code: &str) -> AppResult<Option<AuthorizationCode>> {
        let row = sqlx::query(
            r"
            SELECT code, client_id, user_id, redirect_uri, scope,
                   code_challenge, code_challenge_method, expires_at, consumed, family_id
            FROM auth_codes
            WHERE code = $1
            ",
        )
        .bind(code)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to query authorization code: {e}")))?;

        row.map(row_to_auth_code).transpose()
    }

    /// Atomically consume an authorization code
    ///
    /// Validates client binding, redirect binding, expiry, and the single-use
    /// flag in one conditional `UPDATE`; the consuming exchange also stamps
    /// `family_id` so a later replay can locate the token family it minted.
    /// Returns `None` when no row satisfied every condition — the caller must
    /// treat the cases as indistinguishable on the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage operation fails
    pub async fn consume_auth_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        family_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<AuthorizationCode>> {
        let result = sqlx::query(
            r"
            UPDATE auth_codes
            SET consumed = true, family_id = $1
            WHERE code = $2
              AND client_id = $3
              AND redirect_uri = $4
              AND consumed = false
              AND expires_at > $5
            ",
        )
        .bind(family_id.to_string())
        .bind(code)
        .bind(client_id)
        .bind(redirect_uri)
        .bind(now.timestamp())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to consume authorization code: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_auth_code(code).await
    }

    /// Delete expired authorization codes, returning the number removed
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn purge_expired_auth_codes(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM auth_codes WHERE expires_at <= $1")
            .bind(now.timestamp())
            .execute(self.pool())
            .await
            .map_err(|e| {
                AppError::database(format!("Failed to purge expired authorization codes: {e}"))
            })?;

        Ok(result.rows_affected())
    }
}

fn row_to_auth_code(r: SqliteRow) -> AppResult<AuthorizationCode> {
    let user_id = Uuid::parse_str(r.get::<String, _>("user_id").as_str())
        .map_err(|e| AppError::database(format!("Malformed user_id in auth_codes: {e}")))?;
    let expires_at = DateTime::from_timestamp(r.get::<i64, _>("expires_at"), 0)
        .ok_or_else(|| AppError::database("Invalid expires_at timestamp in auth_codes"))?;
    let family_id = r
        .get::<Option<String>, _>("family_id")
        .map(|id| {
            Uuid::parse_str(&id)
                .map_err(|e| AppError::database(format!("Malformed family_id in auth_codes: {e}")))
        })
        .transpose()?;

    Ok(AuthorizationCode {
        code: r.get("code"),
        client_id: r.get("client_id"),
        user_id,
        redirect_uri: r.get("redirect_uri"),
        scope: r.get("scope"),
        code_challenge: r.get("code_challenge"),
        code_challenge_method: r.get("code_challenge_method"),
        expires_at,
        consumed: r.get("consumed"),
        family_id,
    })
}
