// ABOUTME: OAuth 2.0 persistence models for clients, authorization codes, and tokens
// ABOUTME: Owned exclusively by the credential stores; endpoints never mutate them directly
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Registered OAuth 2.0 client
///
/// Created and updated by the external administration surface; immutable at
/// request time. `redirect_uris` membership is exact string match only.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// OAuth 2.0 client identifier (public, stable)
    pub client_id: String,
    /// Argon2 hash of the client secret; `None` for public clients
    pub client_secret_hash: Option<String>,
    /// Registered redirect URIs for the authorization code flow
    pub redirect_uris: Vec<String>,
    /// Allowed OAuth 2.0 grant types (`authorization_code`, `refresh_token`)
    pub allowed_grant_types: Vec<String>,
    /// Whether the client can keep a secret (server-side app vs. SPA/native)
    pub is_confidential: bool,
    /// Human-readable client name
    pub client_name: Option<String>,
    /// When this client was registered
    pub created_at: DateTime<Utc>,
}

impl OAuthClient {
    /// Whether the given grant type is permitted for this client
    #[must_use]
    pub fn allows_grant_type(&self, grant_type: &str) -> bool {
        self.allowed_grant_types.iter().any(|g| g == grant_type)
    }
}

/// Single-use, short-lived authorization code
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    /// The authorization code value (256-bit random, base64url)
    pub code: String,
    /// Client ID that requested this code
    pub client_id: String,
    /// Resource owner who authorized the code
    pub user_id: Uuid,
    /// Redirect URI supplied at authorization time, re-checked at exchange
    pub redirect_uri: String,
    /// Space-separated list of granted scopes
    pub scope: Option<String>,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE code challenge method (`S256` only)
    pub code_challenge_method: Option<String>,
    /// When this authorization code expires
    pub expires_at: DateTime<Utc>,
    /// Whether this code has been exchanged for tokens
    pub consumed: bool,
    /// Token family minted at consumption; lets a replayed code locate the
    /// tokens it already issued so they can be revoked
    pub family_id: Option<Uuid>,
}

/// Opaque bearer access token
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The access token value
    pub token: String,
    /// Client ID that owns this token
    pub client_id: String,
    /// Resource owner the token acts for
    pub user_id: Uuid,
    /// Space-separated list of granted scopes
    pub scope: Option<String>,
    /// When this token was created
    pub issued_at: DateTime<Utc>,
    /// When this token expires
    pub expires_at: DateTime<Utc>,
    /// Whether this token has been revoked
    pub revoked: bool,
    /// Refresh token that minted this access token, if any
    pub refresh_token: Option<String>,
    /// Token family shared with the refresh-token rotation chain
    pub family_id: Uuid,
}

impl AccessToken {
    /// Whether the token is currently usable
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

/// Rotating refresh token
#[derive(Debug, Clone)]
pub struct RefreshToken {
    /// The refresh token value
    pub token: String,
    /// Client application identifier
    pub client_id: String,
    /// Resource owner who owns this token
    pub user_id: Uuid,
    /// Space-separated list of granted scopes
    pub scope: Option<String>,
    /// When this refresh token was created
    pub issued_at: DateTime<Utc>,
    /// When this refresh token expires
    pub expires_at: DateTime<Utc>,
    /// Whether this refresh token has been revoked (rotation revokes too)
    pub revoked: bool,
    /// Predecessor in the rotation chain, if this token was minted by a refresh
    pub rotated_from: Option<String>,
    /// Family shared by every token descended from one authorization
    pub family_id: Uuid,
}

impl RefreshToken {
    /// Whether the token is currently usable
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}
