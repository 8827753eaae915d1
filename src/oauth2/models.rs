// ABOUTME: OAuth 2.0 wire-level request, response, and error structures
// ABOUTME: Endpoint outcomes are tagged results so wire mapping happens in exactly one place
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use serde::{Deserialize, Serialize};

/// OAuth 2.0 Authorization Request
#[derive(Debug, Deserialize, Clone)]
pub struct AuthorizeRequest {
    /// Response type; only `code` is supported
    pub response_type: String,
    /// Client identifier
    pub client_id: String,
    /// Redirect URI for the response
    pub redirect_uri: String,
    /// State parameter for CSRF protection; required on every request
    pub state: Option<String>,
    /// Requested scopes
    pub scope: Option<String>,
    /// PKCE code challenge (RFC 7636)
    pub code_challenge: Option<String>,
    /// PKCE code challenge method (`S256` only)
    pub code_challenge_method: Option<String>,
}

/// Outcome of an authorization request
///
/// The wire mapping (302 vs. 400) is a single explicit step in the route
/// handler; endpoint logic never touches HTTP types.
#[derive(Debug)]
pub enum AuthorizeOutcome {
    /// Request validated and code minted; redirect to the client
    Granted {
        /// The validated redirect URI to send the user agent to
        redirect_uri: String,
        /// The freshly minted authorization code
        code: String,
        /// The caller's state parameter, echoed back
        state: String,
    },
    /// No authenticated resource owner; defer to the external login system
    LoginRequired,
    /// Validation failed; never redirect to an unvalidated URI
    Denied(OAuth2Error),
}

/// OAuth 2.0 Token Request
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    /// Grant type (`authorization_code` or `refresh_token`)
    pub grant_type: String,
    /// Client ID
    pub client_id: String,
    /// Client secret; required for confidential clients
    pub client_secret: Option<String>,
    /// Authorization code (for `authorization_code` grant)
    pub code: Option<String>,
    /// Redirect URI (must match the one bound at authorization time)
    pub redirect_uri: Option<String>,
    /// PKCE code verifier (RFC 7636)
    pub code_verifier: Option<String>,
    /// Refresh token (for `refresh_token` grant)
    pub refresh_token: Option<String>,
    /// Requested scopes; on refresh may narrow but never widen the grant
    pub scope: Option<String>,
}

/// OAuth 2.0 Token Response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Opaque access token
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Seconds until the access token expires, computed at response time
    pub expires_in: i64,
    /// Opaque refresh token
    pub refresh_token: String,
    /// Scopes granted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Outcome of a token request
#[derive(Debug)]
pub enum TokenOutcome {
    /// Tokens issued
    Issued(TokenResponse),
    /// Exchange rejected with a protocol error
    Denied(OAuth2Error),
}

/// Revocation request (RFC 7009)
#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    /// The token to revoke
    pub token: String,
    /// Optional hint (`access_token` or `refresh_token`); an optimization,
    /// never a correctness requirement
    pub token_type_hint: Option<String>,
}

/// Revocation response body
///
/// Identical for existing, unknown, expired, and already-revoked tokens so
/// the endpoint cannot be used as an existence oracle.
#[derive(Debug, Serialize, Deserialize)]
pub struct RevokeResponse {
    /// Fixed acknowledgement message
    pub message: String,
}

impl RevokeResponse {
    /// The one acknowledgement every revocation request receives
    #[must_use]
    pub fn acknowledged() -> Self {
        Self {
            message: "Token revoked".to_owned(),
        }
    }
}

/// Introspection request (RFC 7662)
#[derive(Debug, Deserialize)]
pub struct IntrospectRequest {
    /// The token to introspect
    pub token: Option<String>,
    /// Optional hint (`access_token` or `refresh_token`)
    pub token_type_hint: Option<String>,
}

/// Introspection response (RFC 7662)
///
/// Claims are present only when `active` is true.
#[derive(Debug, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently usable
    pub active: bool,
    /// Client the token was issued to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Space-separated granted scopes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Expiry as unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Resource owner the token acts for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl IntrospectionResponse {
    /// The response for any token that is missing, unknown, expired, or revoked
    #[must_use]
    pub const fn inactive() -> Self {
        Self {
            active: false,
            client_id: None,
            scope: None,
            exp: None,
            sub: None,
        }
    }
}

/// OAuth 2.0 Error Response
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuth2Error {
    /// Error code
    pub error: String,
    /// Human-readable error description
    pub error_description: Option<String>,
    /// URI for error information
    pub error_uri: Option<String>,
}

impl OAuth2Error {
    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self {
            error: "invalid_request".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client() -> Self {
        Self {
            error: "invalid_client".to_owned(),
            error_description: Some("Client authentication failed".to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self {
            error: "invalid_grant".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self {
            error: "unsupported_grant_type".to_owned(),
            error_description: Some("Grant type not supported".to_owned()),
            error_uri: Some("https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned()),
        }
    }
}
