// ABOUTME: OAuth 2.0 authorization, token, revocation, and introspection endpoint logic
// ABOUTME: Code consumption and refresh rotation are atomic; losing either race revokes the token family
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::models::{
    AuthorizeOutcome, AuthorizeRequest, IntrospectionResponse, OAuth2Error, RevokeRequest,
    TokenOutcome, TokenRequest, TokenResponse,
};
use super::pkce;
use super::registry::ClientRegistry;
use crate::config::ServerConfig;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{AccessToken, AuthorizationCode, OAuthClient, RefreshToken};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use uuid::Uuid;

/// OAuth 2.0 Authorization Server
///
/// Stateless request handler over the injected credential stores; any number
/// of requests may execute concurrently. The store operations it relies on
/// for single-use semantics are single conditional updates (see
/// [`Database::consume_auth_code`] and [`Database::consume_refresh_token`]).
pub struct OAuth2AuthorizationServer {
    database: Arc<Database>,
    registry: ClientRegistry,
    auth_code_ttl: Duration,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl OAuth2AuthorizationServer {
    /// Create the server core over the given stores and lifetimes
    #[must_use]
    pub fn new(database: Arc<Database>, config: &ServerConfig) -> Self {
        let registry = ClientRegistry::new(database.clone());

        Self {
            database,
            registry,
            auth_code_ttl: Duration::seconds(config.auth_code_ttl_secs),
            access_token_ttl: Duration::seconds(config.access_token_ttl_secs),
            refresh_token_ttl: Duration::days(config.refresh_token_ttl_days),
        }
    }

    /// Access to the client registry for the administration surface
    #[must_use]
    pub const fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Handle an authorization request (GET /oauth/authorize)
    ///
    /// Validation order is fixed: response type, client resolution, redirect
    /// binding, state, PKCE, then authentication. A failed validation never
    /// redirects to the supplied URI and never creates state.
    ///
    /// # Errors
    ///
    /// Returns an error only for store failures; protocol denials are carried
    /// in the [`AuthorizeOutcome`]
    pub async fn authorize(
        &self,
        request: AuthorizeRequest,
        user_id: Option<Uuid>,
    ) -> AppResult<AuthorizeOutcome> {
        if request.response_type != "code" {
            return Ok(AuthorizeOutcome::Denied(OAuth2Error::invalid_request(
                "Only 'code' response_type is supported",
            )));
        }

        // Unknown clients get the same error code as other malformed requests
        // so this endpoint cannot be used to probe for registered client ids.
        let Some(client) = self.registry.lookup(&request.client_id).await? else {
            tracing::warn!("Authorization request for unknown client_id");
            return Ok(AuthorizeOutcome::Denied(OAuth2Error::invalid_request(
                "Invalid client_id",
            )));
        };

        if url::Url::parse(&request.redirect_uri).is_err() {
            return Ok(AuthorizeOutcome::Denied(OAuth2Error::invalid_request(
                "redirect_uri must be a valid absolute URI",
            )));
        }

        // Exact string match against the registered set; no prefix or pattern
        // matching. Never redirect to a URI that fails this check.
        if !client.redirect_uris.contains(&request.redirect_uri) {
            tracing::warn!(
                "Authorization request with unregistered redirect_uri for client {}",
                client.client_id
            );
            return Ok(AuthorizeOutcome::Denied(OAuth2Error::invalid_request(
                "Invalid redirect_uri",
            )));
        }

        // Stricter than RFC 6749: state is required on every request.
        let Some(state) = request.state.filter(|s| !s.is_empty()) else {
            return Ok(AuthorizeOutcome::Denied(OAuth2Error::invalid_request(
                "state parameter is required",
            )));
        };

        if !client.allows_grant_type("authorization_code") {
            return Ok(AuthorizeOutcome::Denied(OAuth2Error::invalid_request(
                "Client is not authorized for the authorization_code grant",
            )));
        }

        if let Some(ref code_challenge) = request.code_challenge {
            // base64url(SHA-256) is 43 characters; RFC 7636 caps at 128
            if code_challenge.len() < 43 || code_challenge.len() > 128 {
                return Ok(AuthorizeOutcome::Denied(OAuth2Error::invalid_request(
                    "code_challenge must be between 43 and 128 characters",
                )));
            }

            let method = request.code_challenge_method.as_deref().unwrap_or("S256");
            if method != "S256" {
                return Ok(AuthorizeOutcome::Denied(OAuth2Error::invalid_request(
                    "code_challenge_method must be 'S256'",
                )));
            }
        } else if !client.is_confidential {
            return Ok(AuthorizeOutcome::Denied(OAuth2Error::invalid_request(
                "code_challenge is required for public clients",
            )));
        }

        // Validation is done; authentication is the external collaborator's
        // job, so an anonymous request defers to the login system.
        let Some(user_id) = user_id else {
            return Ok(AuthorizeOutcome::LoginRequired);
        };

        let code = generate_token_value()?;
        let auth_code = AuthorizationCode {
            code: code.clone(),
            client_id: client.client_id.clone(),
            user_id,
            redirect_uri: request.redirect_uri.clone(),
            scope: request.scope,
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: request
                .code_challenge
                .is_some()
                .then(|| "S256".to_owned()),
            expires_at: Utc::now() + self.auth_code_ttl,
            consumed: false,
            family_id: None,
        };

        self.database.store_auth_code(&auth_code).await?;

        tracing::info!(
            "Issued authorization code for client {} and user {}",
            client.client_id,
            user_id
        );

        Ok(AuthorizeOutcome::Granted {
            redirect_uri: request.redirect_uri,
            code,
            state,
        })
    }

    /// Handle a token request (POST /oauth/token)
    ///
    /// # Errors
    ///
    /// Returns an error only for store failures; protocol denials are carried
    /// in the [`TokenOutcome`]
    pub async fn token(&self, request: TokenRequest) -> AppResult<TokenOutcome> {
        let client = match self
            .registry
            .authenticate(&request.client_id, request.client_secret.as_deref())
            .await?
        {
            Ok(client) => client,
            Err(error) => return Ok(TokenOutcome::Denied(error)),
        };

        match request.grant_type.as_str() {
            "authorization_code" => self.handle_authorization_code_grant(request, &client).await,
            "refresh_token" => self.handle_refresh_token_grant(request, &client).await,
            _ => Ok(TokenOutcome::Denied(OAuth2Error::unsupported_grant_type())),
        }
    }

    /// Handle the authorization code grant
    async fn handle_authorization_code_grant(
        &self,
        request: TokenRequest,
        client: &OAuthClient,
    ) -> AppResult<TokenOutcome> {
        if !client.allows_grant_type("authorization_code") {
            return Ok(TokenOutcome::Denied(OAuth2Error::invalid_client()));
        }

        let Some(code) = request.code else {
            return Ok(TokenOutcome::Denied(OAuth2Error::invalid_request(
                "Missing authorization code",
            )));
        };

        let Some(redirect_uri) = request.redirect_uri else {
            return Ok(TokenOutcome::Denied(OAuth2Error::invalid_request(
                "Missing redirect_uri",
            )));
        };

        // The conditional update validates client binding, redirect binding,
        // expiry, and single-use in one statement; the family id it stamps is
        // what a later replay will be traced back through.
        let family_id = Uuid::new_v4();
        let consumed = self
            .database
            .consume_auth_code(&code, &client.client_id, &redirect_uri, family_id, Utc::now())
            .await?;

        let Some(auth_code) = consumed else {
            self.handle_failed_code_consumption(&code, &client.client_id)
                .await?;
            // Missing, expired, consumed, and mismatched codes are
            // indistinguishable to the caller.
            return Ok(TokenOutcome::Denied(OAuth2Error::invalid_grant(
                "Invalid or expired authorization code",
            )));
        };

        // PKCE verification happens after consumption: a failed verifier
        // kills the code instead of leaving it retryable.
        if let Some(error) = verify_pkce_binding(&auth_code, request.code_verifier.as_deref()) {
            return Ok(TokenOutcome::Denied(error));
        }

        let response = self
            .issue_tokens(
                &client.client_id,
                auth_code.user_id,
                auth_code.scope,
                family_id,
                None,
            )
            .await?;

        tracing::info!(
            "Exchanged authorization code for tokens (client {}, user {})",
            client.client_id,
            auth_code.user_id
        );

        Ok(TokenOutcome::Issued(response))
    }

    /// Replay detection after a failed code consumption
    ///
    /// If the code exists and was already consumed, every token minted from
    /// it is revoked. The caller still reports plain `invalid_grant`.
    async fn handle_failed_code_consumption(&self, code: &str, client_id: &str) -> AppResult<()> {
        let Some(existing) = self.database.get_auth_code(code).await? else {
            return Ok(());
        };

        if existing.consumed {
            if let Some(family) = existing.family_id {
                let revoked = self.database.revoke_family(family).await?;
                tracing::warn!(
                    "Authorization code replay detected for client {}; revoked {} tokens in family {}",
                    client_id,
                    revoked,
                    family
                );
            }
        }

        Ok(())
    }

    /// Handle the refresh token grant with rotation
    async fn handle_refresh_token_grant(
        &self,
        request: TokenRequest,
        client: &OAuthClient,
    ) -> AppResult<TokenOutcome> {
        if !client.allows_grant_type("refresh_token") {
            return Ok(TokenOutcome::Denied(OAuth2Error::invalid_client()));
        }

        let Some(token_value) = request.refresh_token else {
            return Ok(TokenOutcome::Denied(OAuth2Error::invalid_request(
                "Missing refresh_token",
            )));
        };

        let now = Utc::now();
        let denied = || {
            TokenOutcome::Denied(OAuth2Error::invalid_grant(
                "Invalid or expired refresh token",
            ))
        };

        let Some(stored) = self.database.get_refresh_token(&token_value).await? else {
            return Ok(denied());
        };

        if stored.client_id != client.client_id {
            tracing::warn!(
                "Refresh token presented by client {} but issued to a different client",
                client.client_id
            );
            return Ok(denied());
        }

        // A revoked token here means the rotation already happened: whoever
        // holds this value is replaying a stale credential. Kill the family.
        if stored.revoked {
            let revoked = self.database.revoke_family(stored.family_id).await?;
            tracing::warn!(
                "Reuse of rotated refresh token for client {}; revoked {} tokens in family {}",
                client.client_id,
                revoked,
                stored.family_id
            );
            return Ok(denied());
        }

        if stored.expires_at <= now {
            return Ok(denied());
        }

        let scope = match narrow_scope(stored.scope.as_deref(), request.scope.as_deref()) {
            Ok(scope) => scope,
            Err(error) => return Ok(TokenOutcome::Denied(error)),
        };

        // Atomic rotation: only one concurrent request can flip the revoked
        // flag. Losing this race is the same theft signal as replaying a
        // rotated-out token, not a benign conflict.
        let Some(old) = self
            .database
            .consume_refresh_token(&token_value, &client.client_id, now)
            .await?
        else {
            let revoked = self.database.revoke_family(stored.family_id).await?;
            tracing::warn!(
                "Concurrent refresh-token redemption for client {}; revoked {} tokens in family {}",
                client.client_id,
                revoked,
                stored.family_id
            );
            return Ok(denied());
        };

        let response = self
            .issue_tokens(
                &client.client_id,
                old.user_id,
                scope,
                old.family_id,
                Some(old.token.clone()),
            )
            .await?;

        tracing::info!(
            "Refresh token rotated for client {} and user {}",
            client.client_id,
            old.user_id
        );

        Ok(TokenOutcome::Issued(response))
    }

    /// Handle a revocation request (POST /oauth/revoke, RFC 7009)
    ///
    /// The hint selects which store is probed first; the other is probed on a
    /// miss. The result is identical whether or not the token existed, so the
    /// endpoint cannot be used to enumerate live tokens. Revoking a refresh
    /// token takes its whole family down.
    ///
    /// # Errors
    ///
    /// Returns an error only for store failures
    pub async fn revoke(&self, request: &RevokeRequest) -> AppResult<()> {
        if request.token_type_hint.as_deref() == Some("refresh_token") {
            if self.try_revoke_refresh_token(&request.token).await? {
                return Ok(());
            }
            self.try_revoke_access_token(&request.token).await?;
        } else {
            if self.try_revoke_access_token(&request.token).await? {
                return Ok(());
            }
            self.try_revoke_refresh_token(&request.token).await?;
        }

        Ok(())
    }

    async fn try_revoke_access_token(&self, token: &str) -> AppResult<bool> {
        let Some(_stored) = self.database.get_access_token(token).await? else {
            return Ok(false);
        };

        self.database.revoke_access_token(token).await?;
        tracing::info!("Revoked access token");
        Ok(true)
    }

    async fn try_revoke_refresh_token(&self, token: &str) -> AppResult<bool> {
        let Some(stored) = self.database.get_refresh_token(token).await? else {
            return Ok(false);
        };

        let revoked = self.database.revoke_family(stored.family_id).await?;
        tracing::info!(
            "Revoked refresh token and {} dependents in family {}",
            revoked,
            stored.family_id
        );
        Ok(true)
    }

    /// Handle an introspection request (POST /oauth/introspect, RFC 7662)
    ///
    /// Never an error for a bad, missing, or unknown token: the contract is
    /// "tell me whether this is currently usable", and every unusable case is
    /// the same `active: false`.
    ///
    /// # Errors
    ///
    /// Returns an error only for store failures
    pub async fn introspect(
        &self,
        token: Option<&str>,
        token_type_hint: Option<&str>,
    ) -> AppResult<IntrospectionResponse> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(IntrospectionResponse::inactive());
        };

        let now = Utc::now();

        if token_type_hint == Some("refresh_token") {
            if let Some(response) = self.introspect_refresh_token(token, now).await? {
                return Ok(response);
            }
            if let Some(response) = self.introspect_access_token(token, now).await? {
                return Ok(response);
            }
        } else {
            if let Some(response) = self.introspect_access_token(token, now).await? {
                return Ok(response);
            }
            if let Some(response) = self.introspect_refresh_token(token, now).await? {
                return Ok(response);
            }
        }

        Ok(IntrospectionResponse::inactive())
    }

    async fn introspect_access_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<IntrospectionResponse>> {
        Ok(self.database.get_access_token(token).await?.map(|stored| {
            if stored.is_active(now) {
                IntrospectionResponse {
                    active: true,
                    client_id: Some(stored.client_id),
                    scope: stored.scope,
                    exp: Some(stored.expires_at.timestamp()),
                    sub: Some(stored.user_id.to_string()),
                }
            } else {
                IntrospectionResponse::inactive()
            }
        }))
    }

    async fn introspect_refresh_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<IntrospectionResponse>> {
        Ok(self.database.get_refresh_token(token).await?.map(|stored| {
            if stored.is_active(now) {
                IntrospectionResponse {
                    active: true,
                    client_id: Some(stored.client_id),
                    scope: stored.scope,
                    exp: Some(stored.expires_at.timestamp()),
                    sub: Some(stored.user_id.to_string()),
                }
            } else {
                IntrospectionResponse::inactive()
            }
        }))
    }

    /// Mint and store an access/refresh token pair
    async fn issue_tokens(
        &self,
        client_id: &str,
        user_id: Uuid,
        scope: Option<String>,
        family_id: Uuid,
        rotated_from: Option<String>,
    ) -> AppResult<TokenResponse> {
        let now = Utc::now();
        let access_value = generate_token_value()?;
        let refresh_value = generate_token_value()?;

        let refresh_token = RefreshToken {
            token: refresh_value.clone(),
            client_id: client_id.to_owned(),
            user_id,
            scope: scope.clone(),
            issued_at: now,
            expires_at: now + self.refresh_token_ttl,
            revoked: false,
            rotated_from,
            family_id,
        };

        let access_token = AccessToken {
            token: access_value.clone(),
            client_id: client_id.to_owned(),
            user_id,
            scope: scope.clone(),
            issued_at: now,
            expires_at: now + self.access_token_ttl,
            revoked: false,
            refresh_token: Some(refresh_value.clone()),
            family_id,
        };

        self.database.store_refresh_token(&refresh_token).await?;
        self.database.store_access_token(&access_token).await?;

        // Remaining lifetime is computed against the stored expiry at
        // response time, not cached at mint time.
        let expires_in = (access_token.expires_at - Utc::now()).num_seconds();

        Ok(TokenResponse {
            access_token: access_value,
            token_type: "Bearer".to_owned(),
            expires_in,
            refresh_token: refresh_value,
            scope,
        })
    }
}

/// Verify the PKCE binding of a consumed authorization code
///
/// Returns the protocol error to surface, or `None` when the binding holds.
fn verify_pkce_binding(
    auth_code: &AuthorizationCode,
    code_verifier: Option<&str>,
) -> Option<OAuth2Error> {
    let Some(stored_challenge) = auth_code.code_challenge.as_deref() else {
        if code_verifier.is_some() {
            return Some(OAuth2Error::invalid_grant(
                "code_verifier provided but no code_challenge was issued",
            ));
        }
        return None;
    };

    let Some(verifier) = code_verifier else {
        return Some(OAuth2Error::invalid_grant("code_verifier is required"));
    };

    if pkce::validate_verifier_format(verifier).is_err() {
        return Some(OAuth2Error::invalid_grant(
            "code_verifier must be 43-128 characters from the RFC 7636 unreserved set",
        ));
    }

    if !pkce::verify_s256(verifier, stored_challenge) {
        tracing::warn!(
            "PKCE verification failed for client {} - code_verifier does not match code_challenge",
            auth_code.client_id
        );
        return Some(OAuth2Error::invalid_grant("Invalid code_verifier"));
    }

    None
}

/// Narrow the granted scope on refresh
///
/// A requested scope must be a subset of the original grant; a widening
/// attempt is a grant mismatch, not a request-format problem.
fn narrow_scope(
    original: Option<&str>,
    requested: Option<&str>,
) -> Result<Option<String>, OAuth2Error> {
    let Some(requested) = requested.filter(|s| !s.is_empty()) else {
        return Ok(original.map(str::to_owned));
    };

    let granted: Vec<&str> = original.map_or_else(Vec::new, |s| s.split(' ').collect());

    for scope in requested.split(' ') {
        if !granted.contains(&scope) {
            return Err(OAuth2Error::invalid_grant(
                "Requested scope exceeds the original grant",
            ));
        }
    }

    Ok(Some(requested.to_owned()))
}

/// Generate an opaque credential value: 256 bits from the system RNG,
/// base64url encoded
fn generate_token_value() -> AppResult<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; 32];

    rng.fill(&mut bytes).map_err(|_| {
        tracing::error!("CRITICAL: SystemRandom failed - cannot generate secure random bytes");
        AppError::internal("System RNG failure - server cannot operate securely")
    })?;

    Ok(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}
