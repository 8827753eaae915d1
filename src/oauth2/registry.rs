// ABOUTME: Registered-client registry: lookup, secret verification, and admin-side registration
// ABOUTME: Pure lookup at request time; writes arrive only through the external administration surface
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::models::OAuth2Error;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::models::OAuthClient;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;
use uuid::Uuid;

/// Parameters for registering a client through the administration surface
#[derive(Debug, Clone)]
pub struct ClientRegistration {
    /// Redirect URIs for the authorization code flow
    pub redirect_uris: Vec<String>,
    /// Grant types the client can use; defaults to the code grant plus refresh
    pub grant_types: Option<Vec<String>>,
    /// Whether the client can hold a secret
    pub is_confidential: bool,
    /// Optional display name
    pub client_name: Option<String>,
}

/// A freshly registered client together with its one-time plaintext secret
#[derive(Debug)]
pub struct RegisteredClient {
    /// The stored client record
    pub client: OAuthClient,
    /// Plaintext secret, returned exactly once; only the hash is stored
    pub client_secret: Option<String>,
}

/// OAuth 2.0 client registry
///
/// Every endpoint resolves `client_id` through this registry; nothing here
/// mutates client records at request time.
#[derive(Clone)]
pub struct ClientRegistry {
    database: Arc<Database>,
}

impl ClientRegistry {
    /// Creates a new client registry over the given store
    #[must_use]
    pub const fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Look up a client by `client_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the store lookup fails
    pub async fn lookup(&self, client_id: &str) -> AppResult<Option<OAuthClient>> {
        self.database.get_client(client_id).await
    }

    /// Resolve and authenticate a client for the token endpoint
    ///
    /// Confidential clients must present their secret; public clients have
    /// none to present. Resolution failure and authentication failure are
    /// deliberately the same `invalid_client`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` on unknown client or failed authentication
    pub async fn authenticate(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> AppResult<Result<OAuthClient, OAuth2Error>> {
        let Some(client) = self.lookup(client_id).await? else {
            tracing::warn!("OAuth client {} not found", client_id);
            return Ok(Err(OAuth2Error::invalid_client()));
        };

        if client.is_confidential {
            let Some(stored_hash) = client.client_secret_hash.as_deref() else {
                tracing::error!(
                    "Confidential client {} has no stored secret hash",
                    client_id
                );
                return Ok(Err(OAuth2Error::invalid_client()));
            };

            let Some(secret) = client_secret else {
                tracing::warn!(
                    "Confidential client {} attempted token request without a secret",
                    client_id
                );
                return Ok(Err(OAuth2Error::invalid_client()));
            };

            if verify_client_secret(secret, stored_hash).is_err() {
                tracing::warn!("OAuth client {} secret validation failed", client_id);
                return Ok(Err(OAuth2Error::invalid_client()));
            }
        }

        Ok(Ok(client))
    }

    /// Register a new client (administration surface, never request time)
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or storage fails
    pub async fn register(&self, request: ClientRegistration) -> AppResult<RegisteredClient> {
        validate_registration(&request)?;

        let client_id = generate_client_id();

        let (client_secret, client_secret_hash) = if request.is_confidential {
            let secret = generate_client_secret()?;
            let hash = hash_client_secret(&secret)?;
            (Some(secret), Some(hash))
        } else {
            (None, None)
        };

        let grant_types = request.grant_types.unwrap_or_else(|| {
            vec!["authorization_code".to_owned(), "refresh_token".to_owned()]
        });

        let client = OAuthClient {
            client_id: client_id.clone(),
            client_secret_hash,
            redirect_uris: request.redirect_uris,
            allowed_grant_types: grant_types,
            is_confidential: request.is_confidential,
            client_name: request.client_name,
            created_at: Utc::now(),
        };

        self.database.store_client(&client).await.map_err(|e| {
            tracing::error!(error = %e, client_id = %client_id, "Failed to store OAuth client registration");
            e
        })?;

        tracing::info!(
            "Registered OAuth client {} (confidential={})",
            client_id,
            client.is_confidential
        );

        Ok(RegisteredClient {
            client,
            client_secret,
        })
    }
}

/// Verify a client secret against its Argon2 hash
fn verify_client_secret(client_secret: &str, client_secret_hash: &str) -> AppResult<()> {
    let parsed_hash = PasswordHash::new(client_secret_hash).map_err(|e| {
        AppError::internal(format!("Failed to parse stored client secret hash: {e}"))
    })?;

    Argon2::default()
        .verify_password(client_secret.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::auth_invalid("Client secret mismatch"))
}

/// Validate registration request fields
fn validate_registration(request: &ClientRegistration) -> AppResult<()> {
    if request.redirect_uris.is_empty() {
        return Err(AppError::invalid_input(
            "At least one redirect_uri is required",
        ));
    }

    for uri in &request.redirect_uris {
        if !is_valid_redirect_uri(uri) {
            return Err(AppError::invalid_input(format!(
                "Invalid redirect_uri: {uri}"
            )));
        }
    }

    if let Some(ref grant_types) = request.grant_types {
        for grant_type in grant_types {
            if !matches!(grant_type.as_str(), "authorization_code" | "refresh_token") {
                return Err(AppError::invalid_input(format!(
                    "Unsupported grant_type: {grant_type}"
                )));
            }
        }
    }

    Ok(())
}

/// Check if a redirect URI is acceptable for registration
///
/// RFC 6749 Section 3.1.2.2: absolute URI, no fragment. Wildcards are
/// rejected, and http is only accepted for loopback hosts.
fn is_valid_redirect_uri(uri: &str) -> bool {
    if uri.trim().is_empty() || uri.contains('#') || uri.contains('*') {
        return false;
    }

    let Ok(parsed) = url::Url::parse(uri) else {
        tracing::warn!("Rejected malformed redirect_uri: {}", uri);
        return false;
    };

    let is_loopback =
        parsed.host_str() == Some("localhost") || parsed.host_str() == Some("127.0.0.1");

    match parsed.scheme() {
        "https" => true,
        "http" if is_loopback => true,
        _ => {
            tracing::warn!(
                "Rejected redirect_uri with non-HTTPS scheme for non-loopback host: {}",
                uri
            );
            false
        }
    }
}

/// Generate a client identifier
fn generate_client_id() -> String {
    format!("gh_client_{}", Uuid::new_v4().simple())
}

/// Generate a client secret from the system RNG
fn generate_client_secret() -> AppResult<String> {
    let rng = SystemRandom::new();
    let mut secret = [0u8; 32];
    rng.fill(&mut secret).map_err(|_| {
        tracing::error!("System RNG failure - cannot generate secure client secret");
        AppError::internal("System RNG failure - cannot generate secure client secret")
    })?;

    Ok(general_purpose::STANDARD.encode(secret))
}

/// Hash a client secret for storage using Argon2id with a random salt
fn hash_client_secret(secret: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| AppError::internal(format!("Argon2 password hashing failed: {e}")))?;

    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_uri_rules() {
        assert!(is_valid_redirect_uri("https://app.example.com/callback"));
        assert!(is_valid_redirect_uri("http://localhost:8080/callback"));
        assert!(is_valid_redirect_uri("http://127.0.0.1:3000/cb"));

        assert!(!is_valid_redirect_uri("http://app.example.com/callback"));
        assert!(!is_valid_redirect_uri("https://app.example.com/cb#frag"));
        assert!(!is_valid_redirect_uri("https://*.example.com/cb"));
        assert!(!is_valid_redirect_uri("not a uri"));
        assert!(!is_valid_redirect_uri(""));
    }

    #[test]
    fn test_secret_hash_roundtrip() {
        let secret = generate_client_secret().unwrap();
        let hash = hash_client_secret(&secret).unwrap();

        assert!(verify_client_secret(&secret, &hash).is_ok());
        assert!(verify_client_secret("wrong-secret", &hash).is_err());
    }

    #[test]
    fn test_client_id_prefix() {
        let id = generate_client_id();
        assert!(id.starts_with("gh_client_"));
    }
}
