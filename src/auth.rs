// ABOUTME: Resource-owner authentication seam between the auth server and the platform session system
// ABOUTME: The authorization endpoint only needs "who is logged in"; everything else stays external
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Resource-owner authentication collaborator
//!
//! Establishing *who* the resource owner is happens outside this core. The
//! authorization endpoint consumes the answer through
//! [`ResourceOwnerAuthenticator`]; unauthenticated requests are redirected to
//! the platform login page with enough state to resume the flow.

use crate::errors::AppResult;
use async_trait::async_trait;
use uuid::Uuid;

/// Session cookie name set by the platform login system
pub const SESSION_COOKIE: &str = "gatehouse_session";

/// The external system that knows who is logged in
#[async_trait]
pub trait ResourceOwnerAuthenticator: Send + Sync {
    /// Resolve the authenticated resource owner for a request, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the session backend fails; "not logged in" is
    /// `Ok(None)`, not an error
    async fn authenticated_user(&self, cookie_header: Option<&str>) -> AppResult<Option<Uuid>>;
}

/// Authenticator that treats every request as anonymous
///
/// The production default until the platform session system is wired in:
/// every authorization request is redirected to the external login page.
pub struct DenyAllAuthenticator;

#[async_trait]
impl ResourceOwnerAuthenticator for DenyAllAuthenticator {
    async fn authenticated_user(&self, _cookie_header: Option<&str>) -> AppResult<Option<Uuid>> {
        Ok(None)
    }
}

/// Authenticator that treats every request with a session cookie as the
/// configured resource owner
///
/// Development and test wiring only; enabled in the server binary via
/// `DEV_USER_ID`.
pub struct FixedUserAuthenticator {
    user_id: Uuid,
}

impl FixedUserAuthenticator {
    /// Authenticate every cookie-carrying request as `user_id`
    #[must_use]
    pub const fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

#[async_trait]
impl ResourceOwnerAuthenticator for FixedUserAuthenticator {
    async fn authenticated_user(&self, cookie_header: Option<&str>) -> AppResult<Option<Uuid>> {
        Ok(cookie_header
            .and_then(extract_session_token)
            .map(|_| self.user_id))
    }
}

/// Extract the session token from a Cookie header
#[must_use]
pub fn extract_session_token(cookie_header: &str) -> Option<String> {
    for cookie in cookie_header.split(';') {
        let session_token = cookie
            .trim()
            .strip_prefix(SESSION_COOKIE)
            .and_then(|rest| rest.strip_prefix('='));
        if let Some(session_token) = session_token {
            if !session_token.is_empty() {
                return Some(session_token.to_owned());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_session_token() {
        assert_eq!(
            extract_session_token("gatehouse_session=abc123"),
            Some("abc123".to_owned())
        );
        assert_eq!(
            extract_session_token("theme=dark; gatehouse_session=tok; lang=en"),
            Some("tok".to_owned())
        );
        assert_eq!(extract_session_token("theme=dark"), None);
        assert_eq!(extract_session_token("gatehouse_session="), None);
    }

    #[tokio::test]
    async fn test_deny_all_is_always_anonymous() {
        let authenticator = DenyAllAuthenticator;
        let user = authenticator
            .authenticated_user(Some("gatehouse_session=tok"))
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_fixed_user_requires_cookie() {
        let user_id = Uuid::new_v4();
        let authenticator = FixedUserAuthenticator::new(user_id);

        let with_cookie = authenticator
            .authenticated_user(Some("gatehouse_session=tok"))
            .await
            .unwrap();
        assert_eq!(with_cookie, Some(user_id));

        let without_cookie = authenticator.authenticated_user(None).await.unwrap();
        assert!(without_cookie.is_none());
    }
}
