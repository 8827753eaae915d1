// ABOUTME: Credential store tests for atomic consumption, family revocation, and garbage collection
// ABOUTME: Exercises the conditional-update semantics directly against the SQLite stores
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::{Duration, Utc};
use common::create_test_database;
use gatehouse_auth_server::models::{AuthorizationCode, OAuthClient, RefreshToken};
use uuid::Uuid;

fn sample_code(code: &str, client_id: &str) -> AuthorizationCode {
    AuthorizationCode {
        code: code.to_owned(),
        client_id: client_id.to_owned(),
        user_id: Uuid::new_v4(),
        redirect_uri: "https://app.gatehouse.example/cb".to_owned(),
        scope: Some("files:read".to_owned()),
        code_challenge: None,
        code_challenge_method: None,
        expires_at: Utc::now() + Duration::minutes(10),
        consumed: false,
        family_id: None,
    }
}

fn sample_refresh(token: &str, client_id: &str, family_id: Uuid) -> RefreshToken {
    RefreshToken {
        token: token.to_owned(),
        client_id: client_id.to_owned(),
        user_id: Uuid::new_v4(),
        scope: None,
        issued_at: Utc::now(),
        expires_at: Utc::now() + Duration::days(30),
        revoked: false,
        rotated_from: None,
        family_id,
    }
}

#[tokio::test]
async fn test_file_backed_database_creates_schema() {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}/credentials.db", dir.path().display());

    let db = gatehouse_auth_server::database::Database::new(&url).await.unwrap();

    let code = sample_code("code-file", "client-a");
    db.store_auth_code(&code).await.unwrap();
    assert!(db.get_auth_code("code-file").await.unwrap().is_some());
}

#[tokio::test]
async fn test_client_roundtrip() {
    let db = create_test_database().await;

    let client = OAuthClient {
        client_id: "gh_client_roundtrip".to_owned(),
        client_secret_hash: Some("$argon2id$stub".to_owned()),
        redirect_uris: vec![
            "https://app.gatehouse.example/cb".to_owned(),
            "https://app.gatehouse.example/alt".to_owned(),
        ],
        allowed_grant_types: vec!["authorization_code".to_owned(), "refresh_token".to_owned()],
        is_confidential: true,
        client_name: Some("Roundtrip".to_owned()),
        created_at: Utc::now(),
    };
    db.store_client(&client).await.unwrap();

    let loaded = db.get_client("gh_client_roundtrip").await.unwrap().unwrap();
    assert_eq!(loaded.redirect_uris, client.redirect_uris);
    assert_eq!(loaded.allowed_grant_types, client.allowed_grant_types);
    assert!(loaded.is_confidential);

    assert!(db.get_client("gh_client_missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_code_consumption_checks_every_binding() {
    let db = create_test_database().await;
    let code = sample_code("code-1", "client-a");
    db.store_auth_code(&code).await.unwrap();
    let now = Utc::now();

    // Wrong client: no consumption.
    assert!(db
        .consume_auth_code("code-1", "client-b", &code.redirect_uri, Uuid::new_v4(), now)
        .await
        .unwrap()
        .is_none());

    // Wrong redirect: no consumption.
    assert!(db
        .consume_auth_code("code-1", "client-a", "https://other.example/cb", Uuid::new_v4(), now)
        .await
        .unwrap()
        .is_none());

    // The failed attempts left the code live.
    assert!(!db.get_auth_code("code-1").await.unwrap().unwrap().consumed);

    // Exact bindings consume it and stamp the family.
    let family = Uuid::new_v4();
    let consumed = db
        .consume_auth_code("code-1", "client-a", &code.redirect_uri, family, now)
        .await
        .unwrap()
        .unwrap();
    assert!(consumed.consumed);
    assert_eq!(consumed.family_id, Some(family));

    // Second consumption fails.
    assert!(db
        .consume_auth_code("code-1", "client-a", &code.redirect_uri, Uuid::new_v4(), now)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_expired_code_cannot_be_consumed() {
    let db = create_test_database().await;
    let mut code = sample_code("code-exp", "client-a");
    code.expires_at = Utc::now() - Duration::minutes(1);
    db.store_auth_code(&code).await.unwrap();

    assert!(db
        .consume_auth_code(
            "code-exp",
            "client-a",
            &code.redirect_uri,
            Uuid::new_v4(),
            Utc::now()
        )
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_purge_removes_only_expired_codes() {
    let db = create_test_database().await;

    let live = sample_code("code-live", "client-a");
    let mut dead = sample_code("code-dead", "client-a");
    dead.expires_at = Utc::now() - Duration::minutes(1);
    db.store_auth_code(&live).await.unwrap();
    db.store_auth_code(&dead).await.unwrap();

    let purged = db.purge_expired_auth_codes(Utc::now()).await.unwrap();
    assert_eq!(purged, 1);

    assert!(db.get_auth_code("code-live").await.unwrap().is_some());
    assert!(db.get_auth_code("code-dead").await.unwrap().is_none());
}

#[tokio::test]
async fn test_refresh_consumption_is_single_use() {
    let db = create_test_database().await;
    let token = sample_refresh("rt-1", "client-a", Uuid::new_v4());
    db.store_refresh_token(&token).await.unwrap();
    let now = Utc::now();

    let consumed = db
        .consume_refresh_token("rt-1", "client-a", now)
        .await
        .unwrap()
        .unwrap();
    assert!(consumed.revoked);

    assert!(db
        .consume_refresh_token("rt-1", "client-a", now)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_family_revocation_spans_both_stores() {
    let db = create_test_database().await;
    let family = Uuid::new_v4();
    let other_family = Uuid::new_v4();

    db.store_refresh_token(&sample_refresh("rt-a", "client-a", family))
        .await
        .unwrap();
    db.store_refresh_token(&sample_refresh("rt-b", "client-a", family))
        .await
        .unwrap();
    db.store_refresh_token(&sample_refresh("rt-other", "client-a", other_family))
        .await
        .unwrap();

    let mut access = gatehouse_auth_server::models::AccessToken {
        token: "at-a".to_owned(),
        client_id: "client-a".to_owned(),
        user_id: Uuid::new_v4(),
        scope: None,
        issued_at: Utc::now(),
        expires_at: Utc::now() + Duration::hours(1),
        revoked: false,
        refresh_token: Some("rt-a".to_owned()),
        family_id: family,
    };
    db.store_access_token(&access).await.unwrap();
    access.token = "at-other".to_owned();
    access.family_id = other_family;
    db.store_access_token(&access).await.unwrap();

    let revoked = db.revoke_family(family).await.unwrap();
    assert_eq!(revoked, 3);

    assert!(db.get_refresh_token("rt-a").await.unwrap().unwrap().revoked);
    assert!(db.get_refresh_token("rt-b").await.unwrap().unwrap().revoked);
    assert!(db.get_access_token("at-a").await.unwrap().unwrap().revoked);

    // Other families are untouched.
    assert!(!db.get_refresh_token("rt-other").await.unwrap().unwrap().revoked);
    assert!(!db.get_access_token("at-other").await.unwrap().unwrap().revoked);

    // Re-revoking an already-dead family touches nothing.
    assert_eq!(db.revoke_family(family).await.unwrap(), 0);
}
