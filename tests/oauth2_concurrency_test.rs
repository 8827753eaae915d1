// ABOUTME: Concurrency tests for single-use credential semantics under simultaneous requests
// ABOUTME: At most one concurrent redemption of a code or refresh token can ever succeed
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{
    authorize_request, code_exchange_request, obtain_code, refresh_request,
    register_confidential_client, setup_server,
};
use gatehouse_auth_server::oauth2::models::TokenOutcome;
use std::sync::Arc;
use tokio::task::JoinSet;
use uuid::Uuid;

const CALLBACK: &str = "https://app.gatehouse.example/cb";

#[tokio::test]
async fn test_concurrent_code_redemption_single_winner() {
    let (_db, server) = setup_server().await;
    let server = Arc::new(server);
    let (client_id, secret) = register_confidential_client(&server, &[CALLBACK]).await;

    let code = obtain_code(
        &server,
        authorize_request(&client_id, CALLBACK, "s1"),
        Uuid::new_v4(),
    )
    .await;

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let server = server.clone();
        let request = code_exchange_request(&client_id, Some(&secret), &code, CALLBACK);
        tasks.spawn(async move { server.token(request).await.unwrap() });
    }

    let mut issued = 0;
    let mut denied = 0;
    while let Some(outcome) = tasks.join_next().await {
        match outcome.unwrap() {
            TokenOutcome::Issued(_) => issued += 1,
            TokenOutcome::Denied(error) => {
                assert_eq!(error.error, "invalid_grant");
                denied += 1;
            }
        }
    }

    assert_eq!(issued, 1, "exactly one concurrent exchange may succeed");
    assert_eq!(denied, 7);
}

#[tokio::test]
async fn test_concurrent_refresh_rotation_at_most_one_winner() {
    let (_db, server) = setup_server().await;
    let server = Arc::new(server);
    let (client_id, secret) = register_confidential_client(&server, &[CALLBACK]).await;

    let code = obtain_code(
        &server,
        authorize_request(&client_id, CALLBACK, "s1"),
        Uuid::new_v4(),
    )
    .await;
    let TokenOutcome::Issued(tokens) = server
        .token(code_exchange_request(&client_id, Some(&secret), &code, CALLBACK))
        .await
        .unwrap()
    else {
        panic!("Expected issued tokens");
    };

    let mut tasks = JoinSet::new();
    for _ in 0..4 {
        let server = server.clone();
        let request = refresh_request(&client_id, Some(&secret), &tokens.refresh_token);
        tasks.spawn(async move { server.token(request).await.unwrap() });
    }

    let mut issued = 0;
    while let Some(outcome) = tasks.join_next().await {
        match outcome.unwrap() {
            TokenOutcome::Issued(_) => issued += 1,
            TokenOutcome::Denied(error) => assert_eq!(error.error, "invalid_grant"),
        }
    }

    // Losing the rotation race is a security event; it must never mint a
    // second live pair from one presented token.
    assert!(issued <= 1, "at most one concurrent rotation may succeed");

    // The presented token itself is dead either way.
    let presented = server
        .introspect(Some(&tokens.refresh_token), Some("refresh_token"))
        .await
        .unwrap();
    assert!(!presented.active);
}
