// ABOUTME: Token endpoint tests for the authorization code grant and its security invariants
// ABOUTME: Covers single redemption, redirect binding, client binding, and replay-triggered family revocation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{
    authorize_request, code_exchange_request, obtain_code, register_confidential_client,
    setup_server,
};
use gatehouse_auth_server::oauth2::models::{TokenOutcome, TokenResponse};
use uuid::Uuid;

const CALLBACK: &str = "https://app.gatehouse.example/cb";
const OTHER_CALLBACK: &str = "https://app.gatehouse.example/other";

fn expect_issued(outcome: TokenOutcome) -> TokenResponse {
    match outcome {
        TokenOutcome::Issued(response) => response,
        TokenOutcome::Denied(error) => panic!("Expected issued tokens, got {}", error.error),
    }
}

fn expect_denied(outcome: TokenOutcome) -> String {
    match outcome {
        TokenOutcome::Denied(error) => error.error,
        TokenOutcome::Issued(_) => panic!("Expected denial, got issued tokens"),
    }
}

#[tokio::test]
async fn test_code_exchange_issues_token_pair() {
    let (_db, server) = setup_server().await;
    let (client_id, secret) = register_confidential_client(&server, &[CALLBACK]).await;
    let user_id = Uuid::new_v4();

    let code = obtain_code(&server, authorize_request(&client_id, CALLBACK, "s1"), user_id).await;

    let outcome = server
        .token(code_exchange_request(&client_id, Some(&secret), &code, CALLBACK))
        .await
        .unwrap();

    let response = expect_issued(outcome);
    assert_eq!(response.token_type, "Bearer");
    assert!(response.expires_in > 3500 && response.expires_in <= 3600);
    assert!(!response.access_token.is_empty());
    assert!(!response.refresh_token.is_empty());
    assert_eq!(response.scope, Some("files:read catalog:read".to_owned()));
}

#[tokio::test]
async fn test_second_exchange_is_invalid_grant() {
    let (_db, server) = setup_server().await;
    let (client_id, secret) = register_confidential_client(&server, &[CALLBACK]).await;

    let code = obtain_code(
        &server,
        authorize_request(&client_id, CALLBACK, "s1"),
        Uuid::new_v4(),
    )
    .await;

    let first = server
        .token(code_exchange_request(&client_id, Some(&secret), &code, CALLBACK))
        .await
        .unwrap();
    expect_issued(first);

    let second = server
        .token(code_exchange_request(&client_id, Some(&secret), &code, CALLBACK))
        .await
        .unwrap();
    assert_eq!(expect_denied(second), "invalid_grant");
}

#[tokio::test]
async fn test_code_replay_revokes_issued_tokens() {
    let (_db, server) = setup_server().await;
    let (client_id, secret) = register_confidential_client(&server, &[CALLBACK]).await;

    let code = obtain_code(
        &server,
        authorize_request(&client_id, CALLBACK, "s1"),
        Uuid::new_v4(),
    )
    .await;

    let issued = expect_issued(
        server
            .token(code_exchange_request(&client_id, Some(&secret), &code, CALLBACK))
            .await
            .unwrap(),
    );

    // The tokens work before the replay...
    let before = server
        .introspect(Some(&issued.access_token), None)
        .await
        .unwrap();
    assert!(before.active);

    // ...the replay fails...
    let replay = server
        .token(code_exchange_request(&client_id, Some(&secret), &code, CALLBACK))
        .await
        .unwrap();
    assert_eq!(expect_denied(replay), "invalid_grant");

    // ...and takes the whole family with it.
    let access_after = server
        .introspect(Some(&issued.access_token), None)
        .await
        .unwrap();
    assert!(!access_after.active);

    let refresh_after = server
        .introspect(Some(&issued.refresh_token), Some("refresh_token"))
        .await
        .unwrap();
    assert!(!refresh_after.active);
}

#[tokio::test]
async fn test_redirect_uri_binding_rejects_other_registered_uri() {
    let (_db, server) = setup_server().await;
    let (client_id, secret) =
        register_confidential_client(&server, &[CALLBACK, OTHER_CALLBACK]).await;

    let code = obtain_code(
        &server,
        authorize_request(&client_id, CALLBACK, "s1"),
        Uuid::new_v4(),
    )
    .await;

    // OTHER_CALLBACK is registered for the client, but the code was bound to
    // CALLBACK; the exchange must still fail.
    let outcome = server
        .token(code_exchange_request(
            &client_id,
            Some(&secret),
            &code,
            OTHER_CALLBACK,
        ))
        .await
        .unwrap();
    assert_eq!(expect_denied(outcome), "invalid_grant");
}

#[tokio::test]
async fn test_code_is_bound_to_its_client() {
    let (_db, server) = setup_server().await;
    let (client_a, _secret_a) = register_confidential_client(&server, &[CALLBACK]).await;
    let (client_b, secret_b) = register_confidential_client(&server, &[CALLBACK]).await;

    let code = obtain_code(
        &server,
        authorize_request(&client_a, CALLBACK, "s1"),
        Uuid::new_v4(),
    )
    .await;

    let outcome = server
        .token(code_exchange_request(&client_b, Some(&secret_b), &code, CALLBACK))
        .await
        .unwrap();
    assert_eq!(expect_denied(outcome), "invalid_grant");
}

#[tokio::test]
async fn test_confidential_client_must_authenticate() {
    let (_db, server) = setup_server().await;
    let (client_id, _secret) = register_confidential_client(&server, &[CALLBACK]).await;

    let code = obtain_code(
        &server,
        authorize_request(&client_id, CALLBACK, "s1"),
        Uuid::new_v4(),
    )
    .await;

    let missing_secret = server
        .token(code_exchange_request(&client_id, None, &code, CALLBACK))
        .await
        .unwrap();
    assert_eq!(expect_denied(missing_secret), "invalid_client");

    let wrong_secret = server
        .token(code_exchange_request(
            &client_id,
            Some("not-the-secret"),
            &code,
            CALLBACK,
        ))
        .await
        .unwrap();
    assert_eq!(expect_denied(wrong_secret), "invalid_client");
}

#[tokio::test]
async fn test_unsupported_grant_type() {
    let (_db, server) = setup_server().await;
    let (client_id, secret) = register_confidential_client(&server, &[CALLBACK]).await;

    let mut request = code_exchange_request(&client_id, Some(&secret), "ignored", CALLBACK);
    request.grant_type = "client_credentials".to_owned();

    let outcome = server.token(request).await.unwrap();
    assert_eq!(expect_denied(outcome), "unsupported_grant_type");
}

#[tokio::test]
async fn test_missing_code_and_redirect_are_invalid_request() {
    let (_db, server) = setup_server().await;
    let (client_id, secret) = register_confidential_client(&server, &[CALLBACK]).await;

    let mut no_code = code_exchange_request(&client_id, Some(&secret), "x", CALLBACK);
    no_code.code = None;
    assert_eq!(
        expect_denied(server.token(no_code).await.unwrap()),
        "invalid_request"
    );

    let mut no_redirect = code_exchange_request(&client_id, Some(&secret), "x", CALLBACK);
    no_redirect.redirect_uri = None;
    assert_eq!(
        expect_denied(server.token(no_redirect).await.unwrap()),
        "invalid_request"
    );
}

#[tokio::test]
async fn test_unknown_code_is_invalid_grant() {
    let (_db, server) = setup_server().await;
    let (client_id, secret) = register_confidential_client(&server, &[CALLBACK]).await;

    let outcome = server
        .token(code_exchange_request(
            &client_id,
            Some(&secret),
            "never-issued",
            CALLBACK,
        ))
        .await
        .unwrap();
    assert_eq!(expect_denied(outcome), "invalid_grant");
}
