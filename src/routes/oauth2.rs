// ABOUTME: OAuth 2.0 HTTP route handlers for the axum web framework
// ABOUTME: Parses wire requests, invokes the endpoint cores, and maps tagged outcomes to HTTP exactly once
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::ServerContext;
use crate::errors::AppResult;
use crate::oauth2::models::{
    AuthorizeOutcome, AuthorizeRequest, OAuth2Error, RevokeRequest, RevokeResponse, TokenOutcome,
    TokenRequest,
};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

/// OAuth 2.0 route filters
pub struct OAuth2Routes;

impl OAuth2Routes {
    /// Create all OAuth 2.0 routes
    #[must_use]
    pub fn routes(context: Arc<ServerContext>) -> Router {
        let discovery = discovery_document(&context.config.issuer_url);

        Router::new()
            .route("/oauth/authorize", get(handle_authorize))
            .route("/oauth/token", post(handle_token))
            .route("/oauth/revoke", post(handle_revoke))
            .route("/oauth/introspect", post(handle_introspect))
            .route(
                "/.well-known/oauth-authorization-server",
                get(move || {
                    let document = discovery.clone();
                    async move { Json(document) }
                }),
            )
            .with_state(context)
    }
}

/// Authorization-server metadata (RFC 8414)
fn discovery_document(issuer_url: &str) -> serde_json::Value {
    serde_json::json!({
        "issuer": issuer_url,
        "authorization_endpoint": format!("{issuer_url}/oauth/authorize"),
        "token_endpoint": format!("{issuer_url}/oauth/token"),
        "revocation_endpoint": format!("{issuer_url}/oauth/revoke"),
        "introspection_endpoint": format!("{issuer_url}/oauth/introspect"),
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "response_types_supported": ["code"],
        "token_endpoint_auth_methods_supported": ["client_secret_post"],
        "response_modes_supported": ["query"],
        "code_challenge_methods_supported": ["S256"]
    })
}

/// Handle authorization request (GET /oauth/authorize)
async fn handle_authorize(
    State(context): State<Arc<ServerContext>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let request = match parse_authorize_request(&params) {
        Ok(request) => request,
        Err(error) => return Ok(oauth_error_response(StatusCode::BAD_REQUEST, &error)),
    };

    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok());

    let user_id = context
        .authenticator
        .authenticated_user(cookie_header)
        .await?;

    match context.auth_server.authorize(request.clone(), user_id).await? {
        AuthorizeOutcome::Granted {
            redirect_uri,
            code,
            state,
        } => {
            // OAuth 2.0 requires delivering code and state as query
            // parameters on the validated redirect URI.
            let location = format!(
                "{redirect_uri}?code={}&state={}",
                urlencoding::encode(&code),
                urlencoding::encode(&state)
            );
            Ok(redirect_response(&location))
        }
        AuthorizeOutcome::LoginRequired => {
            tracing::info!("No authenticated session for authorization request, redirecting to login");
            let login_url = build_login_url(&context.config.login_url, &request);
            Ok(redirect_response(&login_url))
        }
        AuthorizeOutcome::Denied(error) => {
            Ok(oauth_error_response(StatusCode::BAD_REQUEST, &error))
        }
    }
}

/// Handle token request (POST /oauth/token)
async fn handle_token(
    State(context): State<Arc<ServerContext>>,
    Form(form): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    tracing::debug!(
        "Token request received with grant_type: {:?}, client_id: {:?}",
        form.get("grant_type"),
        form.get("client_id")
    );

    let request = match parse_token_request(&form) {
        Ok(request) => request,
        Err(error) => {
            tracing::warn!("Token request parsing failed: {:?}", error.error);
            return Ok(oauth_error_response(StatusCode::BAD_REQUEST, &error));
        }
    };

    match context.auth_server.token(request).await? {
        TokenOutcome::Issued(response) => Ok((StatusCode::OK, Json(response)).into_response()),
        TokenOutcome::Denied(error) => {
            tracing::warn!(
                "Token exchange denied for client {}: {}",
                form.get("client_id").map_or("unknown", |v| v),
                error.error
            );
            let status = if error.error == "invalid_client" {
                StatusCode::UNAUTHORIZED
            } else {
                StatusCode::BAD_REQUEST
            };
            Ok(oauth_error_response(status, &error))
        }
    }
}

/// Handle revocation request (POST /oauth/revoke)
///
/// Success regardless of whether the token existed; only a structurally
/// malformed request (no `token` parameter) is an error.
async fn handle_revoke(
    State(context): State<Arc<ServerContext>>,
    Form(form): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let Some(token) = form.get("token").filter(|t| !t.is_empty()) else {
        let error = OAuth2Error::invalid_request("Missing token parameter");
        return Ok(oauth_error_response(StatusCode::BAD_REQUEST, &error));
    };

    let request = RevokeRequest {
        token: token.clone(),
        token_type_hint: form.get("token_type_hint").cloned(),
    };

    context.auth_server.revoke(&request).await?;

    Ok((StatusCode::OK, Json(RevokeResponse::acknowledged())).into_response())
}

/// Handle introspection request (POST /oauth/introspect)
///
/// Always 200 with an `active` body; a missing token is simply not usable.
async fn handle_introspect(
    State(context): State<Arc<ServerContext>>,
    Form(form): Form<HashMap<String, String>>,
) -> AppResult<Response> {
    let response = context
        .auth_server
        .introspect(
            form.get("token").map(String::as_str),
            form.get("token_type_hint").map(String::as_str),
        )
        .await?;

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// 302 redirect with the given Location
fn redirect_response(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}

/// Protocol error with the OAuth error body
fn oauth_error_response(status: StatusCode, error: &OAuth2Error) -> Response {
    (status, Json(serde_json::json!(
        {
            "error": error.error,
            "error_description": error.error_description,
        }
    )))
    .into_response()
}

/// Build the login redirect preserving the OAuth parameters so the flow can
/// resume after authentication
fn build_login_url(login_url: &str, request: &AuthorizeRequest) -> String {
    let mut url = format!(
        "{login_url}?client_id={}&redirect_uri={}&response_type={}&state={}",
        urlencoding::encode(&request.client_id),
        urlencoding::encode(&request.redirect_uri),
        urlencoding::encode(&request.response_type),
        urlencoding::encode(request.state.as_deref().unwrap_or(""))
    );

    if let Some(ref scope) = request.scope {
        write!(&mut url, "&scope={}", urlencoding::encode(scope)).ok();
    }

    if let Some(ref code_challenge) = request.code_challenge {
        write!(
            &mut url,
            "&code_challenge={}",
            urlencoding::encode(code_challenge)
        )
        .ok();
    }

    if let Some(ref code_challenge_method) = request.code_challenge_method {
        write!(&mut url, "&code_challenge_method={code_challenge_method}").ok();
    }

    url
}

/// Parse query parameters into an `AuthorizeRequest`
fn parse_authorize_request(
    params: &HashMap<String, String>,
) -> Result<AuthorizeRequest, OAuth2Error> {
    let response_type = params
        .get("response_type")
        .ok_or_else(|| OAuth2Error::invalid_request("Missing response_type parameter"))?
        .clone();

    let client_id = params
        .get("client_id")
        .ok_or_else(|| OAuth2Error::invalid_request("Missing client_id parameter"))?
        .clone();

    let redirect_uri = params
        .get("redirect_uri")
        .ok_or_else(|| OAuth2Error::invalid_request("Missing redirect_uri parameter"))?
        .clone();

    Ok(AuthorizeRequest {
        response_type,
        client_id,
        redirect_uri,
        state: params.get("state").cloned(),
        scope: params.get("scope").cloned(),
        code_challenge: params.get("code_challenge").cloned(),
        code_challenge_method: params.get("code_challenge_method").cloned(),
    })
}

/// Parse form data into a `TokenRequest`
fn parse_token_request(form: &HashMap<String, String>) -> Result<TokenRequest, OAuth2Error> {
    let grant_type = form
        .get("grant_type")
        .ok_or_else(|| OAuth2Error::invalid_request("Missing grant_type parameter"))?
        .clone();

    let client_id = form
        .get("client_id")
        .ok_or_else(|| OAuth2Error::invalid_request("Missing client_id parameter"))?
        .clone();

    // Base64 secrets carry '+', which permissive form decoding turns into a
    // space; undo that before verification.
    let client_secret = form.get("client_secret").map(|s| s.replace(' ', "+"));

    Ok(TokenRequest {
        grant_type,
        client_id,
        client_secret,
        code: form.get("code").cloned(),
        redirect_uri: form.get("redirect_uri").cloned(),
        code_verifier: form.get("code_verifier").cloned(),
        refresh_token: form.get("refresh_token").cloned(),
        scope: form.get("scope").cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_authorize_request_requires_core_fields() {
        let mut params = HashMap::new();
        params.insert("response_type".to_owned(), "code".to_owned());
        params.insert("client_id".to_owned(), "c1".to_owned());

        let error = parse_authorize_request(&params).unwrap_err();
        assert_eq!(error.error, "invalid_request");

        params.insert(
            "redirect_uri".to_owned(),
            "https://app.example.com/cb".to_owned(),
        );
        let request = parse_authorize_request(&params).unwrap();
        assert_eq!(request.client_id, "c1");
        assert!(request.state.is_none());
    }

    #[test]
    fn test_parse_token_request_normalizes_secret() {
        let mut form = HashMap::new();
        form.insert("grant_type".to_owned(), "authorization_code".to_owned());
        form.insert("client_id".to_owned(), "c1".to_owned());
        form.insert("client_secret".to_owned(), "a b c".to_owned());

        let request = parse_token_request(&form).unwrap();
        assert_eq!(request.client_secret, Some("a+b+c".to_owned()));
    }

    #[test]
    fn test_login_url_preserves_oauth_params() {
        let request = AuthorizeRequest {
            response_type: "code".to_owned(),
            client_id: "c1".to_owned(),
            redirect_uri: "https://app.example.com/cb".to_owned(),
            state: Some("s1".to_owned()),
            scope: Some("files:read".to_owned()),
            code_challenge: Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_owned()),
            code_challenge_method: Some("S256".to_owned()),
        };

        let url = build_login_url("/login", &request);
        assert!(url.starts_with("/login?client_id=c1"));
        assert!(url.contains("state=s1"));
        assert!(url.contains("scope=files%3Aread"));
        assert!(url.contains("code_challenge_method=S256"));
    }
}
