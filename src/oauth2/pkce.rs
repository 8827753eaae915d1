// ABOUTME: PKCE S256 code-challenge computation and verification (RFC 7636)
// ABOUTME: Stateless; the stored challenge is compared against the hashed verifier in constant time
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Why a code verifier was rejected before hashing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierFormatError {
    /// Verifier shorter than 43 or longer than 128 characters
    Length,
    /// Verifier contains characters outside the RFC 7636 unreserved set
    Charset,
}

/// Validate code-verifier format per RFC 7636 Section 4.1
///
/// Length 43-128, characters limited to `[A-Z] / [a-z] / [0-9] / "-" / "." /
/// "_" / "~"`.
///
/// # Errors
///
/// Returns the first format rule the verifier violates
pub fn validate_verifier_format(verifier: &str) -> Result<(), VerifierFormatError> {
    if verifier.len() < 43 || verifier.len() > 128 {
        return Err(VerifierFormatError::Length);
    }

    if !verifier
        .chars()
        .all(|c| matches!(c, 'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '.' | '_' | '~'))
    {
        return Err(VerifierFormatError::Charset);
    }

    Ok(())
}

/// Compute the S256 challenge for a verifier: base64url(SHA-256(verifier))
#[must_use]
pub fn compute_s256_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Verify a code verifier against a stored S256 challenge
///
/// Constant-time comparison to avoid leaking challenge bytes through timing.
#[must_use]
pub fn verify_s256(verifier: &str, stored_challenge: &str) -> bool {
    let computed = compute_s256_challenge(verifier);
    computed.as_bytes().ct_eq(stored_challenge.as_bytes()).into()
}
