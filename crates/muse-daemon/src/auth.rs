// SPDX-License-Identifier: MIT OR Apache-2.0
//! JWT Bearer authentication.
//!
//! Muse Hub routes are mixed: most require a valid token, but reads of a
//! public repo do not. Rather than reject at the middleware layer, the
//! middleware only *parses* whatever credential was offered — inserting
//! [`Claims`] as a request extension on success — and leaves the
//! "is this endpoint allowed without one" decision to each handler via
//! [`require_claims`].

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use muse_error::{ErrorCode, MuseError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Decoded JWT claims for an authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account handle (the JWT `sub` claim).
    pub sub: String,
    /// Expiry, seconds since the epoch (the JWT `exp` claim).
    pub exp: usize,
}

/// Key used to verify inbound bearer tokens.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
}

impl JwtVerifier {
    /// Builds a verifier from an HMAC secret.
    #[must_use]
    pub fn from_hs256_secret(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Validates and decodes a bearer token.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::AuthInvalidToken`] if the token is malformed, expired,
    /// or fails signature verification. The raw token is never included
    /// in the error.
    pub fn verify(&self, token: &str) -> Result<Claims, MuseError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| MuseError::new(ErrorCode::AuthInvalidToken, "invalid or expired token"))
    }
}

/// Axum middleware: if an `Authorization: Bearer <token>` header is
/// present, validates it and inserts [`Claims`] into the request
/// extensions. Rejects the request outright if a header is present but
/// invalid; a request with no header at all passes through with no
/// `Claims` extension, leaving the decision to the handler.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(header) = req.headers().get(AUTHORIZATION) {
        let raw = header
            .to_str()
            .map_err(|_| MuseError::new(ErrorCode::AuthInvalidToken, "non-UTF-8 Authorization header"))?;
        let token = raw.strip_prefix("Bearer ").ok_or_else(|| {
            MuseError::new(ErrorCode::AuthInvalidToken, "Authorization header is not a Bearer token")
        })?;
        let claims = state.jwt.verify(token)?;
        req.extensions_mut().insert(claims);
    }
    Ok(next.run(req).await)
}

/// Requires the [`Claims`] a prior [`auth_middleware`] pass attached to the
/// request, failing with [`ErrorCode::AuthMissingToken`] if none is
/// present. Handlers extract `Option<Extension<Claims>>` and pass its
/// inner value here — the gate every route that requires authentication
/// calls first; routes that allow anonymous public-repo reads skip it.
pub fn require_claims(claims: Option<&Claims>) -> Result<&Claims, MuseError> {
    claims.ok_or_else(|| MuseError::new(ErrorCode::AuthMissingToken, "missing Authorization header"))
}
