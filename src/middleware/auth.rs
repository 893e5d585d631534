//! Bearer-token authentication for `/api/*`.
//!
//! Tokens are HS256 JWTs carrying `userId` and `exp`. The middleware runs
//! before any handler and inserts a [`Identity`] into request extensions;
//! handlers take it with `Extension<Identity>`.

use crate::errors::AppError;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind as JwtErrorKind,
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Duration};
use thiserror::Error;

/// Authenticated caller, attached to every request that passes the gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub owner_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no bearer token provided")]
    MissingToken,
    #[error("token is malformed")]
    MalformedToken,
    #[error("token expired")]
    Expired,
    #[error("token signature or claims invalid")]
    InvalidToken,
    #[error("token signing failed")]
    SigningFailed,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: String,
    exp: i64,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and verifies bearer tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct AuthGate {
    keys: Arc<Keys>,
    validation: Validation,
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthGate { .. }")
    }
}

impl AuthGate {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            }),
            validation,
        }
    }

    /// Sign a token for `owner_id` valid for `ttl`.
    pub fn issue(&self, owner_id: &str, ttl: Duration) -> Result<String, AuthError> {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        self.issue_with_expiry(owner_id, Utc::now().timestamp().saturating_add(ttl))
    }

    fn issue_with_expiry(&self, owner_id: &str, exp: i64) -> Result<String, AuthError> {
        let claims = Claims {
            user_id: owner_id.to_string(),
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
            .map_err(|_| AuthError::SigningFailed)
    }

    /// Check signature and expiry, returning the caller's identity.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.keys.decoding, &self.validation).map_err(|err| {
            match err.kind() {
                JwtErrorKind::ExpiredSignature => AuthError::Expired,
                JwtErrorKind::InvalidToken
                | JwtErrorKind::Base64(_)
                | JwtErrorKind::Json(_)
                | JwtErrorKind::Utf8(_) => AuthError::MalformedToken,
                _ => AuthError::InvalidToken,
            }
        })?;

        if data.claims.user_id.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(Identity {
            owner_id: data.claims.user_id,
        })
    }

    /// Pull the token out of `Authorization: Bearer <token>`.
    fn bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::MalformedToken)?
            .trim();
        let token = match value.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
            None if value.eq_ignore_ascii_case("bearer") => "",
            _ => value,
        };
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        Ok(token)
    }
}

/// Middleware: reject unauthenticated requests, attach [`Identity`] otherwise.
pub async fn require_identity(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = AuthGate::bearer(request.headers()).and_then(|token| gate.verify(token))?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
