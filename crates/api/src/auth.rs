//! Session tokens and the admin-only extractor.
//!
//! Tokens are HS256 JWTs carrying the user id and role. Only dispute
//! resolution and dealer authorization require one; every other endpoint
//! is open.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use annsuraksha_core::Role;
use annsuraksha_ledger::storage::UserRecord;

use crate::error::{forbidden, unauthorized, ApiError};

/// Payload stored in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    /// User email.
    pub email: String,
    /// Role name as stored (`beneficiary`, `dealer`, `admin`).
    pub role: String,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiry (Unix seconds).
    pub exp: i64,
}

impl Claims {
    /// Whether the token holder is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role.parse::<Role>().ok() == Some(Role::Admin)
    }
}

/// Signing and verification keys plus the token lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    /// Keys for an HS256 secret.
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Issue a token for a logged-in user.
    pub fn issue(&self, user: &UserRecord) -> jsonwebtoken::errors::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Verify signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, &'static str> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => "Token expired",
                ErrorKind::InvalidSignature => "Invalid signature",
                _ => "Invalid token",
            })
    }
}

/// Claims of a verified bearer token whose role is admin.
///
/// Rejects with 401 when the header is missing or the token does not
/// verify, and with 403 for any other role.
#[derive(Debug, Clone)]
pub struct AdminClaims(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AdminClaims
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| unauthorized("Missing bearer token"))?;

        let claims = JwtKeys::from_ref(state)
            .verify(token)
            .map_err(unauthorized)?;
        if !claims.is_admin() {
            return Err(forbidden("Admin role required"));
        }

        Ok(AdminClaims(claims))
    }
}
