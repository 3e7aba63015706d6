//! Bearer Token Claims
//!
//! The API issues self-describing tokens (header/claims/signature segments).
//! The client never verifies signatures; it only decodes the claims segment
//! to read the expiry instant. Everything here fails closed: a token that
//! cannot be decoded is treated as expired.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;

/// Token decode errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token does not have three segments")]
    Malformed,
    #[error("Claims segment is not valid base64url")]
    Encoding,
    #[error("Claims segment is not valid JSON")]
    Claims,
}

/// Decoded token claims
///
/// Only the fields the client reads. Unknown claims are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Expiry instant, seconds since the Unix epoch
    pub exp: Option<i64>,
    /// Subject (user id), informational only
    #[serde(default)]
    pub sub: Option<String>,
}

/// Decode the claims segment of a token without verifying the signature
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let mut segments = token.split('.');
    let claims = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(claims), Some(_), None) => claims,
        _ => return Err(TokenError::Malformed),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(claims)
        .map_err(|_| TokenError::Encoding)?;

    serde_json::from_slice(&bytes).map_err(|_| TokenError::Claims)
}

/// Whether the token is expired as of now
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now().timestamp())
}

/// Whether the token is expired at the given Unix time
///
/// Fail-closed on every path: a token that cannot be decoded is expired,
/// and a token whose claims carry no `exp` at all is also expired rather
/// than immortal.
pub fn is_expired_at(token: &str, now: i64) -> bool {
    match decode_claims(token) {
        Ok(claims) => match claims.exp {
            Some(exp) => exp < now,
            None => true,
        },
        Err(e) => {
            tracing::debug!("Treating undecodable token as expired: {}", e);
            true
        }
    }
}
