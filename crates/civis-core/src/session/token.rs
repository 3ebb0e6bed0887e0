//! Offline decoding of the identity claims embedded in a bearer token.
//!
//! The API issues JWTs whose payload carries the same fields as
//! [`AdminIdentity`]. The signature is NOT verified here; the server does
//! that on every request. Decoding only recovers the identity when the
//! durable record is missing.

use crate::error::{CivisError, Result};
use crate::session::identity::AdminIdentity;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(flatten)]
    admin: AdminIdentity,
    /// Expiry, seconds since the Unix epoch.
    #[serde(default)]
    exp: Option<i64>,
}

/// Identity decoded from a token, with its expiry if the token has one.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub admin: AdminIdentity,
    pub expires_at: Option<DateTime<Utc>>,
}

impl DecodedToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }
}

/// Decode the payload segment of a JWT.
pub fn decode_token(token: &str) -> Result<DecodedToken> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(CivisError::InvalidToken {
                message: "expected three dot-separated segments".to_string(),
            })
        }
    };

    // Some issuers pad the payload; strip it before decoding.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| CivisError::InvalidToken {
            message: format!("payload is not base64url: {}", e),
        })?;

    let claims: Claims = serde_json::from_slice(&bytes).map_err(|e| CivisError::InvalidToken {
        message: format!("payload does not carry admin claims: {}", e),
    })?;

    let expires_at = match claims.exp {
        Some(secs) => Some(Utc.timestamp_opt(secs, 0).single().ok_or_else(|| {
            CivisError::InvalidToken {
                message: format!("exp claim out of range: {}", secs),
            }
        })?),
        None => None,
    };

    Ok(DecodedToken {
        admin: claims.admin,
        expires_at,
    })
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_valid_token() {
        let token = encode_test_token(&json!({
            "userId": "u1",
            "name": "Ana",
            "allowedCities": ["x", "y"],
            "isMayor": true,
            "exp": 4_102_444_800i64
        }));

        let decoded = decode_token(&token).unwrap();
        assert_eq!(decoded.admin.user_id, "u1");
        assert!(decoded.admin.is_mayor);
        assert_eq!(decoded.admin.allowed_cities, vec!["x", "y"]);
        assert!(!decoded.is_expired(Utc::now()));
    }

    #[test]
    fn test_expired_token_is_reported() {
        let token = encode_test_token(&json!({ "userId": "u1", "name": "Ana", "exp": 1 }));
        let decoded = decode_token(&token).unwrap();
        assert!(decoded.is_expired(Utc::now()));
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        assert!(decode_token("opaque-token").is_err());
        assert!(decode_token("a.%%%.c").is_err());
        let no_identity = encode_test_token(&json!({ "sub": "u1" }));
        assert!(matches!(
            decode_token(&no_identity),
            Err(CivisError::InvalidToken { .. })
        ));
    }
}
