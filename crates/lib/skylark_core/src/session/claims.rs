//! Access-token payload decoding.
//!
//! The client never holds the signing secret, so tokens are not verified —
//! only the `exp` claim is read. Every expiry check in the workspace
//! funnels through this module; the request guard and the activity monitor
//! must never disagree about whether a token is expired.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeZone, Utc};

use crate::models::auth::TokenClaims;

/// Decode the claims segment of a JWT without verifying the signature.
///
/// Returns `None` for anything that does not look like a JWT.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Expiry timestamp carried in the token payload.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let claims = decode_claims(token)?;
    Utc.timestamp_opt(claims.exp, 0).single()
}

/// Whether the token is expired, or will expire within `grace_secs`.
///
/// An undecodable token counts as expired.
pub fn is_expired(token: &str, grace_secs: i64) -> bool {
    match token_expiry(token) {
        Some(expiry) => (expiry - Utc::now()).num_seconds() < grace_secs,
        None => true,
    }
}

/// Build an unsigned test token carrying the given claims JSON.
#[cfg(test)]
pub(crate) fn encode_unsigned(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{header}.{payload}.sig")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token_expiring_in(secs: i64) -> String {
        let exp = Utc::now().timestamp() + secs;
        encode_unsigned(&json!({
            "sub": "u1",
            "email": "a@b.c",
            "roles": ["guest"],
            "exp": exp,
            "iat": Utc::now().timestamp(),
        }))
    }

    #[test]
    fn decode_reads_claims_from_payload() {
        let token = token_expiring_in(3600);
        let claims = decode_claims(&token).expect("decode");
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.email, "a@b.c");
        assert_eq!(claims.roles, vec!["guest".to_string()]);
    }

    #[test]
    fn decode_tolerates_missing_optional_claims() {
        let token = encode_unsigned(&json!({ "exp": Utc::now().timestamp() + 60 }));
        let claims = decode_claims(&token).expect("decode");
        assert!(claims.sub.is_empty());
        assert!(claims.roles.is_empty());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_claims("not-a-jwt").is_none());
        assert!(decode_claims("a.%%%.c").is_none());
        assert!(decode_claims("").is_none());
    }

    #[test]
    fn expired_token_is_reported_expired() {
        let token = token_expiring_in(-10);
        assert!(is_expired(&token, 0));
    }

    #[test]
    fn fresh_token_is_not_expired() {
        let token = token_expiring_in(3600);
        assert!(!is_expired(&token, 0));
    }

    #[test]
    fn grace_period_counts_as_expired() {
        // expires in 30s, with a 60s grace it is already "expired"
        let token = token_expiring_in(30);
        assert!(is_expired(&token, 60));
        assert!(!is_expired(&token, 0));
    }

    #[test]
    fn undecodable_token_counts_as_expired() {
        assert!(is_expired("garbage", 0));
    }
}
