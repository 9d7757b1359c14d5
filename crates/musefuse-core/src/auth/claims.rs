//! Reads the `exp` claim out of a JWT payload.
//!
//! Only the expiry timestamp is extracted. The signature is not checked: the
//! backend remains the authority on whether a token is accepted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};

use super::error::AuthError;

/// Decode the expiry embedded in `token`.
pub fn token_expiry(token: &str) -> Result<DateTime<Utc>, AuthError> {
    let mut parts = token.split('.');
    let _header = parts.next().ok_or(AuthError::MalformedToken)?;
    let payload = parts.next().ok_or(AuthError::MalformedToken)?;

    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| AuthError::MalformedToken)?;
    let value: serde_json::Value =
        serde_json::from_slice(&decoded).map_err(|_| AuthError::MalformedToken)?;

    let exp = value.get("exp").ok_or(AuthError::MalformedToken)?;
    let seconds = exp
        .as_i64()
        .or_else(|| exp.as_f64().map(|f| f as i64))
        .ok_or(AuthError::MalformedToken)?;

    DateTime::<Utc>::from_timestamp(seconds, 0).ok_or(AuthError::MalformedToken)
}

#[cfg(test)]
pub(crate) fn encode_test_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"user_id":1,"exp":{}}}"#, exp));
    format!("{}.{}.signature", header, payload)
}
