// Token expiry decoding and the clock seam

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{AuthError, Result};

/// Source of the current instant, injectable for deterministic tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<f64>,
}

/// Decode the `exp` claim of a three-segment bearer token.
///
/// The signature is not verified. Errors describe the shape problem
/// and never echo token content.
pub fn decode_expiry(token: &str) -> Result<DateTime<Utc>> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::MalformedToken(
            "expected three dot-separated segments".to_string(),
        ));
    };

    // Some issuers keep base64 padding on the payload
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| AuthError::MalformedToken("payload is not base64url".to_string()))?;

    let claims: Claims = serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::MalformedToken("payload is not a JSON object".to_string()))?;

    let exp = claims
        .exp
        .ok_or_else(|| AuthError::MalformedToken("missing exp claim".to_string()))?;

    if !exp.is_finite() {
        return Err(AuthError::MalformedToken("exp claim out of range".to_string()));
    }

    DateTime::from_timestamp(exp.trunc() as i64, 0)
        .ok_or_else(|| AuthError::MalformedToken("exp claim out of range".to_string()))
}

/// Absolute expiry of `token`, or `None` when it cannot be determined.
/// Never panics on malformed input.
pub fn parse_expiry(token: &str) -> Option<DateTime<Utc>> {
    decode_expiry(token).ok()
}
