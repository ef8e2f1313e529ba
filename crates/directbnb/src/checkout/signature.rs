//! `Stripe-Signature` header verification.
//!
//! The header looks like `t=1700000000,v1=<hex>,v1=<hex>`; each `v1` is an
//! HMAC-SHA256 of `"{t}.{raw body}"` keyed with the endpoint secret.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: Option<String>,
    tolerance_secs: i64,
}

impl SignatureVerifier {
    pub fn new(secret: Option<String>, tolerance_secs: u64) -> Self {
        Self {
            secret,
            tolerance_secs: i64::try_from(tolerance_secs).unwrap_or(i64::MAX),
        }
    }

    /// Returns the signed timestamp when any `v1` signature matches.
    pub fn verify(
        &self,
        header: Option<&str>,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<i64, SignatureError> {
        let secret = self.secret.as_deref().ok_or(SignatureError::NotConfigured)?;
        let header = header
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(SignatureError::MissingHeader)?;
        let parsed = ParsedHeader::parse(header)?;

        let matched = parsed.signatures.iter().any(|candidate| {
            let Ok(expected) = hex::decode(candidate) else {
                return false;
            };
            match mac_for(secret, parsed.timestamp, payload) {
                Some(mac) => mac.verify_slice(&expected).is_ok(),
                None => false,
            }
        });
        if !matched {
            return Err(SignatureError::Mismatch);
        }

        if (now.timestamp() - parsed.timestamp).abs() > self.tolerance_secs {
            return Err(SignatureError::Expired);
        }
        Ok(parsed.timestamp)
    }
}

struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

impl ParsedHeader {
    fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| SignatureError::Malformed)?,
                    )
                }
                "v1" => signatures.push(value.to_string()),
                _ => {}
            }
        }
        match timestamp {
            Some(timestamp) if !signatures.is_empty() => Ok(Self {
                timestamp,
                signatures,
            }),
            _ => Err(SignatureError::Malformed),
        }
    }
}

fn mac_for(secret: &str, timestamp: i64, payload: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(mac)
}

/// Hex HMAC of `"{timestamp}.{payload}"`.
pub fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    mac_for(secret, timestamp, payload)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Full header value for `payload`, as Stripe would send it.
pub fn header_value(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    format!("t={timestamp},v1={}", sign(secret, timestamp, payload))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("webhook secret is not configured")]
    NotConfigured,
    #[error("missing Stripe-Signature header")]
    MissingHeader,
    #[error("malformed Stripe-Signature header")]
    Malformed,
    #[error("no signature matches the payload")]
    Mismatch,
    #[error("signature timestamp outside the tolerance window")]
    Expired,
}
