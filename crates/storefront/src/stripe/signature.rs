//! Webhook signature verification.
//!
//! Stripe signs each delivery with HMAC-SHA256 over `"{timestamp}.{payload}"`
//! and sends the result in the `Stripe-Signature` header:
//!
//! ```text
//! Stripe-Signature: t=1700000000,v1=5257a869...,v1=...
//! ```
//!
//! <https://docs.stripe.com/webhooks#verify-manually>

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Maximum accepted age of a signed timestamp (5 minutes).
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Reasons a webhook signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,

    #[error("malformed signature header")]
    Malformed,

    #[error("no signature matches the payload")]
    NoMatchingSignature,

    #[error("signature timestamp outside tolerance")]
    TimestampOutsideTolerance,

    #[error("signing secret cannot key HMAC-SHA256")]
    InvalidSecret,
}

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &SecretString, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Compute the `v1` signature for a payload. Used to sign test deliveries.
///
/// # Errors
///
/// Returns [`SignatureError::InvalidSecret`] if the secret cannot key the MAC.
pub fn compute_signature(
    payload: &[u8],
    secret: &SecretString,
    timestamp: i64,
) -> Result<String, SignatureError> {
    let mac = mac_for(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// Any one `v1` entry matching is enough, which is what Stripe relies on
/// while a signing secret is being rolled.
///
/// # Errors
///
/// Returns [`SignatureError::Malformed`] if the header has no timestamp or no
/// `v1` entry, [`SignatureError::TimestampOutsideTolerance`] if the timestamp
/// is more than `tolerance_secs` away from `now`, and
/// [`SignatureError::NoMatchingSignature`] if no entry matches.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &SecretString,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    if header.trim().is_empty() {
        return Err(SignatureError::MissingHeader);
    }

    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            // Entries that are not valid hex can never match; skip them.
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }

    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::TimestampOutsideTolerance);
    }

    let mac = mac_for(secret, timestamp, payload)?;
    let matched = signatures
        .iter()
        .any(|candidate| mac.clone().verify_slice(candidate).is_ok());

    if matched {
        Ok(())
    } else {
        Err(SignatureError::NoMatchingSignature)
    }
}
