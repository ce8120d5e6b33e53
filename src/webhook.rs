//! Signature checks for inbound webhooks.
//!
//! Both providers sign with HMAC-SHA256 and a timestamp; they differ in
//! header layout and encoding:
//! - payments: `Stripe-Signature: t=<unix>,v1=<hex>` over `"{t}.{body}"`
//! - identity: `svix-id`, `svix-timestamp`, `svix-signature: v1,<base64> ...`
//!   over `"{id}.{timestamp}.{body}"`, keyed by the base64 part of `whsec_...`

use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

/// Accepted clock skew between the signer and us.
pub const TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq)]
pub enum SignatureError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("malformed signature header")]
    Malformed,
    #[error("invalid webhook secret")]
    BadSecret,
    #[error("timestamp outside tolerance")]
    Expired,
    #[error("no signature matches the payload")]
    Mismatch,
}

/// Authenticates a raw webhook body before anything parses it.
pub trait WebhookVerifier: Send + Sync {
    fn verify_at(&self, headers: &HeaderMap, payload: &[u8], now: i64) -> Result<(), SignatureError>;

    fn verify(&self, headers: &HeaderMap, payload: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(headers, payload, chrono::Utc::now().timestamp())
    }
}

type HmacSha256 = Hmac<Sha256>;

pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SignatureError::BadSecret)?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .ok_or(SignatureError::MissingHeader(name))?
        .to_str()
        .map_err(|_| SignatureError::Malformed)
}

fn check_timestamp(timestamp: i64, now: i64) -> Result<(), SignatureError> {
    if (now - timestamp).abs() > TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }
    Ok(())
}

/// Payment gateway (`Stripe-Signature`) scheme.
pub struct StripeVerifier {
    secret: String,
}

impl StripeVerifier {
    pub const HEADER: &'static str = "stripe-signature";

    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Header value for `payload` signed at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        let ts = timestamp.to_string();
        let mac = hmac_sha256(self.secret.as_bytes(), &[ts.as_bytes(), b".", payload])?;
        Ok(format!("t={ts},v1={}", hex::encode(mac)))
    }
}

impl WebhookVerifier for StripeVerifier {
    fn verify_at(&self, headers: &HeaderMap, payload: &[u8], now: i64) -> Result<(), SignatureError> {
        let raw = header(headers, Self::HEADER)?;
        let mut timestamp = None;
        let mut candidates = vec![];
        for item in raw.split(',') {
            match item.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
        if candidates.is_empty() {
            return Err(SignatureError::Malformed);
        }

        let ts = timestamp.to_string();
        let expected = hex::encode(hmac_sha256(self.secret.as_bytes(), &[ts.as_bytes(), b".", payload])?);
        if !candidates
            .iter()
            .any(|c| constant_time_eq(c.as_bytes(), expected.as_bytes()))
        {
            return Err(SignatureError::Mismatch);
        }
        check_timestamp(timestamp, now)
    }
}

/// Identity provider (Svix) scheme.
pub struct SvixVerifier {
    key: Vec<u8>,
}

impl SvixVerifier {
    pub fn new(secret: &str) -> Result<Self, SignatureError> {
        let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
        let key = BASE64.decode(encoded).map_err(|_| SignatureError::BadSecret)?;
        Ok(Self { key })
    }

    /// `svix-signature` value for a message.
    pub fn sign(&self, msg_id: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
        let ts = timestamp.to_string();
        let mac = hmac_sha256(&self.key, &[msg_id.as_bytes(), b".", ts.as_bytes(), b".", payload])?;
        Ok(format!("v1,{}", BASE64.encode(mac)))
    }
}

impl WebhookVerifier for SvixVerifier {
    fn verify_at(&self, headers: &HeaderMap, payload: &[u8], now: i64) -> Result<(), SignatureError> {
        let msg_id = header(headers, "svix-id")?;
        let timestamp: i64 = header(headers, "svix-timestamp")?
            .parse()
            .map_err(|_| SignatureError::Malformed)?;
        let signatures = header(headers, "svix-signature")?;
        check_timestamp(timestamp, now)?;

        let expected = self.sign(msg_id, timestamp, payload)?;
        let expected = expected.trim_start_matches("v1,");
        let matched = signatures
            .split_whitespace()
            .filter_map(|s| s.strip_prefix("v1,"))
            .any(|s| constant_time_eq(s.as_bytes(), expected.as_bytes()));
        if matched {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}
