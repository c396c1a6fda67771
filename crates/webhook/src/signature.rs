//! HMAC-SHA256 payload signatures.
//!
//! Signatures are transmitted as `v1=<hex digest>`, both in the
//! `X-Brandlens-Signature` header and in the payload's `signature` field.
//! The digest covers the canonical JSON payload without the signature field.

use ring::hmac;
use secrecy::{ExposeSecret, SecretString};

/// Sign a payload body with the shared secret.
pub fn sign(secret: &SecretString, body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.expose_secret().as_bytes());
    let tag = hmac::sign(&key, body);

    format!("v1={}", hex::encode(tag.as_ref()))
}

/// Webhook signature validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureValidation {
    /// Signature is valid.
    Valid,
    /// Signature is invalid.
    Invalid,
    /// Signature header is missing.
    Missing,
}

/// Validates signatures on the receiving side.
pub struct SignatureValidator {
    secret: SecretString,
}

impl SignatureValidator {
    /// Create a new signature validator.
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Validate a webhook request signature against the raw body bytes.
    pub fn validate(&self, signature_header: Option<&str>, body: &[u8]) -> SignatureValidation {
        let Some(header) = signature_header else {
            return SignatureValidation::Missing;
        };

        // Tolerate the "t=...,v1=..." multi-part form some senders use.
        let Some(received) = header.split(',').find_map(|part| part.strip_prefix("v1=")) else {
            return SignatureValidation::Invalid;
        };

        let key = hmac::Key::new(hmac::HMAC_SHA256, self.secret.expose_secret().as_bytes());
        let tag = hmac::sign(&key, body);
        let expected = hex::encode(tag.as_ref());

        // Constant-time comparison to prevent timing attacks.
        if subtle::ConstantTimeEq::ct_eq(received.as_bytes(), expected.as_bytes()).into() {
            SignatureValidation::Valid
        } else {
            SignatureValidation::Invalid
        }
    }
}
