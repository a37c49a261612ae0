//! Bearer token wrapper and structural decoding.
//!
//! # Trust boundary
//!
//! Decoding here is **structural only**: the signature segment is never
//! verified on the client. The issuing server verifies every token it
//! receives, and TLS protects the token in transit. Claims obtained from
//! [`Token::decode`] are therefore hints for UI gating, not proof of identity.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Claims;

/// Opaque signed credential string issued by the server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedTokenError {
    #[error("expected 3 dot-separated segments, got {0}")]
    SegmentCount(usize),

    #[error("{segment} segment is not valid base64url: {reason}")]
    Encoding { segment: &'static str, reason: String },

    #[error("{segment} segment is not valid JSON: {reason}")]
    Json { segment: &'static str, reason: String },
}

impl Token {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the payload into [`Claims`] without verifying the signature.
    pub fn decode(&self) -> Result<Claims, MalformedTokenError> {
        let segments: Vec<&str> = self.0.split('.').collect();
        if segments.len() != 3 {
            return Err(MalformedTokenError::SegmentCount(segments.len()));
        }

        let header = decode_segment("header", segments[0])?;
        serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(&header).map_err(
            |e| MalformedTokenError::Json {
                segment: "header",
                reason: e.to_string(),
            },
        )?;

        let payload = decode_segment("payload", segments[1])?;
        serde_json::from_slice(&payload).map_err(|e| MalformedTokenError::Json {
            segment: "payload",
            reason: e.to_string(),
        })
    }
}

impl core::fmt::Debug for Token {
    // Never print the credential itself.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Token(<{} bytes>)", self.0.len())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

fn decode_segment(segment: &'static str, raw: &str) -> Result<Vec<u8>, MalformedTokenError> {
    URL_SAFE_NO_PAD
        .decode(raw.trim_end_matches('='))
        .map_err(|e| MalformedTokenError::Encoding {
            segment,
            reason: e.to_string(),
        })
}
