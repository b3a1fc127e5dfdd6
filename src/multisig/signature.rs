//! Per-input signature records and their wire encoding
//!
//! A notary publishes its signatures for one transaction as a single
//! versioned JSON record:
//!
//! ```json
//! {"version":1,"signatures":[{"index":0,"signatureHex":"3044..."}]}
//! ```
//!
//! `signatureHex` is the DER encoding without the trailing sighash byte.
//! A bare signature array is read as version 1. Records of any other
//! version are reported as unsupported rather than malformed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version written by [`encode_signatures`]
pub const SIGNATURE_PAYLOAD_VERSION: u32 = 1;

/// Errors decoding a published signature list
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Malformed signature payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Signature for input {0} is not hex")]
    NotHex(u32),
    #[error("Unsupported signature payload version {0}")]
    UnsupportedVersion(u32),
}

/// Signature of one transaction input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputSignature {
    /// Input index within the transaction
    pub index: u32,
    /// Hex-encoded DER signature
    #[serde(rename = "signatureHex")]
    pub signature_hex: String,
}

impl InputSignature {
    pub fn new(index: u32, signature_der: &[u8]) -> Self {
        Self {
            index,
            signature_hex: hex::encode(signature_der),
        }
    }

    /// DER bytes of the signature
    pub fn signature_der(&self) -> Result<Vec<u8>, PayloadError> {
        hex::decode(&self.signature_hex).map_err(|_| PayloadError::NotHex(self.index))
    }
}

#[derive(Serialize)]
struct SignaturePayloadRef<'a> {
    version: u32,
    signatures: &'a [InputSignature],
}

/// Stored record; the signature list is parsed once its version is known
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredPayload {
    Versioned {
        version: u32,
        signatures: serde_json::Value,
    },
    Bare(Vec<InputSignature>),
}

/// Encode a signature list for publication
pub fn encode_signatures(signatures: &[InputSignature]) -> Result<String, PayloadError> {
    Ok(serde_json::to_string(&SignaturePayloadRef {
        version: SIGNATURE_PAYLOAD_VERSION,
        signatures,
    })?)
}

/// Decode a published signature list. Entries must be well-formed JSON
/// with exactly the two known fields and a hex signature.
pub fn decode_signatures(payload: &str) -> Result<Vec<InputSignature>, PayloadError> {
    let signatures: Vec<InputSignature> = match serde_json::from_str(payload)? {
        StoredPayload::Versioned {
            version: SIGNATURE_PAYLOAD_VERSION,
            signatures,
        } => serde_json::from_value(signatures)?,
        StoredPayload::Versioned { version, .. } => {
            return Err(PayloadError::UnsupportedVersion(version))
        }
        StoredPayload::Bare(signatures) => signatures,
    };
    for signature in &signatures {
        signature.signature_der()?;
    }
    Ok(signatures)
}
