//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 hashing
//! - ECDSA key management (secp256k1) with DER signatures

pub mod hash;
pub mod keys;

pub use hash::{sha256, sha256_array, sha256_hex, truncate_hash};
pub use keys::{public_key_from_hex, sign_digest_der, verify_digest_der, KeyError, KeyPair};
