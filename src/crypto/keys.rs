//! ECDSA key management for notary nodes
//!
//! Provides key pair generation, DER signing and verification using
//! the secp256k1 elliptic curve, plus conversions into the `bitcoin`
//! crate's public key and pubkey-hash types.

use bitcoin::PubkeyHash;
use rand::rngs::OsRng;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Invalid signature")]
    InvalidSignature,
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Compressed public key in the `bitcoin` crate's representation
    pub fn bitcoin_public_key(&self) -> bitcoin::PublicKey {
        bitcoin::PublicKey::new(self.public_key)
    }

    /// HASH160 of the compressed public key
    pub fn pubkey_hash(&self) -> PubkeyHash {
        self.bitcoin_public_key().pubkey_hash()
    }

    /// Sign a 32-byte digest, returning the DER encoded signature
    pub fn sign_digest(&self, digest: [u8; 32]) -> Vec<u8> {
        sign_digest_der(&self.secret_key, digest)
    }
}

/// Parse a compressed or uncompressed public key from hex
pub fn public_key_from_hex(hex_key: &str) -> Result<bitcoin::PublicKey, KeyError> {
    let bytes =
        hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey(hex_key.to_string()))?;
    bitcoin::PublicKey::from_slice(&bytes)
        .map_err(|_| KeyError::InvalidPublicKey(hex_key.to_string()))
}

/// Sign a digest with a secret key. The signature is low-S normalized.
pub fn sign_digest_der(secret_key: &SecretKey, digest: [u8; 32]) -> Vec<u8> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(digest);
    secp.sign_ecdsa(&message, secret_key)
        .serialize_der()
        .to_vec()
}

/// Verify a DER encoded signature over a digest
///
/// High-S signatures are normalized before verification so that
/// signatures produced by other implementations are not rejected
/// for malleability alone.
pub fn verify_digest_der(
    public_key: &PublicKey,
    digest: [u8; 32],
    signature_der: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(digest);
    let mut signature =
        Signature::from_der(signature_der).map_err(|_| KeyError::InvalidSignature)?;
    signature.normalize_s();

    Ok(secp.verify_ecdsa(&message, &signature, public_key).is_ok())
}
