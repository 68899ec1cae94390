//! Account keys and addresses.
//!
//! Messages are hashed with Keccak-256 and the digest is signed with
//! Ed25519. An account address is the last 20 bytes of the Keccak-256 hash
//! of the public key, written as `0x`-prefixed hex.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::signer::SignerError;

/// Keccak-256 digest of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// 20-byte chain account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountAddress([u8; 20]);

impl AccountAddress {
    /// Address from raw bytes.
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parse `0x`-prefixed hex. The prefix is optional; the length is not.
    pub fn from_hex(s: &str) -> Result<Self, SignerError> {
        let trimmed = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        let raw = hex::decode(trimmed).map_err(|e| SignerError::InvalidAddress {
            address: s.to_string(),
            reason: e.to_string(),
        })?;
        let bytes: [u8; 20] = raw.try_into().map_err(|v: Vec<u8>| SignerError::InvalidAddress {
            address: s.to_string(),
            reason: format!("expected 20 bytes, got {}", v.len()),
        })?;
        Ok(Self(bytes))
    }

    fn of_key(key: &VerifyingKey) -> Self {
        let digest = keccak256(key.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Self(bytes)
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for AccountAddress {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Private key of one scope's account.
pub struct AccountKey {
    signing_key: SigningKey,
    address: AccountAddress,
}

impl AccountKey {
    /// Key from a 32-byte secret.
    pub fn from_secret(secret: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&secret);
        let address = AccountAddress::of_key(&signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// Key from a hex-encoded 32-byte secret (optional `0x` prefix).
    pub fn from_hex(secret: &str) -> Result<Self, SignerError> {
        let trimmed = secret.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let raw = hex::decode(trimmed).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let bytes: [u8; 32] = raw.try_into().map_err(|v: Vec<u8>| {
            SignerError::InvalidKey(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self::from_secret(bytes))
    }

    /// Account address.
    pub const fn address(&self) -> AccountAddress {
        self.address
    }

    /// Sign the Keccak-256 digest of `msg`.
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.signing_key.sign(&keccak256(msg)).to_bytes().to_vec()
    }

    /// Check `sig` against the Keccak-256 digest of `msg`.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        Signature::from_slice(sig)
            .map(|sig| {
                self.signing_key
                    .verifying_key()
                    .verify(&keccak256(msg), &sig)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKey")
            .field("address", &self.address)
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}
