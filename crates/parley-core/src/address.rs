//! Shareable identity strings.
//!
//! An address is the long-term public key, the anti-spam nonce (big endian)
//! and a two-byte checksum, hex-encoded in upper case:
//!
//! ```text
//! | public key (32) | nospam (4) | checksum (2) |
//! ```
//!
//! Checksum byte `i % 2` is the XOR of every preceding byte `i`, which
//! catches most transcription errors.

use crate::error::{Error, Result};
use crate::transport::{PublicKey, PUBLIC_KEY_SIZE};
use std::fmt;
use std::str::FromStr;

/// Size of the nospam value in bytes.
pub const NOSPAM_SIZE: usize = 4;

/// Size of the checksum in bytes.
pub const CHECKSUM_SIZE: usize = 2;

/// Size of a full address in bytes.
pub const ADDRESS_SIZE: usize = PUBLIC_KEY_SIZE + NOSPAM_SIZE + CHECKSUM_SIZE;

/// A full identity: key plus nospam.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToxAddress {
    public_key: PublicKey,
    nospam: u32,
}

impl ToxAddress {
    /// Build an address from its parts.
    pub fn new(public_key: PublicKey, nospam: u32) -> Self {
        Self { public_key, nospam }
    }

    /// The long-term public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The anti-spam nonce.
    pub fn nospam(&self) -> u32 {
        self.nospam
    }

    /// Serialize to the 38-byte wire form, checksum included.
    pub fn to_bytes(&self) -> [u8; ADDRESS_SIZE] {
        let mut out = [0u8; ADDRESS_SIZE];
        out[..PUBLIC_KEY_SIZE].copy_from_slice(&self.public_key);
        out[PUBLIC_KEY_SIZE..PUBLIC_KEY_SIZE + NOSPAM_SIZE]
            .copy_from_slice(&self.nospam.to_be_bytes());
        let sum = checksum(&out[..PUBLIC_KEY_SIZE + NOSPAM_SIZE]);
        out[PUBLIC_KEY_SIZE + NOSPAM_SIZE..].copy_from_slice(&sum);
        out
    }

    /// Upper-case hex form (76 characters).
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.to_bytes())
    }

    /// Parse and verify a hex address.
    pub fn parse(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| Error::InvalidAddress(e.to_string()))?;
        if bytes.len() != ADDRESS_SIZE {
            return Err(Error::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_SIZE,
                bytes.len()
            )));
        }

        let body = &bytes[..PUBLIC_KEY_SIZE + NOSPAM_SIZE];
        if checksum(body) != bytes[PUBLIC_KEY_SIZE + NOSPAM_SIZE..] {
            return Err(Error::InvalidAddress("checksum mismatch".into()));
        }

        let mut public_key = [0u8; PUBLIC_KEY_SIZE];
        public_key.copy_from_slice(&bytes[..PUBLIC_KEY_SIZE]);
        let mut nospam = [0u8; NOSPAM_SIZE];
        nospam.copy_from_slice(&bytes[PUBLIC_KEY_SIZE..PUBLIC_KEY_SIZE + NOSPAM_SIZE]);

        Ok(Self::new(public_key, u32::from_be_bytes(nospam)))
    }
}

impl fmt::Display for ToxAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ToxAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ToxAddress({})", crate::logging::ShortKey(&self.to_hex()))
    }
}

impl FromStr for ToxAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// XOR-fold `bytes` pairwise into two checksum bytes.
pub fn checksum(bytes: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let mut sum = [0u8; CHECKSUM_SIZE];
    for (i, b) in bytes.iter().enumerate() {
        sum[i % 2] ^= b;
    }
    sum
}

/// Decode a 64-character hex public key.
pub fn parse_public_key(s: &str) -> Result<PublicKey> {
    let bytes = hex::decode(s.trim()).map_err(|e| Error::InvalidAddress(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| Error::InvalidAddress("expected 32-byte public key".into()))
}

/// Upper-case hex of a public key.
pub fn public_key_hex(key: &PublicKey) -> String {
    hex::encode_upper(key)
}
