//! Encrypted envelope format for persisted summaries
//!
//! One canonical wire shape, compact JSON with base64 byte fields:
//!
//! ```text
//! {"v":1,"alg":"AES-GCM","salt":"<b64, 16 bytes>","iv":"<b64, 12 bytes>","ct":"<b64>"}
//! ```
//!
//! Parsing is strict. Anything that is not exactly this object (extra keys,
//! a JSON string wrapping the object, wrong field sizes) is malformed.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::cipher::{IV_SIZE, SALT_SIZE};
use crate::{CryptoError, Result};

/// The only envelope version this crate reads or writes
pub const ENVELOPE_VERSION: u32 = 1;

/// AEAD algorithm named in the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    AesGcm,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::AesGcm => "AES-GCM",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "AES-GCM" => Some(Algorithm::AesGcm),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An encrypted summary plus everything needed to decrypt it, except the key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Version of the envelope format
    pub version: u32,
    pub algorithm: Algorithm,
    /// KDF salt
    pub salt: [u8; SALT_SIZE],
    /// AES-GCM nonce
    pub iv: [u8; IV_SIZE],
    /// Ciphertext with the GCM tag appended
    pub ciphertext: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireEnvelope {
    // Wide enough that any integer version reads as unsupported, not malformed
    v: i64,
    alg: String,
    salt: String,
    iv: String,
    ct: String,
}

impl Envelope {
    /// Create a current-version AES-GCM envelope
    pub fn new(salt: [u8; SALT_SIZE], iv: [u8; IV_SIZE], ciphertext: Vec<u8>) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            algorithm: Algorithm::AesGcm,
            salt,
            iv,
            ciphertext,
        }
    }

    /// Reject envelopes this crate does not know how to open
    pub fn ensure_supported(&self) -> Result<()> {
        if self.version != ENVELOPE_VERSION {
            return Err(CryptoError::UnsupportedVersion {
                version: i64::from(self.version),
                algorithm: self.algorithm.to_string(),
            });
        }
        Ok(())
    }

    /// Serialize to the wire string
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    fn to_wire(&self) -> WireEnvelope {
        WireEnvelope {
            v: i64::from(self.version),
            alg: self.algorithm.as_str().to_string(),
            salt: BASE64.encode(self.salt),
            iv: BASE64.encode(self.iv),
            ct: BASE64.encode(&self.ciphertext),
        }
    }

    /// Parse a wire string produced by `serialize()`
    pub fn parse(input: &str) -> Result<Self> {
        let wire: WireEnvelope = serde_json::from_str(input)
            .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;

        let algorithm = match Algorithm::from_tag(&wire.alg) {
            Some(algorithm) if wire.v == i64::from(ENVELOPE_VERSION) => algorithm,
            _ => {
                return Err(CryptoError::UnsupportedVersion {
                    version: wire.v,
                    algorithm: wire.alg,
                })
            }
        };

        Ok(Self {
            version: ENVELOPE_VERSION,
            algorithm,
            salt: decode_fixed("salt", &wire.salt)?,
            iv: decode_fixed("iv", &wire.iv)?,
            ciphertext: decode_field("ct", &wire.ct)?,
        })
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.to_wire()).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

impl FromStr for Envelope {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| CryptoError::MalformedEnvelope(format!("{name}: {e}")))
}

fn decode_fixed<const N: usize>(name: &str, value: &str) -> Result<[u8; N]> {
    let bytes = decode_field(name, value)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        CryptoError::MalformedEnvelope(format!(
            "{name}: expected {N} bytes, got {}",
            bytes.len()
        ))
    })
}
