//! Wallet signer seam and a local secp256k1 wallet
//!
//! The core never owns a browser wallet. It asks a `WalletSigner` for a
//! signature over the key-derivation message and treats the answer as key
//! material. `LocalWallet` signs the way `personal_sign` does (EIP-191),
//! with RFC 6979 deterministic nonces.

use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};
use zeroize::Zeroizing;

/// Length of an r || s || v signature
pub const SIGNATURE_SIZE: usize = 65;

#[derive(Error, Debug)]
pub enum SignerError {
    #[error("User rejected the request: {0}")]
    Rejected(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

/// Something that can sign messages on behalf of a wallet address
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Active wallet address, `None` when no wallet is connected
    fn address(&self) -> Option<String>;

    /// Sign `message` and return the signature as `0x`-prefixed hex.
    ///
    /// Browser-style wallets prompt a human here, so this may take a long
    /// time or fail with `SignerError::Rejected`.
    async fn sign_message(&self, message: &str) -> Result<String, SignerError>;
}

/// An in-process wallet backed by a secp256k1 private key
pub struct LocalWallet {
    signing_key: SigningKey,
    address: String,
}

impl LocalWallet {
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_of(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// Parse a 32-byte private key given as hex (with or without `0x`)
    pub fn from_hex(key: &SecretString) -> Result<Self, SignerError> {
        let trimmed = key.expose_secret().trim();
        let clean = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(
            hex::decode(clean).map_err(|e| SignerError::InvalidKey(e.to_string()))?,
        );
        let signing_key =
            SigningKey::from_slice(&bytes).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// EIP-55 checksummed address of this wallet
    pub fn checksum_address(&self) -> &str {
        &self.address
    }

    /// Sign a 32-byte prehash, returning r || s || v with v in {27, 28}
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<[u8; SIGNATURE_SIZE], SignerError> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|e| SignerError::Wallet(e.to_string()))?;

        let mut out = [0u8; SIGNATURE_SIZE];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = 27 + recovery_id.to_byte();
        Ok(out)
    }
}

#[async_trait]
impl WalletSigner for LocalWallet {
    fn address(&self) -> Option<String> {
        Some(self.address.clone())
    }

    async fn sign_message(&self, message: &str) -> Result<String, SignerError> {
        let hash = eip191_hash(message);
        let signature = self.sign_hash(&hash)?;
        Ok(format!("0x{}", hex::encode(signature)))
    }
}

/// Keccak-256 digest
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut out = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut out);
    out
}

/// Hash a message the way `personal_sign` does:
/// keccak256("\x19Ethereum Signed Message:\n" || len || message)
pub fn eip191_hash(message: &str) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut hasher = Keccak::v256();
    let mut out = [0u8; 32];
    hasher.update(prefix.as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize(&mut out);
    out
}

/// Recover the checksummed address that produced `signature_hex` over `message`
pub fn recover_address(message: &str, signature_hex: &str) -> Result<String, SignerError> {
    let clean = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let bytes =
        hex::decode(clean).map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
    if bytes.len() != SIGNATURE_SIZE {
        return Err(SignerError::InvalidSignature(format!(
            "expected {SIGNATURE_SIZE} bytes, got {}",
            bytes.len()
        )));
    }

    // Accept both 0/1 and Ethereum-style 27/28
    let mut v = bytes[64];
    if v >= 27 {
        v -= 27;
    }
    let recovery_id = RecoveryId::try_from(v)
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
    let signature = Signature::try_from(&bytes[..64])
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;

    let hash = eip191_hash(message);
    let verifying_key = VerifyingKey::recover_from_prehash(&hash, &signature, recovery_id)
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;

    Ok(address_of(&verifying_key))
}

fn address_of(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag
    let hash = keccak256(&point.as_bytes()[1..]);
    to_checksum_address(&hash[12..])
}

/// EIP-55 mixed-case encoding of a 20-byte address
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known key from the web3.js docs (NEVER use for real funds)
    const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const TEST_KEY_ADDRESS: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";

    fn wallet() -> LocalWallet {
        LocalWallet::from_hex(&SecretString::new(TEST_KEY.to_string())).unwrap()
    }

    #[test]
    fn test_address_from_known_key() {
        assert_eq!(wallet().checksum_address(), TEST_KEY_ADDRESS);
    }

    #[test]
    fn test_eip55_vectors() {
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        ] {
            let raw = hex::decode(expected[2..].to_lowercase()).unwrap();
            assert_eq!(to_checksum_address(&raw), expected);
        }
    }

    #[test]
    fn test_invalid_key_rejected() {
        let short = SecretString::new("0x1234".to_string());
        assert!(matches!(
            LocalWallet::from_hex(&short),
            Err(SignerError::InvalidKey(_))
        ));

        let not_hex = SecretString::new("zz".repeat(32));
        assert!(LocalWallet::from_hex(&not_hex).is_err());
    }

    #[tokio::test]
    async fn test_signing_is_deterministic() {
        let wallet = wallet();
        let a = wallet.sign_message("Summary Encryption Key v1").await.unwrap();
        let b = wallet.sign_message("Summary Encryption Key v1").await.unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 2 + SIGNATURE_SIZE * 2);

        let other = wallet.sign_message("something else").await.unwrap();
        assert_ne!(a, other);
    }

    #[tokio::test]
    async fn test_recover_signer_address() {
        let wallet = wallet();
        let message = "Summary Encryption Key v1\nAddress: 0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";
        let signature = wallet.sign_message(message).await.unwrap();

        let recovered = recover_address(message, &signature).unwrap();
        assert_eq!(recovered, TEST_KEY_ADDRESS);

        // A different message recovers some other key
        let wrong = recover_address("tampered", &signature).unwrap_or_default();
        assert_ne!(wrong, TEST_KEY_ADDRESS);
    }

    #[test]
    fn test_recover_rejects_bad_length() {
        assert!(matches!(
            recover_address("m", "0xdeadbeef"),
            Err(SignerError::InvalidSignature(_))
        ));
    }
}
