//! Key derivation: SHA-256(signature_bytes || salt) -> 32-byte AES key
//!
//! No stretching. The input is an ECDSA signature, not a password.

use ring::digest::{Context, SHA256};
use zeroize::Zeroizing;

use crate::cipher::KEY_SIZE;
use crate::{CryptoError, Result};

/// Decode a wallet signature given as hex, with or without `0x`
pub fn decode_signature_hex(signature_hex: &str) -> Result<Zeroizing<Vec<u8>>> {
    let clean = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    if clean.len() % 2 != 0 {
        return Err(CryptoError::InvalidSignature("odd-length hex".into()));
    }
    hex::decode(clean)
        .map(Zeroizing::new)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
}

/// Derive the AES key for one envelope from the wallet signature and its salt
pub fn derive_key(signature_hex: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let signature = decode_signature_hex(signature_hex)?;

    let mut ctx = Context::new(&SHA256);
    ctx.update(&signature);
    ctx.update(salt);
    let digest = ctx.finish();

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(digest.as_ref());
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_answer() {
        // SHA-256("abc"), split across signature and salt
        let key = derive_key("0x6162", b"c").unwrap();
        assert_eq!(
            hex::encode(*key),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_prefix_is_optional() {
        let salt = [7u8; 16];
        let with = derive_key("0xdeadbeef", &salt).unwrap();
        let without = derive_key("deadbeef", &salt).unwrap();
        assert_eq!(*with, *without);
    }

    #[test]
    fn test_salt_separates_keys() {
        let a = derive_key("0xdeadbeef", &[1u8; 16]).unwrap();
        let b = derive_key("0xdeadbeef", &[2u8; 16]).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_deterministic() {
        let salt = [42u8; 16];
        let a = derive_key("0x0102030405", &salt).unwrap();
        let b = derive_key("0x0102030405", &salt).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_invalid_hex() {
        assert!(matches!(
            derive_key("0xabc", &[0u8; 16]),
            Err(CryptoError::InvalidSignature(_))
        ));
        assert!(matches!(
            derive_key("0xzz", &[0u8; 16]),
            Err(CryptoError::InvalidSignature(_))
        ));
    }
}
