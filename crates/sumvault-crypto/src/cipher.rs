//! AES-256-GCM authenticated encryption
//!
//! Same parameters as Web Crypto's `AES-GCM`: 256-bit key, 96-bit IV,
//! 128-bit tag appended to the ciphertext, no associated data. The IV is
//! passed explicitly because the envelope carries it next to the salt.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::{CryptoError, Result};

/// 256-bit key (32 bytes)
pub const KEY_SIZE: usize = 32;
/// 96-bit IV (12 bytes)
pub const IV_SIZE: usize = 12;
/// Per-envelope KDF salt (16 bytes)
pub const SALT_SIZE: usize = 16;
/// GCM authentication tag (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Generate a fresh random salt
pub fn generate_salt(rng: &SystemRandom) -> Result<[u8; SALT_SIZE]> {
    let mut salt = [0u8; SALT_SIZE];
    rng.fill(&mut salt).map_err(|_| CryptoError::RandomUnavailable)?;
    Ok(salt)
}

/// Generate a fresh random IV
pub fn generate_iv(rng: &SystemRandom) -> Result<[u8; IV_SIZE]> {
    let mut iv = [0u8; IV_SIZE];
    rng.fill(&mut iv).map_err(|_| CryptoError::RandomUnavailable)?;
    Ok(iv)
}

/// Encrypt plaintext under `key` and `iv`.
///
/// Returns: ciphertext || tag
pub fn seal(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::EncryptionFailed)?;
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)
}

/// Decrypt ciphertext produced by `seal()`.
///
/// Any failure (wrong key, wrong IV, tampered bytes, truncated tag) is
/// reported as `DecryptionFailed` without saying which.
pub fn open(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::DecryptionFailed)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    Ok(Zeroizing::new(plaintext))
}
