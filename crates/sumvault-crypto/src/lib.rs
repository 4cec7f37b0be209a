//! Sumvault Crypto - wallet-signature encryption for chat summaries
//!
//! This crate provides:
//! - A `WalletSigner` seam and a local secp256k1 wallet
//! - A per-address signature cache for the session
//! - SHA-256 key derivation from (signature, salt)
//! - AES-256-GCM sealing with a versioned JSON envelope
//!
//! Summaries leave this crate encrypted. Nothing falls back to plaintext.

pub mod cipher;
pub mod envelope;
pub mod kdf;
pub mod session;
pub mod signer;
pub mod summary;

pub use envelope::{Algorithm, Envelope};
pub use session::{key_derivation_message, SignatureCache, WalletSignature};
pub use signer::{LocalWallet, SignerError, WalletSigner};
pub use summary::SummaryCrypto;

/// Errors that can occur while encrypting or decrypting summaries
#[derive(Debug, Clone, thiserror::Error)]
pub enum CryptoError {
    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Signature request rejected: {0}")]
    SignatureRejected(String),

    #[error("Invalid wallet signature: {0}")]
    InvalidSignature(String),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Unsupported envelope format (v={version}, alg={algorithm})")]
    UnsupportedVersion { version: i64, algorithm: String },

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed - wrong key or tampered data")]
    DecryptionFailed,

    #[error("Secure random source unavailable")]
    RandomUnavailable,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
