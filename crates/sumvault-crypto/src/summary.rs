//! Encrypt and decrypt chat summaries under a wallet-derived key
//!
//! `encrypt`: signature (cached) -> fresh salt + IV -> SHA-256 KDF ->
//! AES-GCM seal -> envelope string. `decrypt` parses and validates the
//! envelope first, so corrupt or foreign input never triggers a wallet
//! prompt, then reverses the same steps.
//!
//! Decryption only succeeds with the wallet that encrypted. There is no
//! explicit account check beyond the AEAD tag.

use std::sync::Arc;

use ring::rand::SystemRandom;
use tracing::debug;

use crate::cipher;
use crate::envelope::Envelope;
use crate::kdf::derive_key;
use crate::session::SignatureCache;
use crate::signer::WalletSigner;
use crate::{CryptoError, Result};

/// Summary encryption bound to one wallet signer and one session cache
pub struct SummaryCrypto {
    signer: Arc<dyn WalletSigner>,
    cache: Arc<SignatureCache>,
    rng: SystemRandom,
}

impl SummaryCrypto {
    /// Use a fresh session cache
    pub fn new(signer: Arc<dyn WalletSigner>) -> Self {
        Self::with_cache(signer, Arc::new(SignatureCache::new()))
    }

    /// Share an existing session cache (e.g. across several call sites)
    pub fn with_cache(signer: Arc<dyn WalletSigner>, cache: Arc<SignatureCache>) -> Self {
        Self {
            signer,
            cache,
            rng: SystemRandom::new(),
        }
    }

    pub fn cache(&self) -> &Arc<SignatureCache> {
        &self.cache
    }

    /// Active wallet address of the underlying signer
    pub fn address(&self) -> Option<String> {
        self.signer.address()
    }

    /// Encrypt `plaintext` and return the serialized envelope
    pub async fn encrypt(&self, plaintext: &str) -> Result<String> {
        let envelope = self.encrypt_envelope(plaintext).await?;
        Ok(envelope.serialize())
    }

    /// Decrypt a serialized envelope back to the exact original plaintext
    pub async fn decrypt(&self, envelope: &str) -> Result<String> {
        let envelope = Envelope::parse(envelope)?;
        self.decrypt_envelope(&envelope).await
    }

    pub async fn encrypt_envelope(&self, plaintext: &str) -> Result<Envelope> {
        let signature = self.cache.get_or_sign(self.signer.clone()).await?;

        let salt = cipher::generate_salt(&self.rng)?;
        let iv = cipher::generate_iv(&self.rng)?;
        let key = derive_key(signature.as_hex(), &salt)?;

        let ciphertext = cipher::seal(&key, &iv, plaintext.as_bytes())?;
        debug!(
            plaintext_len = plaintext.len(),
            ciphertext_len = ciphertext.len(),
            "summary encrypted"
        );

        Ok(Envelope::new(salt, iv, ciphertext))
    }

    pub async fn decrypt_envelope(&self, envelope: &Envelope) -> Result<String> {
        // No wallet prompt for envelopes we could never open
        envelope.ensure_supported()?;

        let signature = self.cache.get_or_sign(self.signer.clone()).await?;
        let key = derive_key(signature.as_hex(), &envelope.salt)?;

        let plaintext = cipher::open(&key, &envelope.iv, &envelope.ciphertext)?;
        debug!(ciphertext_len = envelope.ciphertext.len(), "summary decrypted");

        String::from_utf8(plaintext.to_vec()).map_err(|_| CryptoError::DecryptionFailed)
    }
}
