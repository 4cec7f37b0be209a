//! Session-scoped signature cache
//!
//! Signing the key-derivation message usually means a wallet prompt, so the
//! signature is requested once per address and reused for the rest of the
//! session. Entries are keyed by wallet address: switching accounts forces
//! a fresh signature and one account's key material is never used for
//! another.
//!
//! Concurrent callers for the same address share a single in-flight request
//! and all see its outcome. A rejected or failed request leaves the entry
//! empty so the next call prompts again. Signatures are never persisted.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::kdf::decode_signature_hex;
use crate::signer::WalletSigner;
use crate::{CryptoError, Result};

/// Fixed, domain-separated prefix. Changing it changes every derived key.
pub const KEY_DERIVATION_MESSAGE_PREFIX: &str = "Summary Encryption Key v1";

/// The message a wallet signs to produce key material for `address`.
///
/// The address is inserted verbatim, so callers must keep its casing stable.
pub fn key_derivation_message(address: &str) -> String {
    format!("{KEY_DERIVATION_MESSAGE_PREFIX}\nAddress: {address}")
}

/// A wallet signature used as key material. Scrubbed on drop.
#[derive(Clone)]
pub struct WalletSignature {
    hex: Zeroizing<String>,
}

impl WalletSignature {
    /// Validate that `hex` decodes to signature bytes
    pub fn from_hex(hex: String) -> Result<Self> {
        let hex = Zeroizing::new(hex);
        let bytes = decode_signature_hex(&hex)?;
        if bytes.is_empty() {
            return Err(CryptoError::InvalidSignature("empty signature".into()));
        }
        Ok(Self { hex })
    }

    pub fn as_hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Debug for WalletSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WalletSignature(<redacted>)")
    }
}

type SignRequest = Shared<BoxFuture<'static, Result<WalletSignature>>>;

enum Slot {
    Signed(WalletSignature),
    /// One wallet prompt, awaited by every concurrent caller
    Pending { id: u64, request: SignRequest },
}

/// Per-address signature cache for one session
#[derive(Default)]
pub struct SignatureCache {
    slots: Mutex<HashMap<String, Slot>>,
    next_id: AtomicU64,
}

impl SignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached signature for the signer's active address, or ask
    /// the signer for one and cache it.
    pub async fn get_or_sign(&self, signer: Arc<dyn WalletSigner>) -> Result<WalletSignature> {
        let address = signer.address().ok_or(CryptoError::WalletNotConnected)?;

        let (id, request) = {
            let mut slots = self.lock();
            match slots.get(&address) {
                Some(Slot::Signed(signature)) => {
                    debug!(%address, "signature cache hit");
                    return Ok(signature.clone());
                }
                Some(Slot::Pending { id, request }) => (*id, request.clone()),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let request = request_signature(signer, address.clone())
                        .boxed()
                        .shared();
                    slots.insert(
                        address.clone(),
                        Slot::Pending {
                            id,
                            request: request.clone(),
                        },
                    );
                    (id, request)
                }
            }
        };

        let result = request.await;
        self.settle(&address, id, &result);
        result
    }

    /// Replace our pending request with its outcome. A request superseded by
    /// `invalidate` or `clear` leaves the map alone.
    fn settle(&self, address: &str, id: u64, result: &Result<WalletSignature>) {
        let mut slots = self.lock();
        let ours = matches!(
            slots.get(address),
            Some(Slot::Pending { id: current, .. }) if *current == id
        );
        if !ours {
            return;
        }
        match result {
            Ok(signature) => {
                slots.insert(address.to_string(), Slot::Signed(signature.clone()));
            }
            Err(_) => {
                slots.remove(address);
            }
        }
    }

    /// Forget the signature for one address
    pub fn invalidate(&self, address: &str) {
        if self.lock().remove(address).is_some() {
            debug!(%address, "signature cache entry dropped");
        }
    }

    /// Forget every cached signature (session end)
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn is_cached(&self, address: &str) -> bool {
        matches!(self.lock().get(address), Some(Slot::Signed(_)))
    }

    /// Number of addresses holding a signature
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Signed(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        // The map holds no invariants a panicking holder could break
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn request_signature(
    signer: Arc<dyn WalletSigner>,
    address: String,
) -> Result<WalletSignature> {
    info!(%address, "requesting key-derivation signature from wallet");
    let message = key_derivation_message(&address);
    let hex = signer.sign_message(&message).await.map_err(|e| {
        warn!(%address, error = %e, "wallet signature not obtained");
        CryptoError::SignatureRejected(e.to_string())
    })?;
    WalletSignature::from_hex(hex)
}

impl fmt::Debug for SignatureCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureCache")
            .field("cached", &self.len())
            .finish()
    }
}
