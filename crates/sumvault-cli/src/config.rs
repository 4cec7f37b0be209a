//! Wallet and storage configuration from flags / environment

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::Args;
use secrecy::SecretString;
use sumvault_crypto::{LocalWallet, SignerError, WalletSigner};

#[derive(Args)]
pub struct CliConfig {
    /// Wallet private key as hex
    #[arg(long, env = "SUMVAULT_WALLET_KEY", hide_env_values = true, global = true)]
    wallet_key: Option<String>,

    /// File containing the wallet private key
    #[arg(long, env = "SUMVAULT_WALLET_KEY_FILE", global = true, conflicts_with = "wallet_key")]
    wallet_key_file: Option<PathBuf>,

    /// Summary database (default: ~/.sumvault/summaries.db)
    #[arg(long, env = "SUMVAULT_DB", global = true)]
    db: Option<PathBuf>,
}

impl CliConfig {
    /// The configured private key, if any
    fn wallet_key(&self) -> anyhow::Result<Option<SecretString>> {
        if let Some(key) = &self.wallet_key {
            return Ok(Some(SecretString::new(key.clone())));
        }
        if let Some(path) = &self.wallet_key_file {
            let key = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read wallet key file {}", path.display()))?;
            if key.trim().is_empty() {
                bail!("Wallet key file {} is empty", path.display());
            }
            return Ok(Some(SecretString::new(key)));
        }
        Ok(None)
    }

    /// The configured wallet, or a disconnected one
    pub fn signer(&self) -> anyhow::Result<Arc<dyn WalletSigner>> {
        match self.wallet_key()? {
            Some(key) => {
                let wallet = LocalWallet::from_hex(&key).context("Invalid wallet key")?;
                Ok(Arc::new(wallet))
            }
            None => Ok(Arc::new(NoWallet)),
        }
    }

    pub fn db_path(&self) -> anyhow::Result<PathBuf> {
        match &self.db {
            Some(path) => Ok(path.clone()),
            None => Ok(sumvault_store::sqlite::default_path()?),
        }
    }
}

/// Stand-in when no key is configured; every operation reports
/// "Wallet not connected" through the normal error path.
struct NoWallet;

#[async_trait]
impl WalletSigner for NoWallet {
    fn address(&self) -> Option<String> {
        None
    }

    async fn sign_message(&self, _message: &str) -> Result<String, SignerError> {
        Err(SignerError::Wallet("no wallet configured".into()))
    }
}
