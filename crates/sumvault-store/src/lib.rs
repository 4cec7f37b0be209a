//! Sumvault Store - persistence for encrypted summaries
//!
//! Records carry the envelope string exactly as the crypto layer produced
//! it. Nothing here decrypts, parses or re-encodes envelopes.

pub mod contract;
pub mod record;
pub mod sqlite;

pub use record::{generate_session_id, ConversationStats, SummaryRecord};
pub use sqlite::SqliteSummaryStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Summary not found: {0}")]
    NotFound(String),

    #[error("Invalid contract bytes: {0}")]
    InvalidContractBytes(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No home directory")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Owner-scoped storage of summary records
pub trait SummaryStore {
    /// Insert or replace a record
    fn save(&self, record: &SummaryRecord) -> Result<()>;

    fn get(&self, owner: &str, id: &str) -> Result<SummaryRecord>;

    /// All records for `owner`, newest first
    fn list(&self, owner: &str) -> Result<Vec<SummaryRecord>>;

    fn delete(&self, owner: &str, id: &str) -> Result<()>;

    /// Remove every record for `owner`, returning how many were removed
    fn clear(&self, owner: &str) -> Result<usize>;

    /// Flag a record as also written to the on-chain summary contract
    fn mark_contract_stored(&self, owner: &str, id: &str) -> Result<()>;
}
