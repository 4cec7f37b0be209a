//! SQLite-backed summary store
//!
//! One table, keyed by (owner, id). Envelopes are stored as text and
//! returned byte-for-byte.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::{Result, StoreError, SummaryRecord, SummaryStore};

const COLUMNS: &str = "id, owner, title, created_at, envelope, conversation_length, \
                       duration_minutes, topic, session_id, contract_stored";

/// SQLite summary store
pub struct SqliteSummaryStore {
    conn: Mutex<Connection>,
}

impl SqliteSummaryStore {
    /// Open or create the summary database
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;

        // WAL so a reader doesn't block a concurrent save
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS summaries (
                id TEXT NOT NULL,
                owner TEXT NOT NULL,
                title TEXT,
                created_at TEXT NOT NULL,
                envelope TEXT NOT NULL,
                conversation_length INTEGER NOT NULL DEFAULT 0,
                duration_minutes INTEGER,
                topic TEXT,
                session_id TEXT,
                contract_stored INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (owner, id)
            );
            CREATE INDEX IF NOT EXISTS idx_summaries_owner_created
                ON summaries(owner, created_at DESC);",
        )?;

        debug!(path = %path.display(), "summary store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open using the default path (~/.sumvault/summaries.db)
    pub fn open_default() -> Result<Self> {
        Self::open(default_path()?)
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// ~/.sumvault/summaries.db
pub fn default_path() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .ok_or(StoreError::NoHomeDir)?
        .join(".sumvault")
        .join("summaries.db"))
}

impl SummaryStore for SqliteSummaryStore {
    fn save(&self, record: &SummaryRecord) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            &format!("INSERT OR REPLACE INTO summaries ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                record.id,
                record.owner,
                record.title,
                record
                    .created_at
                    .to_rfc3339_opts(SecondsFormat::Nanos, true),
                record.envelope,
                record.conversation_length,
                record.duration_minutes,
                record.topic,
                record.session_id,
                record.contract_stored,
            ],
        )?;

        info!(id = %record.id, owner = %record.owner, "summary saved");
        Ok(())
    }

    fn get(&self, owner: &str, id: &str) -> Result<SummaryRecord> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM summaries WHERE owner = ?1 AND id = ?2"),
            params![owner, id],
            record_from_row,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn list(&self, owner: &str) -> Result<Vec<SummaryRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM summaries WHERE owner = ?1 ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![owner], record_from_row)?;
        let records = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn delete(&self, owner: &str, id: &str) -> Result<()> {
        let conn = self.conn();
        let deleted = conn.execute(
            "DELETE FROM summaries WHERE owner = ?1 AND id = ?2",
            params![owner, id],
        )?;
        if deleted == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        info!(%id, %owner, "summary deleted");
        Ok(())
    }

    fn clear(&self, owner: &str) -> Result<usize> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM summaries WHERE owner = ?1", params![owner])?;
        info!(%owner, deleted, "summaries cleared");
        Ok(deleted)
    }

    fn mark_contract_stored(&self, owner: &str, id: &str) -> Result<()> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE summaries SET contract_stored = 1 WHERE owner = ?1 AND id = ?2",
            params![owner, id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<SummaryRecord> {
    let created_at: String = row.get(3)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(SummaryRecord {
        id: row.get(0)?,
        owner: row.get(1)?,
        title: row.get(2)?,
        created_at,
        envelope: row.get(4)?,
        conversation_length: row.get(5)?,
        duration_minutes: row.get(6)?,
        topic: row.get(7)?,
        session_id: row.get(8)?,
        contract_stored: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::NamedTempFile;

    const ALICE: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";
    const BOB: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const ENVELOPE: &str = r#"{"alg":"AES-GCM","ct":"AQID","iv":"AAAAAAAAAAAAAAAA","salt":"AAAAAAAAAAAAAAAAAAAAAA==","v":1}"#;

    fn open_temp() -> (SqliteSummaryStore, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let store = SqliteSummaryStore::open(tmp.path().to_path_buf()).unwrap();
        (store, tmp)
    }

    #[test]
    fn test_save_and_get() {
        let (store, _tmp) = open_temp();
        let record = SummaryRecord::new(ALICE, ENVELOPE)
            .with_title("Weekly sync")
            .with_session("1700000000000_abcdefghi");

        store.save(&record).unwrap();
        let loaded = store.get(ALICE, &record.id).unwrap();

        assert_eq!(loaded, record);
        assert_eq!(loaded.envelope, ENVELOPE);
    }

    #[test]
    fn test_list_is_owner_scoped_and_newest_first() {
        let (store, _tmp) = open_temp();

        let mut older = SummaryRecord::new(ALICE, ENVELOPE).with_title("older");
        older.created_at = older.created_at - Duration::hours(1);
        let newer = SummaryRecord::new(ALICE, ENVELOPE).with_title("newer");
        let bobs = SummaryRecord::new(BOB, ENVELOPE);

        store.save(&older).unwrap();
        store.save(&newer).unwrap();
        store.save(&bobs).unwrap();

        let alice = store.list(ALICE).unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].title.as_deref(), Some("newer"));
        assert_eq!(alice[1].title.as_deref(), Some("older"));

        assert_eq!(store.list(BOB).unwrap().len(), 1);
        assert!(matches!(store.get(BOB, &newer.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_delete() {
        let (store, _tmp) = open_temp();
        let record = SummaryRecord::new(ALICE, ENVELOPE);
        store.save(&record).unwrap();

        store.delete(ALICE, &record.id).unwrap();
        assert!(store.list(ALICE).unwrap().is_empty());
        assert!(matches!(
            store.delete(ALICE, &record.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_clear_only_touches_owner() {
        let (store, _tmp) = open_temp();
        store.save(&SummaryRecord::new(ALICE, ENVELOPE)).unwrap();
        store.save(&SummaryRecord::new(ALICE, ENVELOPE)).unwrap();
        store.save(&SummaryRecord::new(BOB, ENVELOPE)).unwrap();

        assert_eq!(store.clear(ALICE).unwrap(), 2);
        assert!(store.list(ALICE).unwrap().is_empty());
        assert_eq!(store.list(BOB).unwrap().len(), 1);
    }

    #[test]
    fn test_mark_contract_stored() {
        let (store, _tmp) = open_temp();
        let record = SummaryRecord::new(ALICE, ENVELOPE);
        store.save(&record).unwrap();

        store.mark_contract_stored(ALICE, &record.id).unwrap();
        assert!(store.get(ALICE, &record.id).unwrap().contract_stored);

        assert!(matches!(
            store.mark_contract_stored(BOB, &record.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_save_replaces_existing() {
        let (store, _tmp) = open_temp();
        let mut record = SummaryRecord::new(ALICE, ENVELOPE);
        store.save(&record).unwrap();

        record.title = Some("renamed".into());
        store.save(&record).unwrap();

        let all = store.list(ALICE).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title.as_deref(), Some("renamed"));
    }
}
