//! Durable storage codec for the account table.
//!
//! The full table is the unit of persistence: a pretty-printed JSON array of
//! account records sorted by id, so identical tables produce identical
//! files. Writes go through an atomic-replace protocol (temp file, flush and
//! sync, rename over the target) so a crash mid-write never leaves a
//! half-written table visible to the next load. No business logic lives
//! here; balance rules belong to the store.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use rust_decimal::Decimal;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::stores::Account;
use crate::Error;

pub struct StorageCodec {
    path: PathBuf,
}

impl StorageCodec {
    /// Creates a codec bound to the given storage path. The path is always
    /// injected by the caller; tests point it at a temp directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads and validates the account table. An absent file is the
    /// bootstrap case and yields an empty table; anything unreadable or
    /// malformed refuses to load rather than silently dropping records.
    pub async fn load(&self) -> Result<HashMap<String, Account>, Error> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no ledger file, starting empty");
                return Ok(HashMap::new());
            }
            Err(err) => return Err(self.corrupt(err.to_string())),
        };

        let records: Vec<Account> = serde_json::from_slice(&bytes)
            .map_err(|err| self.corrupt(format!("malformed JSON: {err}")))?;

        let mut table = HashMap::with_capacity(records.len());
        for account in records {
            if account.id.is_empty() {
                return Err(self.corrupt("record with empty account id"));
            }
            if account.balance < Decimal::ZERO {
                return Err(self.corrupt(format!(
                    "account `{}` has negative balance {}",
                    account.id, account.balance
                )));
            }
            let id = account.id.clone();
            if table.insert(id.clone(), account).is_some() {
                return Err(self.corrupt(format!("duplicate account id `{id}`")));
            }
        }
        debug!(path = %self.path.display(), accounts = table.len(), "ledger loaded");
        Ok(table)
    }

    /// Serializes the full table and atomically replaces the storage file.
    pub async fn save(&self, table: &HashMap<String, Account>) -> Result<(), Error> {
        let mut records: Vec<&Account> = table.values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        let bytes = serde_json::to_vec_pretty(&records)
            .map_err(|err| Error::Persistence(err.to_string()))?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|err| Error::Persistence(format!("create temp file: {err}")))?;
        file.write_all(&bytes)
            .await
            .map_err(|err| Error::Persistence(format!("write temp file: {err}")))?;
        file.sync_all()
            .await
            .map_err(|err| Error::Persistence(format!("sync temp file: {err}")))?;
        drop(file);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|err| Error::Persistence(format!("rename temp file: {err}")))?;
        debug!(path = %self.path.display(), accounts = records.len(), "write-through");
        Ok(())
    }

    fn corrupt(&self, reason: impl Into<String>) -> Error {
        Error::CorruptStorage {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}
