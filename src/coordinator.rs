//! Serialization layer between the public API and the account store.
//!
//! Two locks govern every mutation:
//! - a per-account mutex, so mutations against the same account are
//!   linearized in FIFO order (tokio mutexes queue waiters fairly) without
//!   blocking unrelated accounts;
//! - a global commit lock around the apply-then-save pair, because the whole
//!   table shares a single storage file and a table snapshot must never
//!   capture a mutation that later rolls back.
//!
//! A mutation is acknowledged only after the codec has durably written it.
//! If the write-through fails, the in-memory account is restored to its
//! pre-mutation state (balance and version) before the error surfaces, so
//! callers never observe an unpersisted balance change.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::codec::StorageCodec;
use crate::dto::{MutationIntent, MutationKind};
use crate::stores::{Account, AccountsStore};
use crate::Error;

pub struct MutationCoordinator {
    store: Arc<RwLock<AccountsStore>>,
    codec: Arc<StorageCodec>,
    account_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    commit_lock: Arc<Mutex<()>>,
}

impl MutationCoordinator {
    pub fn new(store: Arc<RwLock<AccountsStore>>, codec: Arc<StorageCodec>) -> Self {
        Self {
            store,
            codec,
            account_locks: Mutex::new(HashMap::new()),
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Applies one mutation and persists it before acknowledging.
    ///
    /// The commit sequence runs in a spawned task: once the in-memory
    /// mutation has started, a caller that disconnects (drops the future)
    /// cannot abandon it between the memory write and the disk write.
    pub async fn perform(&self, intent: MutationIntent) -> Result<Account, Error> {
        let account_lock = self.lock_for(&intent.account_id).await;
        let store = Arc::clone(&self.store);
        let codec = Arc::clone(&self.codec);
        let commit_lock = Arc::clone(&self.commit_lock);

        let commit = tokio::spawn(async move {
            let _account_guard = account_lock.lock().await;
            let _commit_guard = commit_lock.lock().await;

            let (prior, applied, snapshot) = {
                let mut store = store.write().await;
                let prior = store.get(&intent.account_id)?.clone();
                let applied = match intent.kind {
                    MutationKind::Credit => {
                        store.apply_credit(&intent.account_id, intent.amount)?
                    }
                    MutationKind::Debit => store.apply_debit(&intent.account_id, intent.amount)?,
                };
                (prior, applied, store.table().clone())
            };

            if let Err(err) = codec.save(&snapshot).await {
                warn!(account = %prior.id, error = %err, "write-through failed, rolling back");
                store.write().await.restore(prior);
                return Err(err);
            }
            Ok(applied)
        });

        commit
            .await
            .map_err(|err| Error::Persistence(format!("commit task failed: {err}")))?
    }

    /// Writes the current table through to storage without mutating it.
    /// Used at teardown; serialized against in-flight commits.
    pub async fn flush(&self) -> Result<(), Error> {
        let _commit_guard = self.commit_lock.lock().await;
        let snapshot = self.store.read().await.table().clone();
        self.codec.save(&snapshot).await
    }

    async fn lock_for(&self, account_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.account_locks.lock().await;
        locks.entry(account_id.to_string()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn seeded_store(accounts: &[(&str, Decimal)]) -> Arc<RwLock<AccountsStore>> {
        let table = accounts
            .iter()
            .map(|(id, balance)| {
                (
                    id.to_string(),
                    Account {
                        id: id.to_string(),
                        balance: *balance,
                        version: 0,
                    },
                )
            })
            .collect();
        Arc::new(RwLock::new(AccountsStore::from_table(table)))
    }

    fn intent(account_id: &str, kind: MutationKind, amount: Decimal) -> MutationIntent {
        MutationIntent {
            account_id: account_id.to_string(),
            kind,
            amount,
        }
    }

    #[tokio::test]
    async fn test_committed_mutation_is_durable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = seeded_store(&[("alice", dec!(100))]);
        let codec = Arc::new(StorageCodec::new(&path));
        let coordinator = MutationCoordinator::new(store, Arc::clone(&codec));

        let account = coordinator
            .perform(intent("alice", MutationKind::Debit, dec!(40)))
            .await
            .unwrap();
        assert_eq!(account.balance, dec!(60));
        assert_eq!(account.version, 1);

        // The acknowledged state is already on disk
        let on_disk = codec.load().await.unwrap();
        assert_eq!(on_disk["alice"].balance, dec!(60));
        assert_eq!(on_disk["alice"].version, 1);
    }

    #[tokio::test]
    async fn test_failed_persistence_rolls_back_memory() {
        let dir = tempdir().unwrap();
        // Parent directory does not exist, so every save fails
        let path = dir.path().join("missing").join("ledger.json");
        let store = seeded_store(&[("alice", dec!(100))]);
        let coordinator =
            MutationCoordinator::new(Arc::clone(&store), Arc::new(StorageCodec::new(&path)));

        let result = coordinator
            .perform(intent("alice", MutationKind::Credit, dec!(25)))
            .await;
        assert!(matches!(result, Err(Error::Persistence(_))));

        let store = store.read().await;
        let account = store.get("alice").unwrap();
        assert_eq!(account.balance, dec!(100));
        assert_eq!(account.version, 0);
    }

    #[tokio::test]
    async fn test_rejected_mutation_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = seeded_store(&[("alice", dec!(50))]);
        let coordinator =
            MutationCoordinator::new(store, Arc::new(StorageCodec::new(&path)));

        let result = coordinator
            .perform(intent("alice", MutationKind::Debit, dec!(80)))
            .await;
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_same_account_mutations_are_serialized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = seeded_store(&[("alice", dec!(100))]);
        let codec = Arc::new(StorageCodec::new(&path));
        let coordinator = Arc::new(MutationCoordinator::new(Arc::clone(&store), codec));

        // 20 debits of 10 against a balance of 100: exactly 10 may win
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    coordinator
                        .perform(intent("alice", MutationKind::Debit, dec!(10)))
                        .await
                })
            })
            .collect();

        let mut succeeded = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(Error::InsufficientFunds { .. }) => insufficient += 1,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(succeeded, 10);
        assert_eq!(insufficient, 10);

        let store = store.read().await;
        let account = store.get("alice").unwrap();
        assert_eq!(account.balance, dec!(0));
        assert_eq!(account.version, 10);
    }

    #[tokio::test]
    async fn test_flush_writes_current_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = seeded_store(&[("alice", dec!(42))]);
        let codec = Arc::new(StorageCodec::new(&path));
        let coordinator = MutationCoordinator::new(store, Arc::clone(&codec));

        coordinator.flush().await.unwrap();
        let on_disk = codec.load().await.unwrap();
        assert_eq!(on_disk["alice"].balance, dec!(42));
    }
}
