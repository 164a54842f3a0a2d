//! Public operation set of the ledger engine: get balance, credit, debit,
//! plus lifecycle (open, flush) and a sorted listing for export. Adapters
//! (HTTP controllers, the CLI) call these and nothing deeper.

use std::path::PathBuf;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::codec::StorageCodec;
use crate::coordinator::MutationCoordinator;
use crate::dto::{AccountRow, BalanceView, MutationIntent, MutationKind, MutationReceipt};
use crate::stores::AccountsStore;
use crate::Error;

/// Handle to an open ledger. Cheap to clone; clones share the same account
/// table, locks, and storage file, so adapters can serve concurrent
/// requests from one `open` call.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<RwLock<AccountsStore>>,
    coordinator: Arc<MutationCoordinator>,
}

impl Ledger {
    /// Loads the account table from the given storage location.
    ///
    /// An absent file starts an empty ledger; an unreadable or invalid file
    /// fails with [`Error::CorruptStorage`] and the engine refuses to start.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let codec = Arc::new(StorageCodec::new(path));
        let table = codec.load().await?;
        let store = Arc::new(RwLock::new(AccountsStore::from_table(table)));
        let coordinator = Arc::new(MutationCoordinator::new(Arc::clone(&store), codec));
        Ok(Self { store, coordinator })
    }

    /// Read-only balance lookup. Never mutates state or version.
    pub async fn balance(&self, account_id: &str) -> Result<BalanceView, Error> {
        let store = self.store.read().await;
        store.get(account_id).map(BalanceView::from)
    }

    /// Increases an account balance; acknowledged only once persisted.
    pub async fn credit(
        &self,
        account_id: &str,
        amount: Decimal,
    ) -> Result<MutationReceipt, Error> {
        self.mutate(account_id, MutationKind::Credit, amount).await
    }

    /// Decreases an account balance; never below zero; acknowledged only
    /// once persisted.
    pub async fn debit(&self, account_id: &str, amount: Decimal) -> Result<MutationReceipt, Error> {
        self.mutate(account_id, MutationKind::Debit, amount).await
    }

    /// All accounts, sorted by id for deterministic export.
    pub async fn accounts(&self) -> Vec<AccountRow> {
        let store = self.store.read().await;
        let mut rows: Vec<AccountRow> = store.iter().map(AccountRow::from).collect();
        rows.sort_by(|a, b| a.account.cmp(&b.account));
        rows
    }

    /// Final write-through at teardown. Every committed mutation is already
    /// on disk, so this is a no-op unless the file was tampered with out of
    /// band.
    pub async fn flush(&self) -> Result<(), Error> {
        self.coordinator.flush().await
    }

    async fn mutate(
        &self,
        account_id: &str,
        kind: MutationKind,
        amount: Decimal,
    ) -> Result<MutationReceipt, Error> {
        // Shape validation happens here so malformed requests never reach
        // the coordinator's locks.
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }
        let intent = MutationIntent {
            account_id: account_id.to_string(),
            kind,
            amount,
        };
        self.coordinator.perform(intent).await.map(MutationReceipt::from)
    }
}
