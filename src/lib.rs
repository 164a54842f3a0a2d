mod codec;
mod coordinator;
mod dto;
mod error;
mod ledger;
mod runner;
mod stores;

pub use codec::StorageCodec;
pub use coordinator::MutationCoordinator;
pub use dto::{AccountRow, BalanceView, MutationIntent, MutationKind, MutationReceipt, MutationRow};
pub use error::Error;
pub use ledger::Ledger;
pub use runner::{run, write_balances, ApplySummary};
pub use stores::{Account, AccountsStore};
