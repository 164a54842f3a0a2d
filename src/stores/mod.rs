//! Storage layer for the ledger engine. Provides storage for:
//! - Account balances and versions ([`AccountsStore`])
//!
//! Current implementation is optimized for synchronous, direct memory
//! access; concurrency discipline lives in the coordinator, durability in
//! the codec.

mod accounts;

pub use accounts::{Account, AccountsStore};
