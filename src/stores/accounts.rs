use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::Error;

/// A single ledger account. `id` is immutable once created; `version`
/// increments by exactly one on every committed mutation and is the handle
/// for optimistic-conflict detection and audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub balance: Decimal,
    pub version: u64,
}

/// In-memory account table. This is the only component allowed to mutate a
/// balance, and no code path here leaves a balance negative: each mutation
/// validates first, then applies in full or not at all.
#[derive(Debug, Default)]
pub struct AccountsStore {
    accounts: HashMap<String, Account>,
}

impl AccountsStore {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
        }
    }

    pub fn from_table(accounts: HashMap<String, Account>) -> Self {
        Self { accounts }
    }

    /// Gets an account entry, or returns an error if it doesn't exist.
    pub fn get(&self, account_id: &str) -> Result<&Account, Error> {
        self.accounts
            .get(account_id)
            .ok_or_else(|| Error::AccountNotFound(account_id.to_string()))
    }

    /// Increments the balance and version of an account.
    pub fn apply_credit(&mut self, account_id: &str, amount: Decimal) -> Result<Account, Error> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }
        let account = self.get_mut(account_id)?;
        account.balance += amount;
        account.version += 1;
        Ok(account.clone())
    }

    /// Decrements the balance of an account, incrementing its version.
    /// The balance check and the subtraction happen under the same borrow,
    /// so a debit can never drive the balance below zero.
    pub fn apply_debit(&mut self, account_id: &str, amount: Decimal) -> Result<Account, Error> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }
        let account = self.get_mut(account_id)?;
        if account.balance < amount {
            return Err(Error::InsufficientFunds {
                balance: account.balance,
                amount,
            });
        }
        account.balance -= amount;
        account.version += 1;
        Ok(account.clone())
    }

    /// Puts back a pre-mutation snapshot of one account. Rollback path for
    /// the coordinator when the write-through fails after an in-memory
    /// mutation succeeded.
    pub fn restore(&mut self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn table(&self) -> &HashMap<String, Account> {
        &self.accounts
    }

    fn get_mut(&mut self, account_id: &str) -> Result<&mut Account, Error> {
        self.accounts
            .get_mut(account_id)
            .ok_or_else(|| Error::AccountNotFound(account_id.to_string()))
    }
}
