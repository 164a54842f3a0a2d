use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use crate::stores::Account;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Credit,
    Debit,
}

/// A balance mutation request against a single account.
///
/// Consumed exactly once by the coordinator; never persisted on its own,
/// only through its effect on the account record.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationIntent {
    pub account_id: String,
    pub kind: MutationKind,
    pub amount: Decimal,
}

/// One row of a batch mutation CSV: `kind,account,amount`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MutationRow {
    pub kind: MutationKind,
    pub account: String,
    #[serde(deserialize_with = "deserialize_decimal_cents")]
    pub amount: Decimal,
}

/// Read-only balance snapshot returned to adapters.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BalanceView {
    pub account_id: String,
    pub balance: Decimal,
    pub version: u64,
}

impl From<&Account> for BalanceView {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id.clone(),
            balance: account.balance,
            version: account.version,
        }
    }
}

/// Acknowledgment of a committed (durably persisted) mutation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MutationReceipt {
    pub account_id: String,
    pub new_balance: Decimal,
    pub version: u64,
}

impl From<Account> for MutationReceipt {
    fn from(account: Account) -> Self {
        Self {
            account_id: account.id,
            new_balance: account.balance,
            version: account.version,
        }
    }
}

/// One row of the balances export CSV, sorted by account id for
/// deterministic output.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AccountRow {
    pub account: String,
    pub balance: Decimal,
    pub version: u64,
}

impl From<&Account> for AccountRow {
    fn from(account: &Account) -> Self {
        Self {
            account: account.id.clone(),
            balance: account.balance,
            version: account.version,
        }
    }
}

fn deserialize_decimal_cents<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    <Decimal as Deserialize>::deserialize(deserializer)
        .map(|dec| dec.round_dp_with_strategy(2, RoundingStrategy::ToZero))
}
