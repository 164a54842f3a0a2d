//! The runner streams a CSV of balance mutations into an open ledger and
//! writes the resulting balances to a writer.
//!
//! Rejected mutations (unknown account, bad amount, insufficient funds) are
//! expected outcomes: they are counted and logged, not fatal. Malformed CSV
//! and persistence failures abort the run.

mod async_runner;

pub use async_runner::{run, ApplySummary};

use std::io::Write;

use crate::dto::AccountRow;

/// Writes balance rows to a CSV writer, one record per account.
pub fn write_balances<W>(writer: W, rows: impl Iterator<Item = AccountRow>) -> csv::Result<()>
where
    W: Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
