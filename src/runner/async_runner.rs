use std::error::Error as StdError;
use std::io::Write;
use std::path::Path;

use csv_async::{AsyncReaderBuilder, Error as CsvError, Trim};
use tokio::fs::File;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::debug;

use crate::dto::{MutationKind, MutationRow};
use crate::runner::write_balances;
use crate::{Error, Ledger};

const BUFFER_SIZE: usize = 1024;

type Result<T, E = Box<dyn StdError + Send + Sync>> = std::result::Result<T, E>;

/// Counts for one batch run. Rejected mutations are the ones the ledger
/// turned away with a domain error; they leave no trace in the table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplySummary {
    pub applied: usize,
    pub rejected: usize,
}

/// Applies a CSV of mutations to the ledger and writes the final balances
/// to the provided writer. Spawns two tasks:
/// * CSV reader - streams mutation rows from the input file, deserializes them and sends them to the processor via channel.
/// * Processor - receives mutations from the channel and applies them through the ledger until the channel is closed.
///
/// # Arguments
/// * `ledger` - An open ledger; every applied mutation is durably persisted
/// * `input_path` - Path to the input CSV file containing mutations
/// * `writer` - Where to write the account balances (e.g. stdout)
///
/// # Errors
/// Returns an error if:
/// * The input file cannot be read
/// * The CSV is malformed
/// * A mutation fails to persist (the ledger has already rolled it back)
/// * Writing to the output fails
pub async fn run<P, W>(ledger: &Ledger, input_path: P, writer: W) -> Result<ApplySummary>
where
    P: AsRef<Path>,
    W: Write,
{
    // Create channel for passing mutation rows from reader to processor
    let (tx, rx) = mpsc::channel(BUFFER_SIZE);
    let input_path = input_path.as_ref().to_owned();

    let reader_handle = tokio::spawn(read_mutations(input_path, tx));
    let processor_handle = tokio::spawn(apply_mutations(ledger.clone(), rx));

    // Wait for reader to finish and propagate any errors
    reader_handle.await??;

    // Persistence failures abort the batch; the failed mutation was rolled back
    let summary = processor_handle.await??;

    // Write final account balances to the provided writer
    write_balances(writer, ledger.accounts().await.into_iter())?;
    Ok(summary)
}

/// Reads and deserializes mutation rows from a CSV file.
/// Returns them through the provided channel.
async fn read_mutations(
    input_path: impl AsRef<Path> + Send,
    tx: mpsc::Sender<MutationRow>,
) -> Result<(), CsvError> {
    let file = File::open(input_path).await?;
    let mut csv_reader = AsyncReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .create_deserializer(file);

    let mut records = csv_reader.deserialize::<MutationRow>();
    while let Some(result) = records.next().await {
        match result {
            Ok(row) => {
                if tx.send(row).await.is_err() {
                    // Receiver dropped, exit gracefully
                    break;
                }
            }
            // CSV parsing errors are critical - propagate them
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Applies mutations received through the channel, one at a time so batch
/// order is the commit order. Returns the summary once the channel is
/// closed by the reader.
async fn apply_mutations(
    ledger: Ledger,
    mut rx: mpsc::Receiver<MutationRow>,
) -> Result<ApplySummary, Error> {
    let mut summary = ApplySummary::default();
    while let Some(row) = rx.recv().await {
        let outcome = match row.kind {
            MutationKind::Credit => ledger.credit(&row.account, row.amount).await,
            MutationKind::Debit => ledger.debit(&row.account, row.amount).await,
        };
        match outcome {
            Ok(_) => summary.applied += 1,
            Err(err @ (Error::Persistence(_) | Error::CorruptStorage { .. })) => return Err(err),
            Err(err) => {
                debug!(account = %row.account, error = %err, "mutation rejected");
                summary.rejected += 1;
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StorageCodec;
    use crate::stores::Account;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use tempfile::tempdir;

    async fn seeded_ledger(path: &Path, accounts: &[(&str, Decimal)]) -> Ledger {
        let table: HashMap<String, Account> = accounts
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
        StorageCodec::new(path).save(&table).await.unwrap();
        Ledger::open(path).await.unwrap()
    }

    #[tokio::test]
    async fn test_example_mutations() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let ledger = seeded_ledger(&path, &[("alice", dec!(100)), ("bob", dec!(50))]).await;

        let mut output = Vec::new();
        let summary = run(&ledger, "data/example_mutations.csv", &mut output).await?;

        assert_eq!(
            summary,
            ApplySummary {
                applied: 3,
                rejected: 3,
            }
        );
        let expected = "account,balance,version
alice,120.00,2
bob,30.00,1
";
        assert_eq!(String::from_utf8(output)?, expected);

        // Applied mutations are already durable
        let on_disk = StorageCodec::new(&path).load().await.unwrap();
        assert_eq!(on_disk["alice"].balance, dec!(120.00));
        assert_eq!(on_disk["bob"].balance, dec!(30.00));
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_csv_aborts() {
        let dir = tempdir().unwrap();
        let ledger = seeded_ledger(&dir.path().join("ledger.json"), &[("alice", dec!(10))]).await;

        let input = dir.path().join("bad.csv");
        tokio::fs::write(&input, "kind,account,amount\ncredit,alice,not-a-number\n")
            .await
            .unwrap();

        let mut output = Vec::new();
        assert!(run(&ledger, &input, &mut output).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_input_file() {
        let dir = tempdir().unwrap();
        let ledger = seeded_ledger(&dir.path().join("ledger.json"), &[]).await;

        let mut output = Vec::new();
        let result = run(&ledger, dir.path().join("nope.csv"), &mut output).await;
        assert!(result.is_err());
    }
}
