use std::env;
use std::error::Error;
use std::io;
use std::process;

use tracing_subscriber::EnvFilter;

use tallykeeper::{run, write_balances, Ledger};

const USAGE: &str = "Usage: tallykeeper <ledger.json> balances
       tallykeeper <ledger.json> apply <mutations.csv>";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run_app().await {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

async fn run_app() -> Result<(), Box<dyn Error + Send + Sync>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        return Err(USAGE.into());
    }

    let ledger = Ledger::open(&args[1]).await?;
    match args[2].as_str() {
        "balances" if args.len() == 3 => {
            write_balances(io::stdout(), ledger.accounts().await.into_iter())?;
        }
        "apply" if args.len() == 4 => {
            let summary = run(&ledger, &args[3], io::stdout()).await?;
            eprintln!(
                "applied {} mutations, rejected {}",
                summary.applied, summary.rejected
            );
        }
        _ => return Err(USAGE.into()),
    }
    Ok(())
}
