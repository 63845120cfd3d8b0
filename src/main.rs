use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use txledger::application::{Ledger, LedgerApi, TransferRequest};
use txledger::config::{ConfigArgs, LedgerConfig};
use txledger::domain::{Account, Currency};
use txledger::infrastructure::open_store;
use txledger::interfaces::csv::{AccountWriter, Operation, OperationReader};
use txledger::telemetry;

const REPLAY_PAGE: i64 = 100;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open an account with a zero balance
    CreateAccount {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        currency: Currency,
    },
    GetAccount { id: i64 },
    ListAccounts {
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(i64).range(5..=10))]
        limit: i64,
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..))]
        offset: i64,
    },
    /// Validate and run one transfer
    Transfer {
        #[arg(long)]
        from: i64,
        #[arg(long)]
        to: i64,
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        currency: Currency,
    },
    GetTransfer { id: i64 },
    /// List the entries posted to an account
    Entries { account_id: i64 },
    /// Replay `open` and `transfer` rows from a CSV file and print every account
    Replay { input: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = LedgerConfig::from(cli.config);
    telemetry::init(config.log_format);

    let store = open_store(&config.store).into_diagnostic()?;
    let ledger = Ledger::new(store);

    match cli.command {
        Command::CreateAccount { owner, currency } => {
            print_json(&ledger.create_account(owner, currency).await.into_diagnostic()?)
        }
        Command::GetAccount { id } => print_json(&ledger.get_account(id).await.into_diagnostic()?),
        Command::ListAccounts { limit, offset } => {
            print_json(&ledger.list_accounts(limit, offset).await.into_diagnostic()?)
        }
        Command::Transfer {
            from,
            to,
            amount,
            currency,
        } => {
            let request = TransferRequest {
                from_account_id: from,
                to_account_id: to,
                amount,
                currency,
            };
            print_json(&ledger.validated_transfer(request).await.into_diagnostic()?)
        }
        Command::GetTransfer { id } => {
            print_json(&ledger.get_transfer(id).await.into_diagnostic()?)
        }
        Command::Entries { account_id } => print_json(
            &ledger
                .list_entries_by_account(account_id)
                .await
                .into_diagnostic()?,
        ),
        Command::Replay { input } => replay(&ledger, input).await,
    }
}

async fn replay(ledger: &Ledger, input: PathBuf) -> Result<()> {
    let file = File::open(input).into_diagnostic()?;
    let reader = OperationReader::new(file);

    for op in reader.operations() {
        let outcome = match op {
            Ok(Operation::Open {
                owner,
                currency,
                opening_balance,
            }) => ledger
                .open_account(owner, currency, opening_balance)
                .await
                .map(|_| ()),
            Ok(Operation::Transfer(request)) => {
                ledger.validated_transfer(request).await.map(|_| ())
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
                continue;
            }
        };
        if let Err(e) = outcome {
            eprintln!("Error processing operation: {}", e);
        }
    }

    let accounts = all_accounts(ledger).await?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(&accounts).into_diagnostic()?;
    Ok(())
}

async fn all_accounts(ledger: &Ledger) -> Result<Vec<Account>> {
    let mut accounts = Vec::new();
    loop {
        let page = ledger
            .list_accounts(REPLAY_PAGE, accounts.len() as i64)
            .await
            .into_diagnostic()?;
        let done = (page.len() as i64) < REPLAY_PAGE;
        accounts.extend(page);
        if done {
            return Ok(accounts);
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).into_diagnostic()?;
    writeln!(out).into_diagnostic()?;
    Ok(())
}
