#![allow(dead_code)]

use rand::Rng;
use rand::distributions::Alphanumeric;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use txledger::application::{Ledger, LedgerApi};
use txledger::domain::{Account, Currency};
use txledger::infrastructure::in_memory::InMemoryStore;

pub fn random_owner() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

pub fn random_money() -> i64 {
    rand::thread_rng().gen_range(0..=1000)
}

pub fn random_currency() -> Currency {
    Currency::ALL[rand::thread_rng().gen_range(0..Currency::ALL.len())]
}

pub fn in_memory_ledger() -> (Ledger, InMemoryStore) {
    let store = InMemoryStore::new();
    (Ledger::new(Arc::new(store.clone())), store)
}

/// Opens an account with a random owner and a random opening balance.
pub async fn create_random_account(ledger: &Ledger, currency: Currency) -> Account {
    ledger
        .open_account(random_owner(), currency, random_money())
        .await
        .unwrap()
}

pub async fn funded_account(ledger: &Ledger, balance: i64) -> Account {
    ledger
        .open_account(random_owner(), Currency::Usd, balance)
        .await
        .unwrap()
}

pub async fn balance_of(ledger: &Ledger, id: i64) -> i64 {
    ledger.get_account(id).await.unwrap().balance
}

/// Writes a replay file: `rows` opens, each funded with 100 USD, followed by
/// a chain of 10-unit transfers from every account to the next.
pub fn generate_replay_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["type", "owner", "from", "to", "amount", "currency"])?;
    for i in 1..=rows {
        wtr.write_record(["open", &format!("owner-{i}"), "", "", "100", "USD"])?;
    }
    for i in 1..rows {
        wtr.write_record(["transfer", "", &i.to_string(), &(i + 1).to_string(), "10", "USD"])?;
    }

    wtr.flush()?;
    Ok(())
}
