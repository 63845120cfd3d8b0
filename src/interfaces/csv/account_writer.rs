use crate::domain::{Account, Currency};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRow<'a> {
    id: i64,
    owner: &'a str,
    balance: i64,
    currency: Currency,
}

/// Writes account snapshots as CSV: `id,owner,balance,currency`.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts<'a>(&mut self, accounts: impl IntoIterator<Item = &'a Account>) -> Result<()> {
        for account in accounts {
            self.writer.serialize(AccountRow {
                id: account.id,
                owner: &account.owner,
                balance: account.balance,
                currency: account.currency,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_writes_header_and_rows() {
        let accounts = vec![
            Account {
                id: 1,
                owner: "alice".to_string(),
                balance: 60,
                currency: Currency::Usd,
                created_at: Utc::now(),
            },
            Account {
                id: 2,
                owner: "bob".to_string(),
                balance: 40,
                currency: Currency::Usd,
                created_at: Utc::now(),
            },
        ];

        let mut out = Vec::new();
        AccountWriter::new(&mut out).write_accounts(&accounts).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "id,owner,balance,currency\n1,alice,60,USD\n2,bob,40,USD\n"
        );
    }
}
