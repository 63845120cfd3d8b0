use crate::application::TransferRequest;
use crate::domain::Currency;
use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Open,
    Transfer,
}

/// One raw CSV row: `type, owner, from, to, amount, currency`.
///
/// Columns a row type does not use may be left empty.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OperationRecord {
    #[serde(rename = "type")]
    pub r#type: OperationType,
    pub owner: Option<String>,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub amount: Option<i64>,
    pub currency: Currency,
}

/// A replayable ledger operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Open an account and credit it with `opening_balance`.
    Open {
        owner: String,
        currency: Currency,
        opening_balance: i64,
    },
    Transfer(TransferRequest),
}

impl TryFrom<OperationRecord> for Operation {
    type Error = LedgerError;

    fn try_from(record: OperationRecord) -> Result<Self> {
        match record.r#type {
            OperationType::Open => {
                let owner = record
                    .owner
                    .filter(|owner| !owner.is_empty())
                    .ok_or_else(|| missing("open", "owner"))?;
                Ok(Operation::Open {
                    owner,
                    currency: record.currency,
                    opening_balance: record.amount.unwrap_or(0),
                })
            }
            OperationType::Transfer => Ok(Operation::Transfer(TransferRequest {
                from_account_id: record.from.ok_or_else(|| missing("transfer", "from"))?,
                to_account_id: record.to.ok_or_else(|| missing("transfer", "to"))?,
                amount: record.amount.ok_or_else(|| missing("transfer", "amount"))?,
                currency: record.currency,
            })),
        }
    }
}

fn missing(kind: &str, column: &str) -> LedgerError {
    LedgerError::Validation(format!("{kind} row is missing `{column}`"))
}

/// Reads ledger operations from a CSV source.
///
/// Whitespace around fields is trimmed and short rows are accepted, so
/// trailing unused columns can be omitted.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily parses rows; a bad row yields an error and reading continues.
    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader
            .into_deserialize::<OperationRecord>()
            .map(|record| Operation::try_from(record?))
    }
}
