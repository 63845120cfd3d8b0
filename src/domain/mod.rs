//! Ledger domain: accounts, entries, transfers and the storage ports the
//! application layer is written against.

pub mod account;
pub mod currency;
pub mod entry;
pub mod ports;
pub mod transfer;

pub use account::Account;
pub use currency::Currency;
pub use entry::Entry;
pub use transfer::{Transfer, TransferTxParams, TransferTxResult};

use serde::{Deserialize, Serialize};

/// Page selector for list queries. Rows come back in ascending id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    pub limit: i64,
    pub offset: i64,
}

impl ListParams {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// Applies the page to an already ordered iterator.
    pub fn page<T>(&self, rows: impl IntoIterator<Item = T>) -> crate::error::Result<Vec<T>> {
        if self.limit < 0 || self.offset < 0 {
            return Err(crate::error::LedgerError::ConstraintViolation(format!(
                "limit ({}) and offset ({}) must not be negative",
                self.limit, self.offset
            )));
        }
        Ok(rows
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect())
    }
}
