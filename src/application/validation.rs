//! Business checks a caller runs before asking for a transfer.
//!
//! These use plain reads, so they can pass and still lose a race against a
//! concurrent transfer; the transfer itself stays atomic either way.

use crate::domain::ports::Queries;
use crate::domain::{Account, Currency, TransferTxParams};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub currency: Currency,
}

impl TransferRequest {
    pub fn params(&self) -> TransferTxParams {
        TransferTxParams {
            from_account_id: self.from_account_id,
            to_account_id: self.to_account_id,
            amount: self.amount,
        }
    }
}

/// Checks the source account (exists, holds `req.currency`, covers the
/// amount), then the destination (exists, holds `req.currency`).
pub fn validate_transfer(q: &mut dyn Queries, req: &TransferRequest) -> Result<()> {
    let from = valid_account(q, req.from_account_id, req.currency)?;
    if from.balance < req.amount {
        return Err(LedgerError::Validation(format!(
            "account [{}] balance {} is less than request amount {}",
            from.id, from.balance, req.amount
        )));
    }

    valid_account(q, req.to_account_id, req.currency)?;
    Ok(())
}

fn valid_account(q: &mut dyn Queries, id: i64, currency: Currency) -> Result<Account> {
    let account = q.get_account(id)?;
    if account.currency != currency {
        return Err(LedgerError::Validation(format!(
            "account [{}] currency {} does not match request currency {}",
            account.id, account.currency, currency
        )));
    }
    Ok(account)
}
