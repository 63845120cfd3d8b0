use super::currency::Currency;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ledger account.
///
/// `id`, `owner` and `currency` are fixed at creation. `balance` only moves
/// through [`Queries::add_account_balance`](super::ports::Queries::add_account_balance)
/// in the production path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub owner: String,
    pub balance: i64,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAccountParams {
    pub owner: String,
    pub currency: Currency,
    pub balance: i64,
}

impl CreateAccountParams {
    /// Parameters for a freshly opened account (zero balance).
    pub fn open(owner: impl Into<String>, currency: Currency) -> Self {
        Self {
            owner: owner.into(),
            currency,
            balance: 0,
        }
    }
}

/// Overwrites the balance. Only for seeding and tests; transfers never use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateAccountParams {
    pub id: i64,
    pub balance: i64,
}

/// Atomic `balance += amount` on one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddAccountBalanceParams {
    pub account_id: i64,
    pub amount: i64,
}

impl Account {
    pub(crate) fn new(id: i64, params: CreateAccountParams) -> Self {
        Self {
            id,
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        }
    }

    /// Applies a signed delta, refusing to wrap around.
    pub(crate) fn apply_delta(&mut self, amount: i64) -> crate::error::Result<()> {
        self.balance = self.balance.checked_add(amount).ok_or_else(|| {
            crate::error::LedgerError::ConstraintViolation(format!(
                "balance of account {} would overflow ({} + {})",
                self.id, self.balance, amount
            ))
        })?;
        Ok(())
    }
}
