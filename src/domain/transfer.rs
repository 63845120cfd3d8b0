use super::account::Account;
use super::entry::Entry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A movement of a positive `amount` from one account to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListTransfersBetweenAccountsParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateTransferAmountParams {
    pub id: i64,
    pub amount: i64,
}

impl Transfer {
    pub(crate) fn new(id: i64, params: CreateTransferParams) -> Self {
        Self {
            id,
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        }
    }

    pub fn involves(&self, account_id: i64) -> bool {
        self.from_account_id == account_id || self.to_account_id == account_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Everything one transfer wrote, with both accounts as they stood after
/// their balance update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}
