use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One signed movement on one account: positive is a credit, negative a debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateEntryParams {
    pub account_id: i64,
    pub amount: i64,
}

/// Test-only amendment path; entries are append-only in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateEntryParams {
    pub id: i64,
    pub amount: i64,
}

impl Entry {
    pub(crate) fn new(id: i64, params: CreateEntryParams) -> Self {
        Self {
            id,
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        }
    }
}
