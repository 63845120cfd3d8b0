//! The atomic transfer protocol.
//!
//! One transfer is one store transaction: the transfer row, a debit entry,
//! a credit entry and the two balance updates commit together or not at
//! all. The balance updates always lock the lower account id first, so two
//! transfers between the same pair of accounts, in either direction, can
//! never wait on each other in a cycle.

use super::tx::exec_tx_cancellable;
use crate::domain::account::{Account, AddAccountBalanceParams};
use crate::domain::entry::CreateEntryParams;
use crate::domain::ports::{LedgerStore, Queries};
use crate::domain::transfer::{CreateTransferParams, TransferTxParams, TransferTxResult};
use crate::error::{LedgerError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Moves `params.amount` from one account to the other.
///
/// Business checks (currencies, sufficient funds) belong to the caller;
/// this only refuses parameters no transfer can be built from. The token is
/// checked before the transaction starts and after every step, and it cuts
/// short a wait on another transaction's row lock where the store allows,
/// so a cancelled call rolls back instead of committing.
#[instrument(
    level = "debug",
    skip(store, cancel),
    fields(from = params.from_account_id, to = params.to_account_id, amount = params.amount)
)]
pub fn transfer_tx(
    store: &dyn LedgerStore,
    params: &TransferTxParams,
    cancel: &CancellationToken,
) -> Result<TransferTxResult> {
    check_params(params)?;
    checkpoint(cancel)?;

    let result = exec_tx_cancellable(store, cancel, |q| {
        let transfer = q.create_transfer(CreateTransferParams {
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
        })?;
        checkpoint(cancel)?;

        let from_entry = q.create_entry(CreateEntryParams {
            account_id: params.from_account_id,
            amount: -params.amount,
        })?;
        checkpoint(cancel)?;

        let to_entry = q.create_entry(CreateEntryParams {
            account_id: params.to_account_id,
            amount: params.amount,
        })?;
        checkpoint(cancel)?;

        let (from_account, to_account) = update_balances(q, params)?;
        checkpoint(cancel)?;

        debug!(transfer_id = transfer.id, "transfer staged");
        Ok(TransferTxResult {
            transfer,
            from_account,
            to_account,
            from_entry,
            to_entry,
        })
    });

    match &result {
        Ok(done) => info!(
            transfer_id = done.transfer.id,
            from_balance = done.from_account.balance,
            to_balance = done.to_account.balance,
            "transfer committed"
        ),
        Err(err) => warn!(error = %err, "transfer rolled back"),
    }
    result
}

/// Applies the debit and the credit, lower account id first.
///
/// Returns `(from_account, to_account)` as they stand after both updates.
fn update_balances(q: &mut dyn Queries, params: &TransferTxParams) -> Result<(Account, Account)> {
    let from_id = params.from_account_id;
    let to_id = params.to_account_id;

    if from_id < to_id {
        add_money(q, from_id, -params.amount, to_id, params.amount)
    } else {
        let (to_account, from_account) =
            add_money(q, to_id, params.amount, from_id, -params.amount)?;
        if from_id == to_id {
            // Both updates hit one row; only the second reflects both.
            return Ok((from_account.clone(), from_account));
        }
        Ok((from_account, to_account))
    }
}

fn add_money(
    q: &mut dyn Queries,
    first_id: i64,
    first_amount: i64,
    second_id: i64,
    second_amount: i64,
) -> Result<(Account, Account)> {
    let first = q.add_account_balance(AddAccountBalanceParams {
        account_id: first_id,
        amount: first_amount,
    })?;
    let second = q.add_account_balance(AddAccountBalanceParams {
        account_id: second_id,
        amount: second_amount,
    })?;
    Ok((first, second))
}

fn check_params(params: &TransferTxParams) -> Result<()> {
    if params.amount <= 0 {
        return Err(LedgerError::ConstraintViolation(format!(
            "transfer amount must be positive, got {}",
            params.amount
        )));
    }
    if params.from_account_id <= 0 || params.to_account_id <= 0 {
        return Err(LedgerError::ConstraintViolation(format!(
            "account ids must be positive, got {} -> {}",
            params.from_account_id, params.to_account_id
        )));
    }
    Ok(())
}

fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(LedgerError::Cancelled)
    } else {
        Ok(())
    }
}
