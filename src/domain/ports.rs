use super::ListParams;
use super::account::{Account, AddAccountBalanceParams, CreateAccountParams, UpdateAccountParams};
use super::entry::{CreateEntryParams, Entry, UpdateEntryParams};
use super::transfer::{
    CreateTransferParams, ListTransfersBetweenAccountsParams, Transfer,
    UpdateTransferAmountParams,
};
use crate::error::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Row-level operations available inside one store transaction.
///
/// Implementations are blocking: waiting on a row lock parks the calling
/// thread, so callers on an async runtime go through the blocking pool.
pub trait Queries {
    // === Accounts ===

    fn create_account(&mut self, params: CreateAccountParams) -> Result<Account>;

    /// Plain read. May be stale by the time the caller acts on it.
    fn get_account(&mut self, id: i64) -> Result<Account>;

    /// Takes the account's row lock (held until the transaction ends) and
    /// returns the row as of that moment.
    fn get_account_for_update(&mut self, id: i64) -> Result<Account>;

    fn list_accounts(&mut self, params: ListParams) -> Result<Vec<Account>>;

    fn update_account(&mut self, params: UpdateAccountParams) -> Result<Account>;

    /// `balance = balance + amount` under the account's row lock, returning
    /// the updated row. The only production path that changes a balance.
    fn add_account_balance(&mut self, params: AddAccountBalanceParams) -> Result<Account>;

    fn delete_account(&mut self, id: i64) -> Result<()>;

    // === Entries ===

    fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry>;

    fn get_entry(&mut self, id: i64) -> Result<Entry>;

    fn list_entries(&mut self, params: ListParams) -> Result<Vec<Entry>>;

    fn list_entries_by_account(&mut self, account_id: i64) -> Result<Vec<Entry>>;

    fn update_entry(&mut self, params: UpdateEntryParams) -> Result<Entry>;

    fn delete_entry(&mut self, id: i64) -> Result<()>;

    // === Transfers ===

    fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer>;

    fn get_transfer(&mut self, id: i64) -> Result<Transfer>;

    fn list_transfers(&mut self, params: ListParams) -> Result<Vec<Transfer>>;

    fn list_transfers_between_accounts(
        &mut self,
        params: ListTransfersBetweenAccountsParams,
    ) -> Result<Vec<Transfer>>;

    /// Transfers where the account is on either side.
    fn list_transfers_by_account(&mut self, account_id: i64) -> Result<Vec<Transfer>>;

    fn update_transfer_amount(&mut self, params: UpdateTransferAmountParams) -> Result<()>;

    fn delete_transfer(&mut self, id: i64) -> Result<()>;
}

/// An open store transaction.
///
/// Dropping it without calling [`commit`](StoreTx::commit) rolls it back and
/// releases every row lock it holds, including while unwinding a panic.
pub trait StoreTx: Queries {
    fn commit(self: Box<Self>) -> Result<()>;

    fn rollback(self: Box<Self>) -> Result<()>;
}

/// A transactional ledger store.
pub trait LedgerStore: Send + Sync {
    fn begin(&self) -> Result<Box<dyn StoreTx + '_>>;

    /// Like [`begin`](LedgerStore::begin), but a row lock wait inside the
    /// transaction fails with [`LedgerError::Cancelled`] once `cancel` fires.
    ///
    /// The default ignores the token. Stores whose engine cannot interrupt a
    /// lock wait keep it, and their waits stay bounded by the lock timeout.
    ///
    /// [`LedgerError::Cancelled`]: crate::error::LedgerError::Cancelled
    fn begin_cancellable(&self, cancel: &CancellationToken) -> Result<Box<dyn StoreTx + '_>> {
        let _ = cancel;
        self.begin()
    }
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
