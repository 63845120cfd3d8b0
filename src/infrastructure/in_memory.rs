use super::lock_manager::{LockEvent, LockManager, LockOutcome};
use crate::domain::ListParams;
use crate::domain::account::{
    Account, AddAccountBalanceParams, CreateAccountParams, UpdateAccountParams,
};
use crate::domain::entry::{CreateEntryParams, Entry, UpdateEntryParams};
use crate::domain::ports::{LedgerStore, Queries, StoreTx};
use crate::domain::transfer::{
    CreateTransferParams, ListTransfersBetweenAccountsParams, Transfer,
    UpdateTransferAmountParams,
};
use crate::error::{LedgerError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
    account_seq: i64,
    entry_seq: i64,
    transfer_seq: i64,
}

struct Inner {
    tables: RwLock<Tables>,
    locks: LockManager,
    next_txn_id: AtomicU64,
    fail_next_rollback: AtomicBool,
}

/// A thread-safe, deterministic in-memory ledger store.
///
/// Behaves like a row-locking SQL store: writes are staged per transaction
/// and published on commit, and account rows are locked exclusively until
/// the owning transaction ends. Recent lock acquisitions are recorded so
/// tests can check the order in which a transaction took its locks.
///
/// `Clone` shares the underlying tables.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(Tables::default()),
                locks: LockManager::new(lock_timeout),
                next_txn_id: AtomicU64::new(0),
                fail_next_rollback: AtomicBool::new(false),
            }),
        }
    }

    /// Recent row locks in acquisition order, across all transactions.
    pub fn lock_history(&self) -> Vec<LockEvent> {
        self.inner.locks.history()
    }

    /// Makes the next explicit rollback report a failure. Staged writes are
    /// still discarded; only the outcome reported to the caller changes.
    pub fn fail_next_rollback(&self) {
        self.inner.fail_next_rollback.store(true, Ordering::SeqCst);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    fn open_tx(&self, cancel: Option<CancellationToken>) -> Box<dyn StoreTx + '_> {
        let id = self.inner.next_txn_id.fetch_add(1, Ordering::Relaxed) + 1;
        Box::new(InMemoryTx {
            inner: &self.inner,
            id,
            cancel,
            accounts: BTreeMap::new(),
            entries: BTreeMap::new(),
            transfers: BTreeMap::new(),
        })
    }
}

impl LedgerStore for InMemoryStore {
    fn begin(&self) -> Result<Box<dyn StoreTx + '_>> {
        Ok(self.open_tx(None))
    }

    fn begin_cancellable(&self, cancel: &CancellationToken) -> Result<Box<dyn StoreTx + '_>> {
        Ok(self.open_tx(Some(cancel.clone())))
    }
}

/// Staged rows: `Some` is an upsert, `None` a delete.
type Staged<T> = BTreeMap<i64, Option<T>>;

fn read_row<T: Clone>(committed: &BTreeMap<i64, T>, staged: &Staged<T>, id: i64) -> Option<T> {
    match staged.get(&id) {
        Some(row) => row.clone(),
        None => committed.get(&id).cloned(),
    }
}

fn merged_rows<T: Clone>(committed: &BTreeMap<i64, T>, staged: &Staged<T>) -> Vec<T> {
    let mut rows = committed.clone();
    for (id, row) in staged {
        match row {
            Some(row) => rows.insert(*id, row.clone()),
            None => rows.remove(id),
        };
    }
    rows.into_values().collect()
}

fn publish<T>(committed: &mut BTreeMap<i64, T>, staged: Staged<T>) {
    for (id, row) in staged {
        match row {
            Some(row) => committed.insert(id, row),
            None => committed.remove(&id),
        };
    }
}

struct InMemoryTx<'a> {
    inner: &'a Inner,
    id: u64,
    /// Interrupts row lock waits when cancelled.
    cancel: Option<CancellationToken>,
    accounts: Staged<Account>,
    entries: Staged<Entry>,
    transfers: Staged<Transfer>,
}

impl InMemoryTx<'_> {
    fn lock_account_row(&mut self, account_id: i64) -> Result<()> {
        match self.inner.locks.acquire(self.id, account_id, self.cancel.as_ref()) {
            LockOutcome::Acquired => Ok(()),
            LockOutcome::Cancelled => Err(LedgerError::Cancelled),
            LockOutcome::TimedOut => Err(LedgerError::Conflict(format!(
                "lock wait on account {} exceeded {:?}",
                account_id,
                self.inner.locks.timeout()
            ))),
        }
    }

    fn account(&self, id: i64) -> Result<Account> {
        let tables = self.inner.tables.read();
        read_row(&tables.accounts, &self.accounts, id)
            .ok_or_else(|| LedgerError::not_found("account", id))
    }

    fn entry(&self, id: i64) -> Result<Entry> {
        let tables = self.inner.tables.read();
        read_row(&tables.entries, &self.entries, id)
            .ok_or_else(|| LedgerError::not_found("entry", id))
    }

    fn transfer(&self, id: i64) -> Result<Transfer> {
        let tables = self.inner.tables.read();
        read_row(&tables.transfers, &self.transfers, id)
            .ok_or_else(|| LedgerError::not_found("transfer", id))
    }

    fn all_entries(&self) -> Vec<Entry> {
        merged_rows(&self.inner.tables.read().entries, &self.entries)
    }

    fn all_transfers(&self) -> Vec<Transfer> {
        merged_rows(&self.inner.tables.read().transfers, &self.transfers)
    }
}

impl Queries for InMemoryTx<'_> {
    fn create_account(&mut self, params: CreateAccountParams) -> Result<Account> {
        let id = {
            let mut tables = self.inner.tables.write();
            tables.account_seq += 1;
            tables.account_seq
        };
        let account = Account::new(id, params);
        self.accounts.insert(id, Some(account.clone()));
        Ok(account)
    }

    fn get_account(&mut self, id: i64) -> Result<Account> {
        self.account(id)
    }

    fn get_account_for_update(&mut self, id: i64) -> Result<Account> {
        self.lock_account_row(id)?;
        self.account(id)
    }

    fn list_accounts(&mut self, params: ListParams) -> Result<Vec<Account>> {
        let rows = merged_rows(&self.inner.tables.read().accounts, &self.accounts);
        params.page(rows)
    }

    fn update_account(&mut self, params: UpdateAccountParams) -> Result<Account> {
        self.lock_account_row(params.id)?;
        let mut account = self.account(params.id)?;
        account.balance = params.balance;
        self.accounts.insert(account.id, Some(account.clone()));
        Ok(account)
    }

    fn add_account_balance(&mut self, params: AddAccountBalanceParams) -> Result<Account> {
        self.lock_account_row(params.account_id)?;
        let mut account = self.account(params.account_id)?;
        account.apply_delta(params.amount)?;
        self.accounts.insert(account.id, Some(account.clone()));
        Ok(account)
    }

    fn delete_account(&mut self, id: i64) -> Result<()> {
        self.lock_account_row(id)?;
        self.account(id)?;
        self.accounts.insert(id, None);
        Ok(())
    }

    fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry> {
        let id = {
            let mut tables = self.inner.tables.write();
            tables.entry_seq += 1;
            tables.entry_seq
        };
        let entry = Entry::new(id, params);
        self.entries.insert(id, Some(entry.clone()));
        Ok(entry)
    }

    fn get_entry(&mut self, id: i64) -> Result<Entry> {
        self.entry(id)
    }

    fn list_entries(&mut self, params: ListParams) -> Result<Vec<Entry>> {
        params.page(self.all_entries())
    }

    fn list_entries_by_account(&mut self, account_id: i64) -> Result<Vec<Entry>> {
        Ok(self
            .all_entries()
            .into_iter()
            .filter(|entry| entry.account_id == account_id)
            .collect())
    }

    fn update_entry(&mut self, params: UpdateEntryParams) -> Result<Entry> {
        let mut entry = self.entry(params.id)?;
        entry.amount = params.amount;
        self.entries.insert(entry.id, Some(entry.clone()));
        Ok(entry)
    }

    fn delete_entry(&mut self, id: i64) -> Result<()> {
        self.entry(id)?;
        self.entries.insert(id, None);
        Ok(())
    }

    fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer> {
        let id = {
            let mut tables = self.inner.tables.write();
            tables.transfer_seq += 1;
            tables.transfer_seq
        };
        let transfer = Transfer::new(id, params);
        self.transfers.insert(id, Some(transfer.clone()));
        Ok(transfer)
    }

    fn get_transfer(&mut self, id: i64) -> Result<Transfer> {
        self.transfer(id)
    }

    fn list_transfers(&mut self, params: ListParams) -> Result<Vec<Transfer>> {
        params.page(self.all_transfers())
    }

    fn list_transfers_between_accounts(
        &mut self,
        params: ListTransfersBetweenAccountsParams,
    ) -> Result<Vec<Transfer>> {
        Ok(self
            .all_transfers()
            .into_iter()
            .filter(|t| {
                t.from_account_id == params.from_account_id
                    && t.to_account_id == params.to_account_id
            })
            .collect())
    }

    fn list_transfers_by_account(&mut self, account_id: i64) -> Result<Vec<Transfer>> {
        Ok(self
            .all_transfers()
            .into_iter()
            .filter(|t| t.involves(account_id))
            .collect())
    }

    fn update_transfer_amount(&mut self, params: UpdateTransferAmountParams) -> Result<()> {
        let mut transfer = self.transfer(params.id)?;
        transfer.amount = params.amount;
        self.transfers.insert(transfer.id, Some(transfer));
        Ok(())
    }

    fn delete_transfer(&mut self, id: i64) -> Result<()> {
        self.transfer(id)?;
        self.transfers.insert(id, None);
        Ok(())
    }
}

impl StoreTx for InMemoryTx<'_> {
    fn commit(mut self: Box<Self>) -> Result<()> {
        let inner = self.inner;
        let mut tables = inner.tables.write();
        publish(&mut tables.accounts, std::mem::take(&mut self.accounts));
        publish(&mut tables.entries, std::mem::take(&mut self.entries));
        publish(&mut tables.transfers, std::mem::take(&mut self.transfers));
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        if self.inner.fail_next_rollback.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Transaction(format!(
                "rollback of transaction {} failed",
                self.id
            )));
        }
        Ok(())
    }
}

impl Drop for InMemoryTx<'_> {
    fn drop(&mut self) {
        self.inner.locks.release_all(self.id);
    }
}
