use crate::config::StoreConfig;
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
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, SingleThreaded, TransactionDB,
    TransactionDBOptions, TransactionOptions, WriteOptions,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;

/// Column Family for account rows.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for ledger entries.
pub const CF_ENTRIES: &str = "entries";
/// Column Family for transfers.
pub const CF_TRANSFERS: &str = "transfers";

struct Inner {
    db: TransactionDB<SingleThreaded>,
    account_seq: AtomicI64,
    entry_seq: AtomicI64,
    transfer_seq: AtomicI64,
    lock_timeout_ms: i64,
    deadlock_detect: bool,
}

/// A persistent, transactional store on RocksDB's pessimistic
/// `TransactionDB`.
///
/// Each table lives in its own Column Family, keyed by the big-endian row
/// id so iteration yields rows in id order. Row locks come from
/// `get_for_update`, held until the transaction commits or rolls back.
/// RocksDB cannot interrupt a `get_for_update` wait, so a cancelled
/// transfer still waits up to the lock timeout for a contended row before
/// it rolls back.
///
/// This struct is thread-safe (`Clone` shares the underlying database).
#[derive(Clone)]
pub struct RocksDBStore {
    inner: Arc<Inner>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures the "accounts", "entries" and "transfers" column families
    /// exist and resumes each id sequence after the highest stored key.
    pub fn open<P: AsRef<Path>>(path: P, config: &StoreConfig) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let lock_timeout_ms = i64::try_from(config.lock_timeout.as_millis()).unwrap_or(i64::MAX);
        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(lock_timeout_ms);

        let descriptors = [CF_ACCOUNTS, CF_ENTRIES, CF_TRANSFERS]
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = TransactionDB::<SingleThreaded>::open_cf_descriptors(
            &opts,
            &txn_db_opts,
            path.as_ref(),
            descriptors,
        )?;

        let account_seq = AtomicI64::new(last_id(&db, CF_ACCOUNTS)?);
        let entry_seq = AtomicI64::new(last_id(&db, CF_ENTRIES)?);
        let transfer_seq = AtomicI64::new(last_id(&db, CF_TRANSFERS)?);

        info!(
            path = %path.as_ref().display(),
            accounts = account_seq.load(Ordering::Relaxed),
            "opened RocksDB ledger store"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                db,
                account_seq,
                entry_seq,
                transfer_seq,
                lock_timeout_ms,
                deadlock_detect: config.deadlock_detect,
            }),
        })
    }
}

fn key(id: i64) -> [u8; 8] {
    id.to_be_bytes()
}

fn decode_key(bytes: &[u8]) -> Result<i64> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        LedgerError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("malformed row key of {} bytes", bytes.len()),
        ))
    })?;
    Ok(i64::from_be_bytes(raw))
}

fn column_family<'a>(db: &'a TransactionDB<SingleThreaded>, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name).ok_or_else(|| {
        LedgerError::Io(std::io::Error::other(format!(
            "{name} column family not found"
        )))
    })
}

fn last_id(db: &TransactionDB<SingleThreaded>, cf_name: &str) -> Result<i64> {
    let cf = column_family(db, cf_name)?;
    match db.iterator_cf(cf, IteratorMode::End).next() {
        Some(item) => {
            let (key, _value) = item?;
            decode_key(&key)
        }
        None => Ok(0),
    }
}

impl LedgerStore for RocksDBStore {
    fn begin(&self) -> Result<Box<dyn StoreTx + '_>> {
        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_lock_timeout(self.inner.lock_timeout_ms);
        txn_opts.set_deadlock_detect(self.inner.deadlock_detect);
        let txn = self
            .inner
            .db
            .transaction_opt(&WriteOptions::default(), &txn_opts);
        Ok(Box::new(RocksTx {
            inner: &self.inner,
            txn,
        }))
    }
}

struct RocksTx<'a> {
    inner: &'a Inner,
    txn: rocksdb::Transaction<'a, TransactionDB<SingleThreaded>>,
}

impl RocksTx<'_> {
    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        column_family(&self.inner.db, name)
    }

    fn get_row<T: DeserializeOwned>(&self, cf_name: &str, id: i64) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.txn.get_cf(cf, key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads the row and takes its exclusive lock for the rest of the
    /// transaction.
    fn get_row_for_update<T: DeserializeOwned>(&self, cf_name: &str, id: i64) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.txn.get_for_update_cf(cf, key(id), true)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_row<T: Serialize>(&self, cf_name: &str, id: i64, row: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let value = serde_json::to_vec(row)?;
        self.txn.put_cf(cf, key(id), value)?;
        Ok(())
    }

    fn delete_row(&self, cf_name: &str, id: i64) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.txn.delete_cf(cf, key(id))?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self.txn.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn locked_account(&self, id: i64) -> Result<Account> {
        self.get_row_for_update(CF_ACCOUNTS, id)?
            .ok_or_else(|| LedgerError::not_found("account", id))
    }
}

impl Queries for RocksTx<'_> {
    fn create_account(&mut self, params: CreateAccountParams) -> Result<Account> {
        let id = self.inner.account_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let account = Account::new(id, params);
        self.put_row(CF_ACCOUNTS, id, &account)?;
        Ok(account)
    }

    fn get_account(&mut self, id: i64) -> Result<Account> {
        self.get_row(CF_ACCOUNTS, id)?
            .ok_or_else(|| LedgerError::not_found("account", id))
    }

    fn get_account_for_update(&mut self, id: i64) -> Result<Account> {
        self.locked_account(id)
    }

    fn list_accounts(&mut self, params: ListParams) -> Result<Vec<Account>> {
        params.page(self.scan::<Account>(CF_ACCOUNTS)?)
    }

    fn update_account(&mut self, params: UpdateAccountParams) -> Result<Account> {
        let mut account = self.locked_account(params.id)?;
        account.balance = params.balance;
        self.put_row(CF_ACCOUNTS, account.id, &account)?;
        Ok(account)
    }

    fn add_account_balance(&mut self, params: AddAccountBalanceParams) -> Result<Account> {
        let mut account = self.locked_account(params.account_id)?;
        account.apply_delta(params.amount)?;
        self.put_row(CF_ACCOUNTS, account.id, &account)?;
        Ok(account)
    }

    fn delete_account(&mut self, id: i64) -> Result<()> {
        self.locked_account(id)?;
        self.delete_row(CF_ACCOUNTS, id)
    }

    fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry> {
        let id = self.inner.entry_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = Entry::new(id, params);
        self.put_row(CF_ENTRIES, id, &entry)?;
        Ok(entry)
    }

    fn get_entry(&mut self, id: i64) -> Result<Entry> {
        self.get_row(CF_ENTRIES, id)?
            .ok_or_else(|| LedgerError::not_found("entry", id))
    }

    fn list_entries(&mut self, params: ListParams) -> Result<Vec<Entry>> {
        params.page(self.scan::<Entry>(CF_ENTRIES)?)
    }

    fn list_entries_by_account(&mut self, account_id: i64) -> Result<Vec<Entry>> {
        Ok(self
            .scan::<Entry>(CF_ENTRIES)?
            .into_iter()
            .filter(|entry| entry.account_id == account_id)
            .collect())
    }

    fn update_entry(&mut self, params: UpdateEntryParams) -> Result<Entry> {
        let mut entry: Entry = self
            .get_row_for_update(CF_ENTRIES, params.id)?
            .ok_or_else(|| LedgerError::not_found("entry", params.id))?;
        entry.amount = params.amount;
        self.put_row(CF_ENTRIES, entry.id, &entry)?;
        Ok(entry)
    }

    fn delete_entry(&mut self, id: i64) -> Result<()> {
        self.get_entry(id)?;
        self.delete_row(CF_ENTRIES, id)
    }

    fn create_transfer(&mut self, params: CreateTransferParams) -> Result<Transfer> {
        let id = self.inner.transfer_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let transfer = Transfer::new(id, params);
        self.put_row(CF_TRANSFERS, id, &transfer)?;
        Ok(transfer)
    }

    fn get_transfer(&mut self, id: i64) -> Result<Transfer> {
        self.get_row(CF_TRANSFERS, id)?
            .ok_or_else(|| LedgerError::not_found("transfer", id))
    }

    fn list_transfers(&mut self, params: ListParams) -> Result<Vec<Transfer>> {
        params.page(self.scan::<Transfer>(CF_TRANSFERS)?)
    }

    fn list_transfers_between_accounts(
        &mut self,
        params: ListTransfersBetweenAccountsParams,
    ) -> Result<Vec<Transfer>> {
        Ok(self
            .scan::<Transfer>(CF_TRANSFERS)?
            .into_iter()
            .filter(|t| {
                t.from_account_id == params.from_account_id
                    && t.to_account_id == params.to_account_id
            })
            .collect())
    }

    fn list_transfers_by_account(&mut self, account_id: i64) -> Result<Vec<Transfer>> {
        Ok(self
            .scan::<Transfer>(CF_TRANSFERS)?
            .into_iter()
            .filter(|t| t.involves(account_id))
            .collect())
    }

    fn update_transfer_amount(&mut self, params: UpdateTransferAmountParams) -> Result<()> {
        let mut transfer: Transfer = self
            .get_row_for_update(CF_TRANSFERS, params.id)?
            .ok_or_else(|| LedgerError::not_found("transfer", params.id))?;
        transfer.amount = params.amount;
        self.put_row(CF_TRANSFERS, transfer.id, &transfer)
    }

    fn delete_transfer(&mut self, id: i64) -> Result<()> {
        self.get_transfer(id)?;
        self.delete_row(CF_TRANSFERS, id)
    }
}

impl StoreTx for RocksTx<'_> {
    fn commit(self: Box<Self>) -> Result<()> {
        let RocksTx { txn, .. } = *self;
        txn.commit()?;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        self.txn.rollback()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;
    use std::time::Duration;
    use tempfile::tempdir;

    fn config() -> StoreConfig {
        StoreConfig {
            lock_timeout: Duration::from_millis(100),
            ..StoreConfig::default()
        }
    }

    #[test]
    fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path(), &config()).expect("Failed to open RocksDB");

        assert!(store.inner.db.cf_handle(CF_ACCOUNTS).is_some());
        assert!(store.inner.db.cf_handle(CF_ENTRIES).is_some());
        assert!(store.inner.db.cf_handle(CF_TRANSFERS).is_some());
    }

    #[test]
    fn test_rocksdb_sequences_resume_after_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDBStore::open(dir.path(), &config()).unwrap();
            let mut tx = store.begin().unwrap();
            tx.create_account(CreateAccountParams::open("alice", Currency::Usd))
                .unwrap();
            tx.create_account(CreateAccountParams::open("bob", Currency::Usd))
                .unwrap();
            tx.commit().unwrap();
        }

        let store = RocksDBStore::open(dir.path(), &config()).unwrap();
        let mut tx = store.begin().unwrap();
        let carol = tx
            .create_account(CreateAccountParams::open("carol", Currency::Usd))
            .unwrap();
        assert_eq!(carol.id, 3);
        assert_eq!(tx.get_account(1).unwrap().owner, "alice");
    }

    #[test]
    fn test_rocksdb_row_lock_conflict() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path(), &config()).unwrap();

        let mut setup = store.begin().unwrap();
        let account = setup
            .create_account(CreateAccountParams::open("alice", Currency::Usd))
            .unwrap();
        setup.commit().unwrap();

        let mut first = store.begin().unwrap();
        first.get_account_for_update(account.id).unwrap();

        let mut second = store.begin().unwrap();
        let result = second.add_account_balance(AddAccountBalanceParams {
            account_id: account.id,
            amount: 10,
        });
        assert!(matches!(result, Err(LedgerError::Conflict(_))));
    }

    #[test]
    fn test_rocksdb_rollback_discards_writes() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path(), &config()).unwrap();

        let mut tx = store.begin().unwrap();
        tx.create_account(CreateAccountParams::open("alice", Currency::Eur))
            .unwrap();
        tx.rollback().unwrap();

        let mut tx = store.begin().unwrap();
        assert!(tx.list_accounts(ListParams::new(10, 0)).unwrap().is_empty());
    }
}
