use super::transfer::transfer_tx;
use super::tx::exec_tx;
use super::validation::{self, TransferRequest};
use crate::domain::account::{AddAccountBalanceParams, CreateAccountParams};
use crate::domain::ports::{LedgerStore, LedgerStoreRef};
use crate::domain::{
    Account, Currency, Entry, ListParams, Transfer, TransferTxParams, TransferTxResult,
};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The operations a request-handling layer needs from the ledger.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Opens an account with a zero balance.
    async fn create_account(&self, owner: String, currency: Currency) -> Result<Account>;

    async fn get_account(&self, id: i64) -> Result<Account>;

    async fn list_accounts(&self, limit: i64, offset: i64) -> Result<Vec<Account>>;

    /// Runs one atomic transfer. Dropping the returned future cancels it.
    async fn transfer_funds(&self, params: TransferTxParams) -> Result<TransferTxResult>;
}

/// Async facade over a [`LedgerStore`].
///
/// Store calls block on row locks, so every operation runs on tokio's
/// blocking pool.
#[derive(Clone)]
pub struct Ledger {
    store: LedgerStoreRef,
}

impl Ledger {
    pub fn new(store: LedgerStoreRef) -> Self {
        Self { store }
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn LedgerStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|err| LedgerError::Transaction(format!("ledger task failed: {err}")))?
    }

    /// Like [`LedgerApi::transfer_funds`], stopping at the next checkpoint
    /// once `cancel` fires.
    pub async fn transfer_funds_with_token(
        &self,
        params: TransferTxParams,
        cancel: CancellationToken,
    ) -> Result<TransferTxResult> {
        self.run(move |store| transfer_tx(store, &params, &cancel)).await
    }

    /// Creates an account and credits `opening_balance` in one transaction.
    pub async fn open_account(
        &self,
        owner: String,
        currency: Currency,
        opening_balance: i64,
    ) -> Result<Account> {
        if opening_balance < 0 {
            return Err(LedgerError::ConstraintViolation(format!(
                "opening balance must not be negative, got {opening_balance}"
            )));
        }
        let account = self
            .run(move |store| {
                exec_tx(store, |q| {
                    let account = q.create_account(CreateAccountParams::open(owner, currency))?;
                    if opening_balance == 0 {
                        return Ok(account);
                    }
                    q.add_account_balance(AddAccountBalanceParams {
                        account_id: account.id,
                        amount: opening_balance,
                    })
                })
            })
            .await?;
        info!(account_id = account.id, balance = account.balance, "account opened");
        Ok(account)
    }

    pub async fn get_transfer(&self, id: i64) -> Result<Transfer> {
        self.run(move |store| exec_tx(store, |q| q.get_transfer(id))).await
    }

    pub async fn get_entry(&self, id: i64) -> Result<Entry> {
        self.run(move |store| exec_tx(store, |q| q.get_entry(id))).await
    }

    pub async fn list_entries_by_account(&self, account_id: i64) -> Result<Vec<Entry>> {
        self.run(move |store| exec_tx(store, |q| q.list_entries_by_account(account_id))).await
    }

    pub async fn list_transfers_by_account(&self, account_id: i64) -> Result<Vec<Transfer>> {
        self.run(move |store| exec_tx(store, |q| q.list_transfers_by_account(account_id))).await
    }

    pub async fn validate_transfer(&self, req: TransferRequest) -> Result<()> {
        self.run(move |store| exec_tx(store, |q| validation::validate_transfer(q, &req))).await
    }

    /// Validates the request, then runs the transfer.
    pub async fn validated_transfer(&self, req: TransferRequest) -> Result<TransferTxResult> {
        self.validate_transfer(req).await?;
        self.transfer_funds(req.params()).await
    }
}

#[async_trait]
impl LedgerApi for Ledger {
    async fn create_account(&self, owner: String, currency: Currency) -> Result<Account> {
        let account = self
            .run(move |store| {
                exec_tx(store, |q| {
                    q.create_account(CreateAccountParams::open(owner, currency))
                })
            })
            .await?;
        info!(account_id = account.id, currency = %account.currency, "account created");
        Ok(account)
    }

    async fn get_account(&self, id: i64) -> Result<Account> {
        self.run(move |store| exec_tx(store, |q| q.get_account(id))).await
    }

    async fn list_accounts(&self, limit: i64, offset: i64) -> Result<Vec<Account>> {
        self.run(move |store| exec_tx(store, |q| q.list_accounts(ListParams::new(limit, offset))))
            .await
    }

    async fn transfer_funds(&self, params: TransferTxParams) -> Result<TransferTxResult> {
        let cancel = CancellationToken::new();
        let _guard = cancel.clone().drop_guard();
        self.transfer_funds_with_token(params, cancel).await
    }
}
