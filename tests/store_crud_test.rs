//! Row-level store behaviour, run against every available backend.

mod common;

use common::{random_currency, random_money, random_owner};
use txledger::application::exec_tx;
use txledger::domain::account::{
    AddAccountBalanceParams, CreateAccountParams, UpdateAccountParams,
};
use txledger::domain::entry::{CreateEntryParams, UpdateEntryParams};
use txledger::domain::ports::LedgerStore;
use txledger::domain::transfer::{
    CreateTransferParams, ListTransfersBetweenAccountsParams, UpdateTransferAmountParams,
};
use txledger::domain::{Account, ListParams, Transfer};
use txledger::error::LedgerError;
use txledger::infrastructure::in_memory::InMemoryStore;

fn create_random_account(store: &dyn LedgerStore) -> Account {
    let params = CreateAccountParams {
        owner: random_owner(),
        currency: random_currency(),
        balance: random_money(),
    };
    let account = exec_tx(store, |q| q.create_account(params.clone())).unwrap();

    assert_eq!(account.owner, params.owner);
    assert_eq!(account.currency, params.currency);
    assert_eq!(account.balance, params.balance);
    assert!(account.id > 0);
    account
}

fn create_random_transfer(store: &dyn LedgerStore, from: i64, to: i64) -> Transfer {
    let params = CreateTransferParams {
        from_account_id: from,
        to_account_id: to,
        amount: random_money() + 1,
    };
    let transfer = exec_tx(store, |q| q.create_transfer(params)).unwrap();

    assert_eq!(transfer.from_account_id, from);
    assert_eq!(transfer.to_account_id, to);
    assert_eq!(transfer.amount, params.amount);
    assert!(transfer.id > 0);
    transfer
}

fn check_account_crud(store: &dyn LedgerStore) {
    let account = create_random_account(store);
    assert_eq!(exec_tx(store, |q| q.get_account(account.id)).unwrap(), account);

    let updated = exec_tx(store, |q| {
        q.update_account(UpdateAccountParams {
            id: account.id,
            balance: 42,
        })
    })
    .unwrap();
    assert_eq!(updated.balance, 42);
    assert_eq!(updated.created_at, account.created_at);

    let credited = exec_tx(store, |q| {
        q.add_account_balance(AddAccountBalanceParams {
            account_id: account.id,
            amount: -50,
        })
    })
    .unwrap();
    assert_eq!(credited.balance, -8);

    exec_tx(store, |q| q.delete_account(account.id)).unwrap();
    let err = exec_tx(store, |q| q.get_account(account.id)).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "account", .. }));

    let err = exec_tx(store, |q| q.delete_account(account.id)).unwrap_err();
    assert!(err.is_not_found());
}

fn check_account_pagination(store: &dyn LedgerStore) {
    let existing = exec_tx(store, |q| q.list_accounts(ListParams::new(i64::MAX, 0)))
        .unwrap()
        .len() as i64;
    let created: Vec<Account> = (0..10).map(|_| create_random_account(store)).collect();

    let page = exec_tx(store, |q| q.list_accounts(ListParams::new(5, existing + 5))).unwrap();
    assert_eq!(page, created[5..].to_vec());

    let err = exec_tx(store, |q| q.list_accounts(ListParams::new(5, -1))).unwrap_err();
    assert!(matches!(err, LedgerError::ConstraintViolation(_)));
}

fn check_balance_overflow(store: &dyn LedgerStore) {
    let account = create_random_account(store);
    let err = exec_tx(store, |q| {
        q.add_account_balance(AddAccountBalanceParams {
            account_id: account.id,
            amount: i64::MAX,
        })?;
        q.add_account_balance(AddAccountBalanceParams {
            account_id: account.id,
            amount: i64::MAX,
        })
    })
    .unwrap_err();
    assert!(matches!(err, LedgerError::ConstraintViolation(_)));
    assert_eq!(exec_tx(store, |q| q.get_account(account.id)).unwrap(), account);
}

fn check_entry_crud(store: &dyn LedgerStore) {
    let account = create_random_account(store);
    let entry = exec_tx(store, |q| {
        q.create_entry(CreateEntryParams {
            account_id: account.id,
            amount: -15,
        })
    })
    .unwrap();
    assert_eq!(entry.account_id, account.id);
    assert_eq!(entry.amount, -15);
    assert_eq!(exec_tx(store, |q| q.get_entry(entry.id)).unwrap(), entry);

    let updated = exec_tx(store, |q| {
        q.update_entry(UpdateEntryParams {
            id: entry.id,
            amount: 20,
        })
    })
    .unwrap();
    assert_eq!(updated.amount, 20);

    for amount in [1, 2, 3] {
        exec_tx(store, |q| {
            q.create_entry(CreateEntryParams {
                account_id: account.id,
                amount,
            })
        })
        .unwrap();
    }
    let entries = exec_tx(store, |q| q.list_entries_by_account(account.id)).unwrap();
    let amounts: Vec<i64> = entries.iter().map(|e| e.amount).collect();
    assert_eq!(amounts, vec![20, 1, 2, 3]);

    exec_tx(store, |q| q.delete_entry(entry.id)).unwrap();
    let err = exec_tx(store, |q| q.get_entry(entry.id)).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "entry", .. }));
}

fn check_transfer_crud(store: &dyn LedgerStore) {
    let from = create_random_account(store);
    let to = create_random_account(store);
    let transfer = create_random_transfer(store, from.id, to.id);
    assert_eq!(exec_tx(store, |q| q.get_transfer(transfer.id)).unwrap(), transfer);

    exec_tx(store, |q| {
        q.update_transfer_amount(UpdateTransferAmountParams {
            id: transfer.id,
            amount: 7,
        })
    })
    .unwrap();
    assert_eq!(exec_tx(store, |q| q.get_transfer(transfer.id)).unwrap().amount, 7);

    exec_tx(store, |q| q.delete_transfer(transfer.id)).unwrap();
    let err = exec_tx(store, |q| q.get_transfer(transfer.id)).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "transfer", .. }));

    let err = exec_tx(store, |q| {
        q.update_transfer_amount(UpdateTransferAmountParams {
            id: transfer.id,
            amount: 1,
        })
    })
    .unwrap_err();
    assert!(err.is_not_found());
}

fn check_transfer_listing(store: &dyn LedgerStore) {
    let account = create_random_account(store);
    let other = create_random_account(store);
    for _ in 0..5 {
        create_random_transfer(store, account.id, other.id);
        create_random_transfer(store, other.id, account.id);
    }

    let existing = exec_tx(store, |q| q.list_transfers(ListParams::new(i64::MAX, 0)))
        .unwrap()
        .len() as i64;
    let page = exec_tx(store, |q| q.list_transfers(ListParams::new(5, existing - 5))).unwrap();
    assert_eq!(page.len(), 5);
    assert!(page.windows(2).all(|w| w[0].id < w[1].id));

    let between = exec_tx(store, |q| {
        q.list_transfers_between_accounts(ListTransfersBetweenAccountsParams {
            from_account_id: account.id,
            to_account_id: other.id,
        })
    })
    .unwrap();
    assert_eq!(between.len(), 5);
    assert!(
        between
            .iter()
            .all(|t| t.from_account_id == account.id && t.to_account_id == other.id)
    );

    let by_account = exec_tx(store, |q| q.list_transfers_by_account(account.id)).unwrap();
    assert_eq!(by_account.len(), 10);
    assert!(by_account.iter().all(|t| t.involves(account.id)));
}

fn check_rolled_back_ids_are_not_reused(store: &dyn LedgerStore) {
    let account = create_random_account(store);
    let rolled_back = exec_tx(store, |q| -> txledger::error::Result<i64> {
        let entry = q.create_entry(CreateEntryParams {
            account_id: account.id,
            amount: 1,
        })?;
        Err(LedgerError::Validation(format!("abort after entry {}", entry.id)))
    })
    .unwrap_err();
    assert!(matches!(rolled_back, LedgerError::Validation(_)));

    let before = exec_tx(store, |q| q.list_entries_by_account(account.id)).unwrap();
    assert!(before.is_empty());

    let entry = exec_tx(store, |q| {
        q.create_entry(CreateEntryParams {
            account_id: account.id,
            amount: 1,
        })
    })
    .unwrap();
    let err = rolled_back.to_string();
    let aborted_id: i64 = err.rsplit(' ').next().unwrap().parse().unwrap();
    assert!(entry.id > aborted_id);
}

fn run_suite(store: &dyn LedgerStore) {
    check_account_crud(store);
    check_account_pagination(store);
    check_balance_overflow(store);
    check_entry_crud(store);
    check_transfer_crud(store);
    check_transfer_listing(store);
    check_rolled_back_ids_are_not_reused(store);
}

#[test]
fn test_in_memory_store_rows() {
    run_suite(&InMemoryStore::new());
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_store_rows() {
    use txledger::config::StoreConfig;
    use txledger::infrastructure::rocksdb::RocksDBStore;

    let dir = tempfile::tempdir().unwrap();
    let store = RocksDBStore::open(dir.path().join("db"), &StoreConfig::default()).unwrap();
    run_suite(&store);
}
