use crate::domain::ports::{LedgerStore, StoreTx};
use crate::error::{LedgerError, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Executes `f` within one store transaction.
///
/// Commits when `f` succeeds. When it fails the transaction is rolled back
/// and the original error returned; if the rollback fails too, both errors
/// come back together as [`LedgerError::Rollback`]. A panic inside `f`
/// drops the open transaction, which rolls it back.
pub fn exec_tx<T, F>(store: &dyn LedgerStore, f: F) -> Result<T>
where
    F: FnOnce(&mut dyn StoreTx) -> Result<T>,
{
    finish(store.begin()?, f)
}

/// [`exec_tx`] on a transaction whose row lock waits end early once
/// `cancel` fires, on stores that support it.
pub fn exec_tx_cancellable<T, F>(
    store: &dyn LedgerStore,
    cancel: &CancellationToken,
    f: F,
) -> Result<T>
where
    F: FnOnce(&mut dyn StoreTx) -> Result<T>,
{
    finish(store.begin_cancellable(cancel)?, f)
}

fn finish<T, F>(mut tx: Box<dyn StoreTx + '_>, f: F) -> Result<T>
where
    F: FnOnce(&mut dyn StoreTx) -> Result<T>,
{
    match f(&mut *tx) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => match tx.rollback() {
            Ok(()) => Err(err),
            Err(rollback) => {
                warn!(error = %err, rollback_error = %rollback, "rollback failed");
                Err(LedgerError::Rollback {
                    source: Box::new(err),
                    rollback: Box::new(rollback),
                })
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;
    use crate::domain::account::{AddAccountBalanceParams, CreateAccountParams};
    use crate::infrastructure::in_memory::InMemoryStore;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn seeded_store() -> (InMemoryStore, i64) {
        let store = InMemoryStore::new();
        let account = exec_tx(&store, |q| {
            q.create_account(CreateAccountParams {
                owner: "alice".to_string(),
                currency: Currency::Usd,
                balance: 100,
            })
        })
        .unwrap();
        (store, account.id)
    }

    #[test]
    fn test_exec_tx_commits_on_success() {
        let (store, id) = seeded_store();

        exec_tx(&store, |q| {
            q.add_account_balance(AddAccountBalanceParams {
                account_id: id,
                amount: 25,
            })
        })
        .unwrap();

        let account = exec_tx(&store, |q| q.get_account(id)).unwrap();
        assert_eq!(account.balance, 125);
    }

    #[test]
    fn test_exec_tx_rolls_back_on_error() {
        let (store, id) = seeded_store();

        let result: Result<()> = exec_tx(&store, |q| {
            q.add_account_balance(AddAccountBalanceParams {
                account_id: id,
                amount: -40,
            })?;
            Err(LedgerError::ConstraintViolation("boom".to_string()))
        });
        assert!(matches!(result, Err(LedgerError::ConstraintViolation(_))));

        let account = exec_tx(&store, |q| q.get_account(id)).unwrap();
        assert_eq!(account.balance, 100);
    }

    #[test]
    fn test_exec_tx_reports_rollback_failure_with_original_error() {
        let (store, id) = seeded_store();
        store.fail_next_rollback();

        let result: Result<()> = exec_tx(&store, |q| {
            q.add_account_balance(AddAccountBalanceParams {
                account_id: id,
                amount: 5,
            })?;
            q.get_account(999).map(|_| ())
        });

        match result {
            Err(LedgerError::Rollback { source, rollback }) => {
                assert!(source.is_not_found());
                assert!(matches!(*rollback, LedgerError::Transaction(_)));
            }
            other => panic!("expected rollback error, got {other:?}"),
        }

        let account = exec_tx(&store, |q| q.get_account(id)).unwrap();
        assert_eq!(account.balance, 100);
    }

    #[test]
    fn test_exec_tx_panic_releases_locks_and_discards_writes() {
        let (store, id) = seeded_store();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let _: Result<()> = exec_tx(&store, |q| {
                q.add_account_balance(AddAccountBalanceParams {
                    account_id: id,
                    amount: -100,
                })?;
                panic!("unexpected failure mid-transaction");
            });
        }));
        assert!(outcome.is_err());

        let account = exec_tx(&store, |q| q.get_account_for_update(id)).unwrap();
        assert_eq!(account.balance, 100);
    }
}
