//! Application layer: the transfer protocol and the service built on it.
//!
//! `transfer` and `tx` are synchronous and work against any
//! [`LedgerStore`](crate::domain::ports::LedgerStore). `ledger` wraps them
//! in an async facade that keeps lock waits off the runtime's worker
//! threads.

pub mod ledger;
pub mod transfer;
pub mod tx;
pub mod validation;

pub use ledger::{Ledger, LedgerApi};
pub use transfer::transfer_tx;
pub use tx::{exec_tx, exec_tx_cancellable};
pub use validation::{TransferRequest, validate_transfer};
