//! A transactional double-entry ledger.
//!
//! Money moves between accounts only through [`application::transfer_tx`],
//! which records a transfer, a debit entry and a credit entry, and adjusts
//! both balances in one store transaction.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod telemetry;
