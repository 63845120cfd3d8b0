//! Runtime configuration.
//!
//! Values come from command-line flags with environment-variable fallbacks
//! and are handed to constructors explicitly; nothing here is global.

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Storage backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// RocksDB directory. `None` selects the in-memory store.
    pub db_path: Option<PathBuf>,
    /// Longest a transaction waits for a row lock before failing with a
    /// conflict.
    pub lock_timeout: Duration,
    /// Let RocksDB detect lock cycles instead of waiting out the timeout.
    pub deadlock_detect: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            deadlock_detect: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerConfig {
    pub store: StoreConfig,
    pub log_format: LogFormat,
}

/// Global flags shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "LEDGER_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Row lock wait timeout in milliseconds.
    #[arg(long, env = "LEDGER_LOCK_TIMEOUT_MS", default_value_t = DEFAULT_LOCK_TIMEOUT_MS, global = true)]
    pub lock_timeout_ms: u64,

    /// Disable RocksDB deadlock detection (lock waits then end by timeout).
    #[arg(long, env = "LEDGER_NO_DEADLOCK_DETECT", global = true)]
    pub no_deadlock_detect: bool,

    #[arg(long, env = "LEDGER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,
}

impl From<ConfigArgs> for LedgerConfig {
    fn from(args: ConfigArgs) -> Self {
        Self {
            store: StoreConfig {
                db_path: args.db_path,
                lock_timeout: Duration::from_millis(args.lock_timeout_ms),
                deadlock_detect: !args.no_deadlock_detect,
            },
            log_format: args.log_format,
        }
    }
}
