//! Storage adapters behind the [`LedgerStore`](crate::domain::ports::LedgerStore) port.

pub mod in_memory;
pub mod lock_manager;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;

use crate::config::StoreConfig;
use crate::domain::ports::LedgerStoreRef;
use crate::error::Result;
use std::sync::Arc;

/// Builds the store selected by `config`.
///
/// A `db_path` selects RocksDB; without the `storage-rocksdb` feature the
/// request is reported and the in-memory store is used instead.
pub fn open_store(config: &StoreConfig) -> Result<LedgerStoreRef> {
    match &config.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Arc::new(self::rocksdb::RocksDBStore::open(path, config)?)),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(in_memory::InMemoryStore::with_lock_timeout(
                config.lock_timeout,
            )))
        }
        None => Ok(Arc::new(in_memory::InMemoryStore::with_lock_timeout(
            config.lock_timeout,
        ))),
    }
}
