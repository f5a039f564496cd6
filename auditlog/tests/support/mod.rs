//! テスト共通ヘルパー

#![allow(dead_code)]

use std::sync::Arc;

use auditlog::db::{MemoryStore, SqliteStore};
use auditlog::{FieldMap, LogStore};

/// `(key, value)` の配列からフィールドマップを作る
pub fn fields(pairs: &[(&str, &str)]) -> FieldMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// インメモリバックエンドのログストア
pub fn memory_log_store() -> (MemoryStore, LogStore) {
    let memory = MemoryStore::new();
    let store = LogStore::new(Arc::new(memory.clone()));
    (memory, store)
}

/// `sqlite::memory:` バックエンドのログストア
pub async fn sqlite_log_store() -> LogStore {
    let backend = SqliteStore::connect("sqlite::memory:", 1)
        .await
        .expect("connect in-memory sqlite");
    LogStore::new(Arc::new(backend))
}
