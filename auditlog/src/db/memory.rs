//! インメモリのリレーショナルストア
//!
//! テストや組み込み用途向け。障害注入（接続不可・特定リレーションへの追記失敗）と
//! オープン中セッション数の計測をサポートする。

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::row::{columns_of, Predicate, Row, Value};
use super::traits::{RelationalSession, RelationalStore};
use crate::common::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct Relation {
    columns: Vec<String>,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct Faults {
    unreachable: AtomicBool,
    failing_relations: RwLock<HashSet<String>>,
}

/// インメモリストア
///
/// Clone可能（内部状態を共有）。
#[derive(Clone, Default)]
pub struct MemoryStore {
    relations: Arc<RwLock<BTreeMap<String, Relation>>>,
    faults: Arc<Faults>,
    open_sessions: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// 空のストアを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 接続不可状態を切り替える（`open()`が`ConnectionFailure`を返す）
    pub fn set_unreachable(&self, unreachable: bool) {
        self.faults.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// 指定リレーションへの追記を`ConnectionFailure`で失敗させる
    pub fn fail_appends_to(&self, relation: &str) {
        write_lock(&self.faults.failing_relations).insert(relation_key(relation));
    }

    /// 追記失敗の注入を解除
    pub fn clear_faults(&self) {
        self.set_unreachable(false);
        write_lock(&self.faults.failing_relations).clear();
    }

    /// 現在オープン中のセッション数
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// リレーションの全行（スナップショット）
    pub fn rows(&self, relation: &str) -> Vec<Row> {
        read_lock(&self.relations)
            .get(&relation_key(relation))
            .map(|r| r.rows.clone())
            .unwrap_or_default()
    }

    /// リレーションのカラム（作成時に固定）
    pub fn columns(&self, relation: &str) -> Option<Vec<String>> {
        read_lock(&self.relations)
            .get(&relation_key(relation))
            .map(|r| r.columns.clone())
    }
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn open(&self) -> StoreResult<Box<dyn RelationalSession>> {
        if self.faults.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionFailure(
                "memory store is unreachable".to_string(),
            ));
        }
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            store: self.clone(),
        }))
    }
}

/// インメモリストアのセッション
pub struct MemorySession {
    store: MemoryStore,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.store.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RelationalSession for MemorySession {
    async fn create_or_append(&mut self, relation: &str, rows: &[Row]) -> StoreResult<()> {
        let key = relation_key(relation);
        if read_lock(&self.store.faults.failing_relations).contains(&key) {
            return Err(StoreError::ConnectionFailure(format!(
                "append to {} failed",
                relation
            )));
        }
        if rows.is_empty() {
            return Ok(());
        }

        let found = columns_of(rows);
        let mut relations = write_lock(&self.store.relations);
        let entry = relations
            .entry(key)
            .or_insert_with(|| Relation {
                columns: found.clone(),
                rows: Vec::new(),
            });
        if entry.columns != found {
            return Err(StoreError::SchemaMismatch {
                relation: relation.to_string(),
                expected: entry.columns.clone(),
                found,
            });
        }
        entry.rows.extend(rows.iter().cloned());
        Ok(())
    }

    async fn scan(&mut self, relation: &str, predicate: &Predicate) -> StoreResult<Vec<Row>> {
        let relations = read_lock(&self.store.relations);
        Ok(relations
            .get(&relation_key(relation))
            .map(|r| {
                r.rows
                    .iter()
                    .filter(|row| predicate.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn relation_exists(&mut self, relation: &str) -> StoreResult<bool> {
        Ok(read_lock(&self.store.relations).contains_key(&relation_key(relation)))
    }

    async fn list_relations(&mut self) -> StoreResult<Vec<String>> {
        Ok(read_lock(&self.store.relations).keys().cloned().collect())
    }

    async fn list_columns(&mut self, relation: Option<&str>) -> StoreResult<BTreeSet<String>> {
        let relations = read_lock(&self.store.relations);
        let columns = match relation {
            Some(name) => relations
                .get(&relation_key(name))
                .map(|r| r.columns.iter().cloned().collect())
                .unwrap_or_default(),
            None => relations
                .values()
                .flat_map(|r| r.columns.iter().cloned())
                .collect(),
        };
        Ok(columns)
    }

    async fn max_of(&mut self, relation: &str, column: &str) -> StoreResult<Option<Value>> {
        let relations = read_lock(&self.store.relations);
        let Some(rel) = relations.get(&relation_key(relation)) else {
            return Ok(None);
        };
        let cells = rel.rows.iter().filter_map(|row| row.get(column));
        let max_int = cells.clone().filter_map(Value::as_i64).max();
        if let Some(n) = max_int {
            return Ok(Some(Value::Integer(n)));
        }
        Ok(cells
            .filter_map(Value::as_str)
            .max()
            .map(|s| Value::Text(s.to_string())))
    }
}

// SQLiteの識別子と同じく、リレーション名はASCIIの大文字小文字を区別しない
fn relation_key(relation: &str) -> String {
    relation.to_ascii_uppercase()
}

// ロック汚染時も内部状態は一貫しているため、そのまま取り出す
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
