//! Repository traitパターン定義
//!
//! バックエンド（SQLite / インメモリ）を抽象化するリレーショナル操作のtrait群。
//! 1回のトップレベル操作につき1つのセッションを開き、
//! セッションのdropで接続が解放される。

use async_trait::async_trait;
use std::collections::BTreeSet;

use super::row::{Predicate, Row, Value};
use crate::common::error::StoreResult;

/// リレーショナルストア（接続の取得元）
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// 接続を取得してセッションを開く
    async fn open(&self) -> StoreResult<Box<dyn RelationalSession>>;
}

/// 接続を保持する操作セッション
#[async_trait]
pub trait RelationalSession: Send {
    /// リレーションが無ければ行のカラムで作成し、行を追記する
    ///
    /// 既存リレーションとカラム集合が異なる場合は`SchemaMismatch`。
    async fn create_or_append(&mut self, relation: &str, rows: &[Row]) -> StoreResult<()>;

    /// 述語に一致する行を取得（リレーションが無ければ空）
    async fn scan(&mut self, relation: &str, predicate: &Predicate) -> StoreResult<Vec<Row>>;

    /// リレーションの存在確認
    async fn relation_exists(&mut self, relation: &str) -> StoreResult<bool>;

    /// 全リレーション名
    async fn list_relations(&mut self) -> StoreResult<Vec<String>>;

    /// カラム名一覧（`None`ならストア全体）
    async fn list_columns(&mut self, relation: Option<&str>) -> StoreResult<BTreeSet<String>>;

    /// カラムの最大値（リレーションが無い・空なら`None`）
    async fn max_of(&mut self, relation: &str, column: &str) -> StoreResult<Option<Value>>;
}
