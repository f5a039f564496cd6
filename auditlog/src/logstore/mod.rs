//! 分割スキーマのログストア
//!
//! 1件のログをコアリレーション`LOGS`とカテゴリ名のリレーションに分けて保存し、
//! 読み取り時にidentityで再結合する。
//!
//! 呼び出し側に公開する操作は[`LogStore`]の4つ（append / get_by_id / query / list_all）。
//! 各操作は1つのセッションを開き、終了時（エラー時を含む）にdropで接続を解放する。

/// identity採番
pub mod identity;
/// identity単位の行マージ
pub mod merge;
/// クエリプランナー
pub mod planner;
/// スキーマ分割
pub mod splitter;
/// 型定義
pub mod types;
/// 書き込みパス
pub mod writer;

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::common::error::{StoreError, StoreResult};
use crate::db::RelationalStore;
pub use types::{CategoryRow, CoreRow, FieldMap, LogicalRecord, CORE_RELATION};

/// ログストア
///
/// 書き込みの直列化が有効な場合、採番から追記までをプロセス内のロックで保護する
/// （別プロセスからの同時書き込みは保護されない）。
#[derive(Clone)]
pub struct LogStore {
    store: Arc<dyn RelationalStore>,
    write_lock: Option<Arc<Mutex<()>>>,
}

impl LogStore {
    /// 書き込みを直列化するログストアを作成
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self::with_serialized_writes(store, true)
    }

    /// 書き込みの直列化を指定してログストアを作成
    ///
    /// `false`の場合、並行する書き込みが同じidentityを得ることがある。
    pub fn with_serialized_writes(store: Arc<dyn RelationalStore>, serialize: bool) -> Self {
        Self {
            store,
            write_lock: serialize.then(|| Arc::new(Mutex::new(()))),
        }
    }

    /// 書き込みが直列化されているか
    pub fn serializes_writes(&self) -> bool {
        self.write_lock.is_some()
    }

    /// ログを1件追記し、再結合した論理レコードを返す
    ///
    /// 入力の検証はセッションを開く前に行う。
    pub async fn append(&self, fields: &FieldMap) -> StoreResult<LogicalRecord> {
        let fields = splitter::normalize_fields(fields)?;
        splitter::validate(&fields)?;

        let _guard = match &self.write_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };
        let mut session = self.store.open().await?;
        writer::write_record(session.as_mut(), &fields, Utc::now()).await
    }

    /// identityで論理レコードを取得
    pub async fn get_by_id(&self, identity: i64) -> StoreResult<LogicalRecord> {
        let predicate = FieldMap::from([(types::IDENTITY.to_string(), identity.to_string())]);
        self.query(&predicate)
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound(identity))
    }

    /// 述語に一致する論理レコードを取得
    ///
    /// 述語はフィールド名 → 値の完全一致条件のAND。
    pub async fn query(&self, predicate: &FieldMap) -> StoreResult<Vec<LogicalRecord>> {
        // 空述語はセッションを開く前に弾く
        let plan = planner::QueryPlan::new(predicate)?;
        let mut session = self.store.open().await?;
        planner::validate_fields(session.as_mut(), &plan).await?;
        let frame = planner::execute(session.as_mut(), &plan).await?;
        debug!("Query matched {} record(s)", frame.len());
        frame
            .into_rows()
            .iter()
            .map(LogicalRecord::from_merged_row)
            .collect()
    }

    /// コアリレーションの全行（カテゴリ属性は含まない）
    pub async fn list_all(&self) -> StoreResult<Vec<CoreRow>> {
        let mut session = self.store.open().await?;
        planner::scan_core(session.as_mut()).await
    }
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("serialize_writes", &self.serializes_writes())
            .finish_non_exhaustive()
    }
}
