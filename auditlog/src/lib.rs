//! Split-schema audit log store
//!
//! カテゴリごとに属性が異なる監査ログを、共通のコアリレーションと
//! カテゴリ名のリレーションに分割して保存し、読み取り時に再結合する。

#![warn(missing_docs)]

/// 共通型定義
pub mod common;

/// データベースアクセス
pub mod db;

/// 分割スキーマのログストア
pub mod logstore;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// ロギング初期化ユーティリティ
pub mod logging;

/// CLIインターフェース
pub mod cli;

pub use common::error::{StoreError, StoreResult};
pub use logstore::{FieldMap, LogStore, LogicalRecord};
