//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! 呼び出し側（HTTP層など）は`error_code()`でエラー種別を判別し、
//! 任意のステータスコードへ変換できます。

use thiserror::Error;

/// log store error type
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required core field was not supplied by the caller
    #[error("required field: {0} is missing")]
    MissingRequiredField(String),

    /// A predicate field matches no known column in the store
    #[error("parameter: {0} doesn't exist")]
    UnknownField(String),

    /// Query was issued without any condition
    #[error("query requires at least one condition")]
    EmptyPredicate,

    /// Row columns differ from the columns of an existing relation
    #[error("Schema mismatch on relation {relation}: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        /// リレーション名
        relation: String,
        /// 既存リレーションのカラム
        expected: Vec<String>,
        /// 追加しようとした行のカラム
        found: Vec<String>,
    },

    /// No record with the given identity
    #[error("Not found: log {0}")]
    NotFound(i64),

    /// Backing store is unreachable
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// Category value cannot name a relation
    #[error("Invalid category: {0:?}")]
    InvalidCategory(String),

    /// Two input keys collapse to the same field name
    #[error("Duplicate field: {0}")]
    DuplicateField(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns a stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingRequiredField(_) => "missing_required_field",
            Self::UnknownField(_) => "unknown_field",
            Self::EmptyPredicate => "empty_predicate",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::NotFound(_) => "not_found",
            Self::ConnectionFailure(_) => "connection_failure",
            Self::InvalidCategory(_) => "invalid_category",
            Self::DuplicateField(_) => "duplicate_field",
            Self::Database(_) => "database_error",
            Self::Config(_) => "config_error",
        }
    }

    /// 呼び出し側の入力に起因するエラーかどうか
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingRequiredField(_)
                | Self::UnknownField(_)
                | Self::EmptyPredicate
                | Self::NotFound(_)
                | Self::InvalidCategory(_)
                | Self::DuplicateField(_)
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::ConnectionFailure(err.to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

/// log store Result型
pub type StoreResult<T> = Result<T, StoreError>;
