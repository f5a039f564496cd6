//! Configuration management via environment variables
//!
//! Provides helper functions for reading environment variables with fallback
//! to deprecated variable names with warning logs.

use std::path::PathBuf;

/// Get an environment variable with fallback to a deprecated name
///
/// If the new variable name is set, returns its value.
/// If only the old (deprecated) variable name is set, returns its value
/// and logs a deprecation warning.
///
/// # Example
/// ```
/// use auditlog::config::get_env_with_fallback;
///
/// let url = get_env_with_fallback("AUDITLOG_DATABASE_URL", "DATABASE_URL");
/// ```
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        tracing::warn!(
            "Environment variable '{}' is deprecated, use '{}' instead",
            old_name,
            new_name
        );
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback and default value
pub fn get_env_with_fallback_or(new_name: &str, old_name: &str, default: &str) -> String {
    get_env_with_fallback(new_name, old_name).unwrap_or_else(|| default.to_string())
}

/// `true/1/yes/on` を真として解釈する（それ以外の既知の値は偽、不明な値は`None`）
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// デフォルトのデータベースURL
///
/// `$HOME/.auditlog/auditlog.db`。HOMEが取れない場合はカレントディレクトリ。
pub fn default_database_url() -> String {
    match std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        Ok(home) => format!("sqlite:{}/.auditlog/auditlog.db", home),
        Err(_) => "sqlite:./auditlog.db".to_string(),
    }
}

/// ログストアの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// SQLiteデータベースURL
    pub database_url: String,
    /// 書き込みをプロセス内で直列化するか
    pub serialize_writes: bool,
    /// 接続プールの最大接続数
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            serialize_writes: true,
            max_connections: 5,
        }
    }
}

impl StoreConfig {
    /// 環境変数から読み込む
    ///
    /// - `AUDITLOG_DATABASE_URL`（旧: `DATABASE_URL`）
    /// - `AUDITLOG_SERIALIZE_WRITES`（旧: `SERIALIZE_WRITES`）
    /// - `AUDITLOG_DB_MAX_CONNECTIONS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let database_url = get_env_with_fallback("AUDITLOG_DATABASE_URL", "DATABASE_URL")
            .unwrap_or(defaults.database_url);
        let serialize_writes = get_env_with_fallback("AUDITLOG_SERIALIZE_WRITES", "SERIALIZE_WRITES")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(defaults.serialize_writes);
        let max_connections = std::env::var("AUDITLOG_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(defaults.max_connections)
            .max(1);

        Self {
            database_url,
            serialize_writes,
            max_connections,
        }
    }
}

/// ログ出力の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// tracingのフィルタ（`RUST_LOG`が設定されていればそちらが優先）
    pub level: String,
    /// 日次ローテーションするログファイルの出力先
    pub directory: Option<PathBuf>,
}

impl LogConfig {
    /// 環境変数から読み込む（`AUDITLOG_LOG_LEVEL`, `AUDITLOG_LOG_DIR`）
    pub fn from_env() -> Self {
        let level = get_env_with_fallback_or("AUDITLOG_LOG_LEVEL", "LOG_LEVEL", "info");
        let directory = std::env::var("AUDITLOG_LOG_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Self { level, directory }
    }
}
