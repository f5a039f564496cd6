//! CLI module for auditlog
//!
//! One-shot commands against a split-schema log store.

pub mod append;
pub mod get;
pub mod list;
pub mod query;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::warn;

use crate::common::error::StoreError;
use crate::config::{parse_bool, StoreConfig};
use crate::db::SqliteStore;
use crate::logstore::{FieldMap, LogStore};

/// Split-schema audit log store
#[derive(Parser, Debug)]
#[command(name = "auditlog")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    AUDITLOG_DATABASE_URL        Database URL (default: sqlite:~/.auditlog/auditlog.db)
    AUDITLOG_SERIALIZE_WRITES    Serialize writers in-process (default: true)
    AUDITLOG_DB_MAX_CONNECTIONS  Connection pool size (default: 5)
    AUDITLOG_LOG_LEVEL           Log level (default: info)
    AUDITLOG_LOG_DIR             Directory for daily log files
"#)]
pub struct Cli {
    /// Store options
    #[command(flatten)]
    pub store: StoreArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Append a log record
    Append(append::AppendArgs),
    /// Show a log record by identity
    Get(get::GetArgs),
    /// Find log records matching all given fields
    Query(query::QueryArgs),
    /// List core fields of every log record
    List(list::ListArgs),
}

/// ストア接続オプション（環境変数より優先）
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Database URL
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Serialize writers in-process (true/false)
    #[arg(long, global = true, value_parser = parse_bool_arg)]
    pub serialize_writes: Option<bool>,
}

impl StoreArgs {
    /// 環境変数の設定にCLI引数を上書きする
    pub fn to_config(&self) -> StoreConfig {
        let mut config = StoreConfig::from_env();
        if let Some(url) = &self.database_url {
            config.database_url = url.clone();
        }
        if let Some(serialize) = self.serialize_writes {
            config.serialize_writes = serialize;
        }
        config
    }

    /// SQLiteに接続してログストアを作成
    pub async fn open(&self) -> anyhow::Result<LogStore> {
        let config = self.to_config();
        let backend = SqliteStore::connect(&config.database_url, config.max_connections).await?;
        Ok(LogStore::with_serialized_writes(
            Arc::new(backend),
            config.serialize_writes,
        ))
    }
}

fn parse_bool_arg(value: &str) -> Result<bool, String> {
    parse_bool(value).ok_or_else(|| format!("invalid boolean: {}", value))
}

/// `key=value` 形式の引数をパースする（最初の`=`で分割）
pub fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", arg)),
    }
}

/// `key=value` のリストをフィールドマップにする（同じキーは後勝ち）
pub fn to_field_map(pairs: &[(String, String)]) -> FieldMap {
    pairs.iter().cloned().collect()
}

/// コマンドを実行する
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = cli.store.open().await?;
    match cli.command {
        Commands::Append(args) => append::execute(&store, &args).await,
        Commands::Get(args) => get::execute(&store, &args).await,
        Commands::Query(args) => query::execute(&store, &args).await,
        Commands::List(args) => list::execute(&store, &args).await,
    }
}

/// 結果をJSONで標準出力に書き出す
pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 入力起因のエラーは警告として記録してから返す
pub(crate) fn report(err: StoreError) -> anyhow::Error {
    if err.is_client_error() {
        warn!(code = err.error_code(), "{}", err);
    }
    err.into()
}
