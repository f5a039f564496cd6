//! ロギング初期化ユーティリティ
//!
//! 標準エラー出力への整形ログに加え、ディレクトリが設定されていれば
//! 日次ローテーションのファイルにも非同期で書き出す。

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// ログファイル名のプレフィックス
pub const LOG_FILE_PREFIX: &str = "auditlog.log";

/// 非同期ライターのガード（プロセス終了まで保持する）
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// 環境変数の設定でロギングを初期化
pub fn init() -> anyhow::Result<()> {
    init_with(&LogConfig::from_env())
}

/// 指定した設定でロギングを初期化
///
/// 既にグローバルsubscriberが設定されている場合はエラー。
pub fn init_with(config: &LogConfig) -> anyhow::Result<()> {
    let filter = build_filter(&config.level);

    let file_layer = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

/// `RUST_LOG`があればそれを、無ければ`level`を使うフィルタ
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 当日のログファイルパス
pub fn log_file_path(dir: &Path) -> PathBuf {
    let today = chrono::Utc::now().format("%Y-%m-%d");
    dir.join(format!("{}.{}", LOG_FILE_PREFIX, today))
}
