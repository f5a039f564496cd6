//! append subcommand
//!
//! Appends one log record and prints it as JSON.

use clap::Args;

use super::{parse_key_value, print_json, report, to_field_map};
use crate::common::error::StoreResult;
use crate::logstore::{LogStore, LogicalRecord};

/// Arguments for the append subcommand
#[derive(Args, Debug, Clone)]
pub struct AppendArgs {
    /// Fields as key=value (source, category and text are required)
    #[arg(value_parser = parse_key_value, required = true)]
    pub fields: Vec<(String, String)>,
}

/// 追記して論理レコードを返す
pub async fn run(store: &LogStore, args: &AppendArgs) -> StoreResult<LogicalRecord> {
    store.append(&to_field_map(&args.fields)).await
}

/// Execute the append command
pub async fn execute(store: &LogStore, args: &AppendArgs) -> Result<(), anyhow::Error> {
    let record = run(store, args).await.map_err(report)?;
    print_json(&record)
}
