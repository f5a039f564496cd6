//! query subcommand
//!
//! Prints every log record matching all given fields, core or category-specific.

use clap::Args;

use super::{parse_key_value, print_json, report, to_field_map};
use crate::logstore::LogStore;

/// Arguments for the query subcommand
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Exact-match conditions as key=value
    #[arg(value_parser = parse_key_value)]
    pub conditions: Vec<(String, String)>,
}

/// Execute the query command
pub async fn execute(store: &LogStore, args: &QueryArgs) -> Result<(), anyhow::Error> {
    let records = store
        .query(&to_field_map(&args.conditions))
        .await
        .map_err(report)?;
    print_json(&records)
}
