//! list subcommand

use clap::Args;

use super::{print_json, report};
use crate::logstore::LogStore;

/// Arguments for the list subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {}

/// Execute the list command
pub async fn execute(store: &LogStore, _args: &ListArgs) -> Result<(), anyhow::Error> {
    let rows = store.list_all().await.map_err(report)?;
    print_json(&rows)
}
