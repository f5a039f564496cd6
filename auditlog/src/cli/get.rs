//! get subcommand
//!
//! Prints one log record by identity.

use clap::Args;

use super::{print_json, report};
use crate::logstore::LogStore;

/// Arguments for the get subcommand
#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    /// Identity of the record
    pub identity: i64,
}

/// Execute the get command
pub async fn execute(store: &LogStore, args: &GetArgs) -> Result<(), anyhow::Error> {
    let record = store.get_by_id(args.identity).await.map_err(report)?;
    print_json(&record)
}
