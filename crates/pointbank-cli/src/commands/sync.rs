//! Remote sync subcommand.
//!
//! Both actions report `"mode": "disabled"` when no remote is configured.

use clap::Subcommand;
use pointbank_core::Ledger;
use serde_json::json;

#[derive(Subcommand)]
pub enum SyncAction {
    /// Show mode, connectivity and queue depth
    Status,
    /// Drain the queue now
    Run,
}

pub async fn run(action: SyncAction, ledger: &Ledger) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SyncAction::Status => match ledger.sync_status()? {
            Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
            None => println!("{}", json!({ "mode": "disabled" })),
        },
        SyncAction::Run => match ledger.sync_now().await {
            Some(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
            None => println!("{}", json!({ "mode": "disabled" })),
        },
    }
    Ok(())
}
