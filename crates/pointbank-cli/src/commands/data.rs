use std::path::PathBuf;

use clap::Subcommand;
use pointbank_core::storage::{export_to_file, import_from_file};
use pointbank_core::Ledger;
use serde_json::json;

#[derive(Subcommand)]
pub enum DataAction {
    /// Write all user-facing entries to a JSON file
    Export { path: PathBuf },
    /// Overwrite entries from a JSON export
    Import { path: PathBuf },
    /// Delete every local entry, queued sync intents included
    Clear {
        /// Required; there is no undo
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(action: DataAction, ledger: &Ledger) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        DataAction::Export { path } => {
            export_to_file(ledger.store(), &path)?;
            println!("{}", json!({ "exported": path }));
        }
        DataAction::Import { path } => {
            let applied = import_from_file(ledger.store(), &path)?;
            println!("{}", json!({ "imported": applied }));
        }
        DataAction::Clear { yes } => {
            if !yes {
                return Err("refusing to clear data without --yes".into());
            }
            ledger.store().clear()?;
            println!("local data cleared");
        }
    }
    Ok(())
}
