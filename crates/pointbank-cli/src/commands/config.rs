use clap::Subcommand;
use pointbank_core::storage::data_dir;
use pointbank_core::Config;
use serde_json::json;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value
    Get {
        /// Dotted key, e.g. "remote.base_url" or "calendar.utc_offset_minutes"
        key: String,
    },
    /// Change one value and save
    Set {
        key: String,
        value: String,
    },
    /// Show the resolved config, where it lives and whether sync is on
    #[command(alias = "list")]
    Show,
    /// Restore defaults
    Reset {
        /// Keep the remote section (endpoint and key)
        #[arg(long)]
        keep_remote: bool,
    },
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config
                .get(&key)
                .ok_or_else(|| format!("unknown key: {key}"))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("ok");
        }
        ConfigAction::Show => {
            let config = Config::load()?;
            let remote = &config.remote;
            let summary = json!({
                "data_dir": data_dir()?,
                "config_file": Config::path()?,
                "sync": if remote.is_usable() { "hybrid" } else { "disabled" },
                "remote": {
                    "enabled": remote.enabled,
                    "base_url": remote.base_url,
                    "api_key_set": !remote.api_key.is_empty(),
                    "timeout_secs": remote.timeout_secs,
                },
                "calendar": config.calendar,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        ConfigAction::Reset { keep_remote } => {
            let mut fresh = Config::default();
            if keep_remote {
                fresh.remote = Config::load_or_default().remote;
            }
            fresh.save()?;
            println!("{}", json!({ "reset": Config::path()?, "kept_remote": keep_remote }));
        }
    }
    Ok(())
}
