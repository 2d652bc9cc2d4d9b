use clap::Subcommand;
use pointbank_core::Ledger;
use serde_json::json;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Full statistics for one week (defaults to the current week)
    Week { week: Option<u32> },
    /// Statistics for the most recent weeks, oldest first
    History {
        #[arg(short, long, default_value_t = 4)]
        weeks: u32,
    },
    /// Whether a week and the one before both reached the bonus threshold
    Bonus { week: Option<u32> },
}

pub async fn run(action: StatsAction, ledger: &Ledger) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        StatsAction::Week { week } => {
            let week = week.unwrap_or_else(|| ledger.current_week());
            let stats = ledger.weekly_stats(week).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::History { weeks } => {
            let history = ledger.history(weeks).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        StatsAction::Bonus { week } => {
            let week = week.unwrap_or_else(|| ledger.current_week());
            let bonus = ledger.consecutive_bonus(week).await?;
            println!("{}", json!({ "week": week, "consecutive_bonus": bonus }));
        }
    }
    Ok(())
}
