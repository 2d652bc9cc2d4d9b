use clap::Subcommand;
use pointbank_core::{Ledger, TimeKind};

#[derive(Subcommand)]
pub enum TimeAction {
    /// Spend leisure minutes from this week's allowance
    Use {
        /// game or entertainment
        kind: TimeKind,
        minutes: u32,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List time-usage records, newest first
    List {
        /// Only records falling in this week
        #[arg(short, long)]
        week: Option<u32>,
    },
    /// Minutes left in a week (defaults to the current week)
    Remaining { week: Option<u32> },
}

pub async fn run(action: TimeAction, ledger: &Ledger) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimeAction::Use {
            kind,
            minutes,
            description,
        } => {
            if !ledger.is_usage_day() {
                eprintln!("note: leisure time is normally spent on weekends");
            }
            let record = ledger
                .use_time(kind, minutes, description.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        TimeAction::List { week } => {
            let calendar = ledger.calendar();
            let records: Vec<_> = ledger
                .time_records()
                .await?
                .into_iter()
                .filter(|r| week.map_or(true, |w| calendar.week_number(r.timestamp) == w))
                .collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        TimeAction::Remaining { week } => {
            let week = week.unwrap_or_else(|| ledger.current_week());
            let remaining = ledger.remaining_time(week).await?;
            println!("{}", serde_json::to_string_pretty(&remaining)?);
        }
    }
    Ok(())
}
