use clap::Subcommand;
use pointbank_core::{Ledger, PointKind, ProgressKind};
use serde_json::json;

#[derive(Subcommand)]
pub enum PointsAction {
    /// Record an award or penalty
    Add {
        /// Kind (handwriting, exam_top5, error_collection, teacher_complaint,
        /// bonus_free_time, special_reward)
        kind: PointKind,
        /// Value; fixed kinds use their default when omitted
        #[arg(long, allow_hyphen_values = true)]
        value: Option<i64>,
        /// Free-text description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Record a rank improvement
    Progress {
        /// Ranking to move (subject, total)
        kind: ProgressKind,
        /// New rank (1 is best)
        rank: u32,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Record an error-practice round
    Practice {
        /// Correctly answered questions
        correct: u32,
        /// Questions practiced
        total: u32,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List point records, newest first
    List {
        /// Only records of this week
        #[arg(short, long)]
        week: Option<u32>,
    },
    /// All-time total
    Total,
    /// Points earned in a week (defaults to the current week)
    Week { week: Option<u32> },
}

pub async fn run(action: PointsAction, ledger: &Ledger) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        PointsAction::Add {
            kind,
            value,
            description,
        } => {
            let record = ledger
                .add_points(kind, value, description.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        PointsAction::Progress {
            kind,
            rank,
            description,
        } => {
            let record = ledger
                .record_progress(kind, rank, description.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        PointsAction::Practice {
            correct,
            total,
            description,
        } => {
            let record = ledger
                .record_error_practice(correct, total, description.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        PointsAction::List { week } => {
            let records: Vec<_> = ledger
                .point_records()
                .await?
                .into_iter()
                .filter(|r| week.map_or(true, |w| r.week_number == w))
                .collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        PointsAction::Total => {
            let total = ledger.total_points().await?;
            println!("{}", json!({ "total_points": total }));
        }
        PointsAction::Week { week } => {
            let week = week.unwrap_or_else(|| ledger.current_week());
            let points = ledger.weekly_points(week).await?;
            println!("{}", json!({ "week": week, "points": points }));
        }
    }
    Ok(())
}
