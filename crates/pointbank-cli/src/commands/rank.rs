use clap::Subcommand;
use pointbank_core::Ledger;

#[derive(Subcommand)]
pub enum RankAction {
    /// Show the stored ranks
    Show,
    /// Overwrite ranks without awarding points
    Set {
        #[arg(long)]
        subject: Option<u32>,
        #[arg(long)]
        class: Option<u32>,
        #[arg(long)]
        grade: Option<u32>,
    },
}

pub async fn run(action: RankAction, ledger: &Ledger) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        RankAction::Show => {
            let state = ledger.ranking_state()?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        RankAction::Set {
            subject,
            class,
            grade,
        } => {
            let mut state = ledger.ranking_state()?;
            if let Some(rank) = subject {
                state.subject_rank = rank;
            }
            if let Some(rank) = class {
                state.total_class_rank = rank;
            }
            if let Some(rank) = grade {
                state.total_grade_rank = rank;
            }
            let state = ledger.set_rankings(state).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }
    Ok(())
}
