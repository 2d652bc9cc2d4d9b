use clap::{Parser, Subcommand};
use pointbank_core::{Config, Ledger};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pointbank", version, about = "Pointbank CLI")]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record and inspect points
    Points {
        #[command(subcommand)]
        action: commands::points::PointsAction,
    },
    /// Spend and inspect leisure time
    Time {
        #[command(subcommand)]
        action: commands::time::TimeAction,
    },
    /// Weekly statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Reference rankings
    Rank {
        #[command(subcommand)]
        action: commands::rank::RankAction,
    },
    /// Remote synchronization
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Export, import or wipe local data
    Data {
        #[command(subcommand)]
        action: commands::data::DataAction,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    // Config commands never touch the record store.
    if let Commands::Config { action } = command {
        return commands::config::run(action);
    }

    let config = Config::load_or_default();
    debug!(remote = config.remote.is_usable(), "config loaded");
    let ledger = Ledger::open(&config).await?;
    let result = match command {
        Commands::Points { action } => commands::points::run(action, &ledger).await,
        Commands::Time { action } => commands::time::run(action, &ledger).await,
        Commands::Stats { action } => commands::stats::run(action, &ledger).await,
        Commands::Rank { action } => commands::rank::run(action, &ledger).await,
        Commands::Sync { action } => commands::sync::run(action, &ledger).await,
        Commands::Data { action } => commands::data::run(action, &ledger),
        Commands::Config { action } => commands::config::run(action),
    };
    ledger.shutdown()?;
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
