// gametourney: score board-game tournaments from the terminal.

mod commands;
mod output;
mod prompt;

use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use gametourney_core::config::{self, Config};
use gametourney_core::db::Database;
use gametourney_core::models::ScoreType;

use crate::commands::Session;
use crate::prompt::Prompter;

const LOG_FILE_NAME: &str = "gametourney.log";
const VERBOSE_FILTER: &str = "gametourney=debug,gametourney_core=debug,warn";

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a tournament, register its players and make it current
    NewTournament,
    /// Choose which stored tournament later commands act on
    SetTournament,
    /// Enter the results of one game and record its metascores
    AddScores,
    /// Show running totals and averages for the current tournament
    Standings,
    /// Dump every recorded score row
    Log {
        /// Write CSV instead of a table
        #[arg(long)]
        csv: bool,
    },
    /// Recompute every recorded metascore from its raw result
    Recalc,
    /// Show the metascore formula of the current tournament
    Formula {
        /// Show the formula for ranked games instead of points games
        #[arg(long)]
        rank: bool,
        /// Game length the duration multiplier is scaled by
        #[arg(long, default_value_t = 1.0)]
        hours: f64,
    },
}

#[derive(Parser, Debug)]
#[command(name = "gametourney")]
#[command(about = "Tournament metascores for games scored by points or by rank", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config =
        config::load_config(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config, cli.verbose)?;
    info!(command = ?cli.command, data_dir = %config.data_dir.display(), "gametourney starting");

    let db = Database::open(config.db_path()).context("failed to open database")?;

    let stdin = io::stdin();
    let prompter = Prompter::new(stdin.lock(), io::stdout());
    let mut session = Session::new(&config, &db, prompter);

    match cli.command {
        Commands::NewTournament => session.new_tournament().map(drop),
        Commands::SetTournament => session.set_tournament().map(drop),
        Commands::AddScores => session.add_scores(),
        Commands::Standings => session.standings(),
        Commands::Log { csv } => session.log(csv),
        Commands::Recalc => session.recalc(),
        Commands::Formula { rank, hours } => {
            let score_type = if rank { ScoreType::Rank } else { ScoreType::Points };
            session.formula(score_type, hours)
        }
    }
}

/// Log to `<data dir>/logs/gametourney.log`; the terminal is kept for prompts.
fn init_tracing(config: &Config, verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE_NAME))
        .context("failed to open log file")?;

    let default_filter = if verbose {
        VERBOSE_FILTER
    } else {
        config.logging.filter.as_str()
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
