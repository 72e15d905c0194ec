mod app;
mod config;
mod deck;
mod logging;
mod scheduler;
mod session;
mod snapshot;
mod stats;
mod storage;
mod ui;

use anyhow::{Result, bail};
use app::App;
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::Config;
use snapshot::SnapshotSettings;
use stats::Stats;
use std::path::PathBuf;
use storage::Storage;
use tracing::info;

#[derive(Parser)]
#[command(name = "flashdeck", about = "Spaced-repetition flashcards in the terminal", version)]
struct Cli {
    /// Use a different database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the interactive review app (default)
    Review,

    /// Write all decks, cards and the streak to a JSON backup
    Export {
        /// Output file (default: flashcards-backup-YYYY-MM-DD.json)
        path: Option<PathBuf>,
    },

    /// Replace all data with the contents of a JSON backup
    Import {
        /// Backup file to read
        path: PathBuf,
    },

    /// Print review statistics
    Stats,

    /// Delete every deck, card and the streak
    Reset {
        /// Required, this cannot be undone
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    config.ensure_dirs()?;
    logging::init(&config)?;

    let mut storage = Storage::open(&config.db_path)?;
    info!(db = %config.db_path.display(), "Database opened");

    match cli.command.unwrap_or(Command::Review) {
        Command::Review => run_tui(config, storage),
        Command::Export { path } => {
            let path = path.unwrap_or_else(|| snapshot::default_file_name(Utc::now().date_naive()));
            let decks = storage.load_decks()?;
            let settings = SnapshotSettings {
                daily_goal: config.daily_goal,
            };
            snapshot::export(&path, &decks, settings, storage.streak()?)?;
            println!("Exported {} decks to {}", decks.len(), path.display());
            Ok(())
        }
        Command::Import { path } => {
            let report = snapshot::import(&path)?;
            storage.replace_all(&report.decks, report.streak)?;

            println!(
                "Imported {} decks and {} cards",
                report.decks.len(),
                report.card_count()
            );
            for skipped in &report.skipped {
                eprintln!("Skipped: {}", skipped);
            }
            if let Some(settings) = &report.settings
                && settings.daily_goal != config.daily_goal
            {
                eprintln!(
                    "Backup has daily goal {}; set daily_goal in {} to use it",
                    settings.daily_goal,
                    Config::config_path().display()
                );
            }
            Ok(())
        }
        Command::Stats => {
            let decks = storage.load_decks()?;
            let stats = Stats::collect(&decks, Utc::now());
            println!(
                "{} decks, {} cards, {} due",
                stats.deck_count, stats.card_count, stats.due_count
            );
            println!(
                "Reviewed today: {}/{}  Streak: {}",
                stats.reviewed_today,
                config.daily_goal,
                storage.streak()?
            );
            for (day, count) in &stats.reviews_by_day {
                println!("{}  {}", day, count);
            }
            Ok(())
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("Refusing to reset without --yes");
            }
            storage.reset()?;
            println!("All data has been reset");
            Ok(())
        }
    }
}

fn run_tui(config: Config, storage: Storage) -> Result<()> {
    // Ignore SIGINT so Ctrl+C arrives as a key event
    #[cfg(unix)]
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGINT, || {})?;
    }

    let app = App::new(config, storage)?;

    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal);
    ratatui::restore();

    result
}
