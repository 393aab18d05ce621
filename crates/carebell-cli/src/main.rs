use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "carebell-cli", version, about = "Carebell CLI")]
struct Cli {
    /// Evaluate as of this local time instead of now (YYYY-MM-DDTHH:MM)
    #[arg(long, global = true, value_parser = commands::parse_now)]
    now: Option<NaiveDateTime>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Water logging and reminder settings
    Water {
        #[command(subcommand)]
        action: commands::water::WaterAction,
    },
    /// Medicine schedules
    Med {
        #[command(subcommand)]
        action: commands::med::MedAction,
    },
    /// Record dose outcomes
    Dose {
        #[command(subcommand)]
        action: commands::dose::DoseAction,
    },
    /// Evaluate reminders once and fire what is due
    Tick,
    /// Adherence report
    Report {
        /// Trailing window in days (default from config)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Refill projections
    Refill,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let now = cli
        .now
        .unwrap_or_else(|| chrono::Local::now().naive_local());

    let result = match cli.command {
        Commands::Water { action } => commands::water::run(action, now),
        Commands::Med { action } => commands::med::run(action, now),
        Commands::Dose { action } => commands::dose::run(action, now),
        Commands::Tick => commands::tick::run(now),
        Commands::Report { days } => commands::report::run(now, days),
        Commands::Refill => commands::refill::run(),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
