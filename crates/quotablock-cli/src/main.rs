use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "quotablock", version, about = "Quotablock CLI")]
struct Cli {
    /// Database file (defaults to ~/.config/quotablock/quotablock.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rule set management
    Rules {
        #[command(subcommand)]
        action: commands::rules::RulesAction,
    },
    /// Status of every rule set
    Status {
        /// Evaluate at this RFC 3339 instant instead of now
        #[arg(long)]
        at: Option<String>,
    },
    /// Which rule sets would block a URL
    Check {
        url: String,
        /// Evaluate at this RFC 3339 instant instead of now
        #[arg(long)]
        at: Option<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("QUOTABLOCK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let db = cli.db.as_deref();
    let result = match cli.command {
        Commands::Rules { action } => commands::rules::run(db, action).await,
        Commands::Status { at } => commands::status::run(db, at.as_deref()).await,
        Commands::Check { url, at } => commands::check::run(db, &url, at.as_deref()).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
