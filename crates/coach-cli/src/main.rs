mod cmd;
mod output;

use clap::{Args, Parser, Subcommand};
use cmd::{config::ConfigSubcommand, state::StateSubcommand, votes::VotesSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "coach",
    about = "Daily coach: deliver one generated tip per period and collect votes on it",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "COACH_CONFIG", default_value = coach_core::paths::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(flatten)]
    secrets: Secrets,

    #[command(subcommand)]
    command: Commands,
}

/// Credentials come from the environment; the flags exist but stay hidden.
#[derive(Args, Clone)]
pub struct Secrets {
    #[arg(long, env = "SLACK_SIGNING_SECRET", global = true, hide = true, hide_env_values = true)]
    pub slack_signing_secret: Option<String>,

    #[arg(long, env = "SLACK_BOT_TOKEN", global = true, hide = true, hide_env_values = true)]
    pub slack_bot_token: Option<String>,

    #[arg(long, env = "SLACK_WEBHOOK_URL", global = true, hide = true, hide_env_values = true)]
    pub slack_webhook_url: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY", global = true, hide = true, hide_env_values = true)]
    pub anthropic_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and deliver today's tip for a stream (no-op if already delivered)
    Deliver {
        /// Stream id from the configuration
        stream: String,
        /// Period key (default: today's date in the configured timezone)
        #[arg(long)]
        period: Option<String>,
    },

    /// Run the interactive callback receiver
    Serve {
        /// Port to listen on (default: server.port from the configuration)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Install the configured schedules and run the cron daemon in the foreground
    Schedule {
        /// Print the timer table (environment values redacted) and exit
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect per-stream delivery state
    State {
        #[command(subcommand)]
        subcommand: StateSubcommand,
    },

    /// Inspect vote ledgers
    Votes {
        #[command(subcommand)]
        subcommand: VotesSubcommand,
    },

    /// Check the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Deliver { .. } | Commands::Serve { .. } | Commands::Schedule { dry_run: false } => {
            tracing::Level::INFO
        }
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let config = cli.config.as_path();
    let result = match cli.command {
        Commands::Deliver { stream, period } => {
            cmd::deliver::run(config, &stream, period, &cli.secrets, cli.json)
        }
        Commands::Serve { port } => cmd::serve::run(config, port, &cli.secrets),
        Commands::Schedule { dry_run } => cmd::schedule::run(config, dry_run, cli.json),
        Commands::State { subcommand } => cmd::state::run(config, subcommand, cli.json),
        Commands::Votes { subcommand } => cmd::votes::run(config, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(config, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
