use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use chatwidget::config::Config;
use chatwidget::console::ConsoleSurface;
use chatwidget::logger::init_logger;
use chatwidget::{ConversationController, HttpChatService};

#[derive(Parser)]
#[command(name = "chatwidget")]
#[command(version)]
#[command(about = "Terminal chat widget for a customer-support assistant", long_about = None)]
struct Cli {
    /// Config file (default: ~/.chatwidget/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the chat service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Also log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat widget (default)
    Chat {
        /// Start with the panel open
        #[arg(long)]
        open: bool,
    },
    /// Send one message and print the reply
    Send {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_or_init(path)?,
        None => Config::load()?,
    };
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }

    let command = cli.command.unwrap_or(Commands::Chat { open: false });

    // stderr would tear the TUI, so it is only a log target for one-shot sends
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    init_logger(&log_dir, cli.verbose && matches!(command, Commands::Send { .. }))?;

    match command {
        Commands::Chat { open } => chatwidget::ui::run(config, open).await,
        Commands::Send { message } => send_once(&config, &message.join(" ")).await,
    }
}

async fn send_once(config: &Config, message: &str) -> Result<()> {
    let service = Arc::new(HttpChatService::new(config)?);
    let mut controller = ConversationController::new(service, ConsoleSurface::stdout());

    if !controller.send_user_text(message).await {
        anyhow::bail!("Nothing to send");
    }
    Ok(())
}
