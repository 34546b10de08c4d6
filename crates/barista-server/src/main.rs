//! Command line for the barista assistant: serve the HTTP API, refresh the
//! scraped data, or chat in the terminal.

use anyhow::{Context, Result};
use barista_core::config::{load_config, BaristaConfig};
use barista_core::services::{refresh_outlets, refresh_products};
use barista_core::{Conversation, Services};
use barista_server::AppState;
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Barista - a coffee shop assistant with tools")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(long, short, default_value = "barista.yaml", help = "Path to the YAML configuration file")]
    config: String,

    #[clap(long, help = "Override the configured bind address")]
    bind_addr: Option<String>,

    #[clap(long, short, help = "Log level (defaults to the configured level)")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (default command)
    Serve,
    /// Re-scrape source pages and replace the stored data
    Refresh {
        #[clap(value_enum, default_value = "all")]
        target: RefreshTarget,
    },
    /// Chat with the assistant in the terminal
    Chat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum RefreshTarget {
    Products,
    Outlets,
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)
        .await
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    if let Some(bind_addr) = cli.bind_addr {
        config.server.bind_addr = bind_addr;
    }

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_level_filter = level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();
    log::info!("Configuration loaded for agent: {}", config.agent.name);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::Refresh { target } => refresh(&config, target).await,
        Commands::Chat => run_chat(config).await,
    }
}

async fn run_server(config: BaristaConfig) -> Result<()> {
    let services = Services::initialize(&config).await;
    for (component, reason) in services.unavailable() {
        log::warn!("Serving without {}: {}", component, reason);
    }

    barista_server::serve(AppState::new(services), &config.server).await?;
    Ok(())
}

async fn refresh(config: &BaristaConfig, target: RefreshTarget) -> Result<()> {
    if matches!(target, RefreshTarget::Products | RefreshTarget::All) {
        let chunks = refresh_products(config)
            .await
            .context("Failed to refresh the product index")?;
        println!("Product index rebuilt with {} chunks.", chunks);
    }
    if matches!(target, RefreshTarget::Outlets | RefreshTarget::All) {
        let outlets = refresh_outlets(config)
            .await
            .context("Failed to refresh the outlet database")?;
        println!("Outlet database rebuilt with {} outlets.", outlets);
    }
    Ok(())
}

async fn run_chat(config: BaristaConfig) -> Result<()> {
    let services = Services::initialize(&config).await;
    let agent = services.agent.get().context("The agent is not available")?;

    println!("Chatting with {}. Type 'exit' to quit.", config.agent.name);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut conversation = Conversation::new();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        match agent.run_turn(conversation.clone(), message).await {
            Ok(outcome) => {
                println!("{}\n", outcome.answer);
                conversation = outcome.conversation;
            }
            Err(e) => eprintln!("Error: {}\n", e),
        }
    }

    Ok(())
}
