use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use eventwatch::api::HttpApi;
use eventwatch::config::Config;
use eventwatch::error::Operation;
use eventwatch::models::{NotificationFrequency, Topic};
use eventwatch::render;
use eventwatch::search::EventSearchController;
use eventwatch::topics::{Phase, TopicListController};
use eventwatch::tui;

#[derive(Parser)]
#[command(name = "eventwatch")]
#[command(about = "Search events and manage keyword topic subscriptions", long_about = None)]
struct Cli {
    /// Base URL of the event API (overrides EVENTWATCH_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search events by keyword
    Search { keyword: String },
    /// Manage topic subscriptions
    Topics {
        #[command(subcommand)]
        command: TopicCommands,
    },
    /// Check that the API is up
    Health,
    /// Interactive search and topic manager
    Tui,
}

#[derive(Subcommand)]
enum TopicCommands {
    List,
    Add {
        keyword: String,
        #[arg(short, long, default_value_t = NotificationFrequency::Weekly)]
        frequency: NotificationFrequency,
    },
    /// Turn notifications for a topic on or off
    Toggle { id: i64 },
    Frequency {
        id: i64,
        frequency: NotificationFrequency,
    },
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // the TUI owns the terminal, so it stays quiet unless RUST_LOG asks otherwise
    let default_filter = match cli.command {
        Commands::Tui => "off",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = Config::resolve(cli.api_url.as_deref())?;
    let api = HttpApi::new(config).context("Failed to build HTTP client")?;

    match cli.command {
        Commands::Search { keyword } => {
            let mut controller = EventSearchController::new(api);
            controller.search(&keyword).await;
            let state = controller.state();
            if let Some(error) = state.error() {
                bail!("{}", error);
            }
            println!("{}", render::search_text(state, 80));
        }
        Commands::Topics { command } => run_topics(api, command).await?,
        Commands::Health => {
            let url = api.config().endpoint("/health");
            let health = api
                .health()
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message(Operation::Health)))?;
            println!("{}: {}", url, health.status);
        }
        Commands::Tui => {
            let api = Arc::new(api);
            let runtime = tokio::runtime::Handle::current();
            tokio::task::spawn_blocking(move || tui::run(api, runtime))
                .await
                .context("Interactive session crashed")??;
        }
    }

    Ok(())
}

async fn run_topics(api: HttpApi, command: TopicCommands) -> Result<()> {
    let mut controller = TopicListController::new(api);
    controller.fetch_all().await;
    if let Phase::Error(message) = controller.state().phase() {
        bail!("{}", message);
    }

    match command {
        TopicCommands::List => {}
        TopicCommands::Add { keyword, frequency } => {
            controller.create(&keyword, frequency).await;
            check(&controller)?;
            println!("Created topic \"{}\"", keyword.trim());
        }
        TopicCommands::Toggle { id } => {
            let topic = lookup(&controller, id)?;
            controller.toggle_active(&topic).await;
            check(&controller)?;
            println!(
                "Notifications for \"{}\" turned {}",
                topic.keyword,
                render::active_label(!topic.is_active)
            );
        }
        TopicCommands::Frequency { id, frequency } => {
            let topic = lookup(&controller, id)?;
            controller.set_frequency(&topic, frequency).await;
            check(&controller)?;
            println!(
                "Notification frequency for \"{}\" set to {}",
                topic.keyword,
                frequency.label()
            );
        }
        TopicCommands::Delete { id, yes } => {
            let topic = lookup(&controller, id)?;
            controller.request_delete(&topic).await;
            if yes || confirm_delete(&topic)? {
                controller.confirm_delete().await;
                check(&controller)?;
                println!("Deleted topic \"{}\"", topic.keyword);
            } else {
                controller.cancel_delete().await;
                println!("Cancelled");
                return Ok(());
            }
        }
    }

    // the write went through even if reloading the list did not
    if let Phase::Error(message) = controller.state().phase() {
        eprintln!("Could not reload topics: {}", message);
        return Ok(());
    }
    println!("{}", render::topics_text(controller.state()));
    Ok(())
}

fn lookup(controller: &TopicListController<HttpApi>, id: i64) -> Result<Topic> {
    controller
        .find(id)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("No topic with id {}", id))
}

fn check(controller: &TopicListController<HttpApi>) -> Result<()> {
    match controller.state().mutation_error() {
        Some(message) => bail!("{}", message),
        None => Ok(()),
    }
}

fn confirm_delete(topic: &Topic) -> Result<bool> {
    print!("Delete topic \"{}\"? [y/N] ", topic.keyword);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
