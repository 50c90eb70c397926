use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

mod agent;
mod changeset;
mod command;
mod config;
mod context;
mod error;
mod history;
mod plan;
mod process;
mod session;
mod vcs;

use config::Config;
use context::AppContext;

/// Ticketpilot - drive a coding agent against per-ticket repository checkouts
#[derive(Parser)]
#[command(name = "ticketpilot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Root directory holding one workspace per ticket
    #[arg(long, env = "TICKETPILOT_TICKETS_ROOT")]
    tickets_root: Option<PathBuf>,

    /// Generative agent CLI binary
    #[arg(long, env = "TICKETPILOT_AGENT_BIN")]
    agent_bin: Option<String>,

    /// Base branch pull requests target
    #[arg(long, env = "TICKETPILOT_BASE_BRANCH")]
    base_branch: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discuss the ticket with the agent (no file edits)
    Chat {
        /// Ticket identifier
        #[arg(short, long)]
        ticket: String,

        /// Message for the agent
        #[arg(short, long)]
        message: String,
    },
    /// Generate or replace the ticket's implementation plan
    Plan {
        /// Ticket identifier
        #[arg(short, long)]
        ticket: String,
    },
    /// Implement the plan: stage, diff, apply, and open a pull request
    Dev {
        /// Ticket identifier
        #[arg(short, long)]
        ticket: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::new(cli.agent_bin, cli.tickets_root, cli.base_branch);
    let ctx = AppContext::new(config);

    // The forwarded line stream is the product output; print it as it
    // arrives, the way the out-of-scope web layer would relay it.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            println!("{line}");
        }
    });

    let result = match cli.command {
        Commands::Chat { ticket, message } => command::run_chat(&ctx, &ticket, &message, &tx).await,
        Commands::Plan { ticket } => command::run_plan(&ctx, &ticket, &tx).await,
        Commands::Dev { ticket } => command::run_dev(&ctx, &ticket, &tx).await,
    };

    drop(tx);
    printer.await?;
    result
}
