//! agentrelay CLI: the main entry point.
//!
//! Commands:
//! - `chat`     : interactive conversation with tool reports
//! - `ask`      : answer a single question and exit
//! - `tools`    : print the capability schema offered to the model
//! - `agents`   : list the specialized agents
//! - `onboard`  : write a default configuration file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "agentrelay",
    about = "agentrelay: an LLM assistant that uses tools and delegates to agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat interactively
    Chat,

    /// Answer a single question and print the tool report
    Ask {
        /// The question to answer
        #[arg(short, long)]
        message: String,

        /// Skip the tool report
        #[arg(long)]
        no_report: bool,
    },

    /// Print the capability schema offered to the model as JSON
    Tools,

    /// List the specialized agents
    Agents,

    /// Create the configuration directory and a default config file
    Onboard,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat => commands::chat::run().await?,
        Commands::Ask { message, no_report } => commands::ask::run(&message, !no_report).await?,
        Commands::Tools => commands::catalog::tools()?,
        Commands::Agents => commands::catalog::agents()?,
        Commands::Onboard => commands::onboard::run()?,
    }

    Ok(())
}
