//! Command-line front end for the CarAdvisor backend.

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use dotenv::dotenv;
use std::path::PathBuf;
use url::Url;

mod commands;
mod logging;

use commands::{cars::CarsCommand, chat::ChatArgs, session::SessionCommand};

/// CarAdvisor CLI
#[derive(Parser, Debug)]
#[command(name = "caradvisor", version)]
#[command(about = "Browse the CarAdvisor catalog and ask its assistant", long_about = None)]
pub struct Cli {
    /// Path to a configuration file (YAML or JSON)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL; overrides the configuration file and environment
    #[arg(long, global = true)]
    server: Option<Url>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in, sign out, and manage the current account
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Browse and edit the car catalog (requires a session)
    Cars {
        #[command(subcommand)]
        command: CarsCommand,
    },

    /// Ask the car assistant (requires a session)
    Chat(ChatArgs),

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell to generate the completion script for
        #[arg(long, short)]
        shell: Shell,
    },

    /// Generate a configuration file with default values
    Config {
        /// Format of the configuration file (yaml or json)
        #[arg(long, short, default_value = "yaml")]
        format: String,

        /// Where to write the file; defaults to config.yaml or config.json
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let Cli {
        config,
        server,
        command,
    } = Cli::parse();

    match command {
        Commands::Session { command } => {
            let remote = commands::connect(config, server)?;
            commands::session::run(&remote, command).await?;
        }
        Commands::Cars { command } => {
            let remote = commands::connect(config, server)?;
            commands::cars::run(&remote, command).await?;
        }
        Commands::Chat(args) => {
            let remote = commands::connect(config, server)?;
            commands::chat::run(&remote, args).await?;
        }
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell);
        }
        Commands::Config { format, output } => {
            commands::config::generate_config(&format, output.as_deref())?;
        }
    }

    Ok(())
}
