//! tellr - multi-step banking assistant
//!
//! Command-line entry point. `ask` and `plan` run in-process; `serve` starts
//! the HTTP front end (feature `web`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tellr_core::{load_config, sample_config, AssistantService, TellrConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tellr")]
#[command(about = "Answer banking questions with planned multi-step lookups", version)]
struct Cli {
    /// Config file to use instead of .tellr.toml / ~/.config/tellr/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question and print the JSON response
    Ask {
        question: String,
        /// Never call the LLM; every stage takes its fallback
        #[arg(long)]
        offline: bool,
    },
    /// Show the plan a question would run
    Plan {
        question: String,
        #[arg(long)]
        offline: bool,
    },
    /// Run the HTTP server
    #[cfg(feature = "web")]
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Open the index page in a browser
        #[arg(long)]
        open: bool,
        #[arg(long)]
        offline: bool,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a sample configuration file
    Sample,
    /// Print the effective configuration
    Show,
}

fn init_tracing() {
    // Logs go to stderr so stdout stays valid JSON
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "tellr=info,tellr_core=info,tellr_server=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn load(cli_config: Option<&PathBuf>) -> Result<TellrConfig> {
    let cwd = std::env::current_dir()?;
    Ok(load_config(&cwd, cli_config.map(PathBuf::as_path))?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Ask { question, offline } => {
            let service = AssistantService::from_config(load(cli.config.as_ref())?, offline)?;
            let response = service.run(&question);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Plan { question, offline } => {
            let service = AssistantService::from_config(load(cli.config.as_ref())?, offline)?;
            let planned = service.plan(&question)?;
            println!("plan:   {}", planned.plan);
            println!("source: {}", planned.source.as_str());
            if let Some(reasoning) = &planned.reasoning {
                println!("why:    {}", reasoning);
            }
        }
        #[cfg(feature = "web")]
        Commands::Serve {
            host,
            port,
            open,
            offline,
        } => {
            let mut config = load(cli.config.as_ref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config, open, offline)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Sample => print!("{}", sample_config()),
            ConfigAction::Show => {
                let config = load(cli.config.as_ref())?;
                println!("{}", display_config(&config)?);
            }
        },
    }

    Ok(())
}

#[cfg(feature = "web")]
fn serve(config: TellrConfig, open_browser: bool, offline: bool) -> Result<()> {
    let url = format!("http://{}:{}/", config.server.host, config.server.port);
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        if open_browser {
            if let Err(e) = open::that(&url) {
                tracing::warn!(error = %e, url = %url, "could not open browser");
            }
        }
        tellr_server::run_server(config, offline).await
    })
}

/// Effective configuration with secrets masked
fn display_config(config: &TellrConfig) -> Result<String> {
    let mut masked = config.clone();
    for provider in masked.llm.providers.values_mut() {
        mask(&mut provider.api_key);
    }
    mask(&mut masked.database.api_key);
    mask(&mut masked.search.api_key);
    Ok(serde_json::to_string_pretty(&masked)?)
}

fn mask(secret: &mut Option<String>) {
    if let Some(value) = secret.as_mut() {
        if !value.is_empty() && !value.contains("${") {
            *value = "****".to_string();
        }
    }
}
