use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;

#[derive(Parser)]
#[command(name = "clipflow")]
#[command(version, about = "Turn long-form videos into short clips through a processing backend")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    /// Backend base URL. Overrides clipflow.toml and CLIPFLOW_BACKEND_URL.
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Path to clipflow.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a video URL and show its metadata
    Info { url: String },
    /// List previously processed videos
    Library,
    /// Show which stages are complete for a work item
    Status { id: String },
    /// Run the remaining stages for a work item
    Run { id: String },
    /// Resolve a video URL, then run every stage
    Process { url: String },
    /// List clip suggestions for a work item
    Suggestions { id: String },
    /// Discard all suggestions and analyze the transcript again
    Reanalyze { id: String },
    /// Change the interval of one suggestion
    Adjust {
        id: String,
        index: usize,
        /// New start time in seconds
        #[arg(long, allow_hyphen_values = true)]
        start: Option<String>,
        /// New end time in seconds
        #[arg(long, allow_hyphen_values = true)]
        end: Option<String>,
    },
    /// Export one or more suggestions as clips
    Export {
        id: String,
        #[arg(required = true)]
        indices: Vec<usize>,
    },
    /// List clips already exported for a work item
    Exports { id: String },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default clipflow.toml
    Init,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "clipflow=debug"
    } else {
        "clipflow=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Info { url } => cmd::cmd_info(&cli, url).await?,
        Commands::Library => cmd::cmd_library(&cli).await?,
        Commands::Status { id } => cmd::cmd_status(&cli, id).await?,
        Commands::Run { id } => cmd::cmd_run(&cli, id).await?,
        Commands::Process { url } => cmd::cmd_process(&cli, url).await?,
        Commands::Suggestions { id } => cmd::cmd_suggestions(&cli, id).await?,
        Commands::Reanalyze { id } => cmd::cmd_reanalyze(&cli, id).await?,
        Commands::Adjust {
            id,
            index,
            start,
            end,
        } => cmd::cmd_adjust(&cli, id, *index, start.as_deref(), end.as_deref()).await?,
        Commands::Export { id, indices } => cmd::cmd_export(&cli, id, indices).await?,
        Commands::Exports { id } => cmd::cmd_exports(&cli, id).await?,
        Commands::Config { command } => cmd::cmd_config(&cli, command.clone())?,
    }

    Ok(())
}
