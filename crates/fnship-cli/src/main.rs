use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use fnship_core::FnshipConfig;

mod commands;
mod context;
mod report;

use context::AppContext;

#[derive(Parser)]
#[command(
    name = "fnship",
    about = "fnship — package a folder and ship it as an HTTP-exposed Lambda function",
    version,
    propagate_version = true,
)]
struct Cli {
    /// AWS region (overrides fnship.toml)
    #[arg(long, global = true, env = "FNSHIP_REGION")]
    region: Option<String>,

    /// Path to the config file (default: ./fnship.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Package a folder, upload it, and create or update the function.
    ///
    /// The first deploy of a name/id pair creates the execution role, the
    /// function, and its HTTP route. Later deploys only update the code.
    Deploy {
        name: String,
        /// Folder holding the function code
        folder: PathBuf,
        /// Upload even if an artifact with the same digest already exists
        #[arg(short, long)]
        force: bool,
        /// Deployment id (default: a fresh random id)
        #[arg(long)]
        id: Option<String>,
        /// Function runtime (overrides fnship.toml)
        #[arg(short, long)]
        runtime: Option<String>,
    },
    /// Point the function back at a previously uploaded artifact.
    Rollback {
        name: String,
        id: String,
        /// Leading characters of the artifact's sha256
        prefix: String,
        /// Upload time (unix seconds) to pick among several matches
        #[arg(short, long)]
        time: Option<i64>,
    },
    /// Delete the function, its role, its API, and optionally its artifacts.
    Remove {
        name: String,
        id: String,
        /// Also delete the artifact bucket
        #[arg(short, long, default_value_t = true, action = ArgAction::Set)]
        storage: bool,
    },
    /// List deployed functions.
    List {
        /// Include functions not created by fnship
        #[arg(short, long)]
        all: bool,
    },
    /// List the uploaded artifacts of a deployment.
    ListVersion {
        name: String,
        id: String,
        /// Show full digests and raw unix timestamps
        #[arg(short, long)]
        full: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fnship=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    let mut config = FnshipConfig::load(cli.config.as_deref())?;
    if let Some(region) = cli.region {
        config.region = region;
    }

    let ctx = AppContext::connect(config).await;

    match cli.command {
        Commands::Deploy { name, folder, force, id, runtime } => {
            let args = commands::deploy::DeployArgs {
                name: &name,
                folder: &folder,
                force,
                id: id.as_deref(),
                runtime: runtime.as_deref(),
            };
            commands::deploy::deploy(&ctx, &args).await.map(|report| report.print())
        }
        Commands::Rollback { name, id, prefix, time } => {
            commands::rollback::rollback(&ctx, &name, &id, &prefix, time).await.map(|_| ())
        }
        Commands::Remove { name, id, storage } => {
            commands::remove::remove(&ctx, &name, &id, storage).await.map(|_| ())
        }
        Commands::List { all } => commands::list::list(&ctx, all).await.map(|_| ()),
        Commands::ListVersion { name, id, full } => {
            commands::list::list_version(&ctx, &name, &id, full).await.map(|_| ())
        }
    }
}
