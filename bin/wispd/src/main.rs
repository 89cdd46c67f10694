//! Wisp daemon - database lifecycle for the mock filesystem emulator.
//!
//! Provides:
//! - `init`: create the database, views, seed record, and root node
//! - `seed`: eagerly materialize the full tree
//! - `status`: report views, row counts, and cache statistics

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use wisp_core::config::FsConfig;
use wisp_fs::{Core, MockFs};

/// Wisp daemon.
#[derive(Parser)]
#[command(name = "wispd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database: views, seed record, root node
    Init,

    /// Eagerly materialize the full tree
    Seed,

    /// Show views, row counts, and cache statistics
    Status,
}

/// Loads the JSON configuration file.
fn load_config(path: &PathBuf) -> Result<FsConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    serde_json::from_str(&content).context("failed to parse config file")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set up logging")?;

    let config = load_config(&cli.config)?;
    let db_path = config.database.path.clone();

    match cli.command {
        Commands::Init => {
            let fs = MockFs::open(config).await?;
            info!("database initialized");

            println!("Database: {:?}", db_path);
            println!("Master seed: {}", fs.master_seed());
            println!("Views:");
            for view in fs.list_views().await {
                println!("  {} {} ({})", view.view_id, view.table_name, view.kind);
            }
            fs.close().await;
        }

        Commands::Seed => {
            let fs = MockFs::open(config).await?;
            let summary = fs.bulk_seed().await?;

            println!("Seeded to depth {}", summary.target_depth);
            println!(
                "Generated {} nodes across {} levels",
                summary.nodes_generated, summary.levels_generated
            );
            println!("Rows per table:");
            for (table, count) in fs.table_stats().await? {
                println!("  {}: {}", table, count);
            }
            fs.close().await;
        }

        Commands::Status => {
            let fs = MockFs::open(config).await?;

            println!("Database: {:?}", db_path);
            println!("Master seed: {}", fs.master_seed());
            println!("Views:");
            for view in fs.list_views().await {
                println!("  {} {} ({})", view.view_id, view.table_name, view.kind);
            }
            println!("Rows per table:");
            for (table, count) in fs.table_stats().await? {
                println!("  {}: {}", table, count);
            }
            println!(
                "Node cache: {} entries",
                fs.cache_stats().await.node_cache_size
            );
            fs.close().await;
        }
    }

    Ok(())
}
