//! prepdocs command line
//!
//! Run with: cargo run -p prepdocs --features cli -- ./data

use std::path::PathBuf;

use clap::Parser;
use prepdocs::{bootstrap, DocumentAction, PrepdocsConfig, Strategy};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ingest documents into blob storage and a search index
#[derive(Debug, Parser)]
#[command(name = "prepdocs", version, about)]
struct Args {
    /// File or directory to process
    path: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Remove the listed files instead of adding them
    #[arg(long, conflicts_with = "removeall")]
    remove: bool,

    /// Remove every blob and every index entry
    #[arg(long)]
    removeall: bool,

    /// Category recorded on every section
    #[arg(long)]
    category: Option<String>,

    /// Stop at the first file that fails
    #[arg(long)]
    fail_fast: bool,
}

impl Args {
    fn action(&self) -> DocumentAction {
        if self.removeall {
            DocumentAction::RemoveAll
        } else if self.remove {
            DocumentAction::Remove
        } else {
            DocumentAction::Add
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prepdocs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = PrepdocsConfig::load(args.config.as_deref())?;
    if args.category.is_some() {
        config.category = args.category.clone();
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Storage: {:?}", config.storage.backend);
    tracing::info!("  - Search: {:?} ({})", config.search.backend, config.search.index_name);
    tracing::info!("  - Embeddings: {:?}", config.embeddings.provider);
    tracing::info!("  - Chunk size: {}", config.splitter.chunk_size);

    let strategy = bootstrap::build_file_strategy(&config, args.action(), &args.path)
        .await?
        .with_fail_fast(args.fail_fast);

    strategy.setup().await?;
    let report = strategy.run().await?;

    println!("\nDone.");
    println!("  Processed: {}", report.processed);
    println!("  Skipped:   {}", report.skipped);
    println!("  Failed:    {}", report.failed.len());
    for (filename, error) in &report.failed {
        println!("    {}: {}", filename, error);
    }

    if !report.is_success() {
        anyhow::bail!("{} file(s) failed", report.failed.len());
    }
    Ok(())
}
