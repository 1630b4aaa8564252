use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ingest_core::IndexConfig;
use pipeline::IndexService;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "doc-ingest")]
#[command(about = "Parallel document ingestion into a local vector store")]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Scan the docs directory and (re)index what changed.
  Index,
  /// Drop and recreate the store collection for a full reindex from empty.
  Reset,
  /// Print the resolved configuration as TOML.
  Config,
}

fn init_tracing() {
  tracing_subscriber::registry()
    .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
    .with(tracing_subscriber::fmt::layer())
    .init();
}

#[tokio::main]
async fn main() -> Result<()> {
  init_tracing();
  let cli = Cli::parse();

  let project_path = std::env::current_dir().context("resolving current directory")?;
  let config = IndexConfig::load(&project_path).context("loading configuration")?;

  match cli.command {
    Commands::Index => {
      let service = IndexService::new(config).await.context("starting index service")?;
      let summary = service.index().await.context("running index")?;
      println!("{summary}");
    }
    Commands::Reset => {
      let service = IndexService::new(config).await.context("starting index service")?;
      service.reset().await.context("running reset")?;
      println!("Collection reset.");
    }
    Commands::Config => {
      println!("{}", toml::to_string_pretty(&config).context("serializing configuration")?);
    }
  }

  Ok(())
}
