use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use foodgram::{
    actions::{ingredients::import_ingredients, tags::import_tags},
    api,
    config::Config,
    state::Context,
};

#[derive(Parser)]
#[command(name = "foodgram")]
#[command(about = "Foodgram - recipe sharing backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve,
    /// Load ingredients from a `name,measurement_unit` CSV file
    ImportIngredients { path: PathBuf },
    /// Load tags from a `name,color,slug` CSV file
    ImportTags { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = Config::load()?;

    log::info!("Initializing state...");
    let context = Context::from_config(&config).await?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config, context).await?,
        Commands::ImportIngredients { path } => {
            let text = read(&path).await?;
            import_ingredients(&text, context.store()).await?;
        }
        Commands::ImportTags { path } => {
            let text = read(&path).await?;
            import_tags(&text, context.store()).await?;
        }
    }

    Ok(())
}

async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn serve(config: &Config, context: Arc<Context>) -> Result<()> {
    let address = SocketAddr::from(([0, 0, 0, 0], config.port));

    let (address, server) = warp::serve(api::routes(context))
        .try_bind_with_graceful_shutdown(address, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            log::info!("Shutting down...");
        })
        .with_context(|| format!("Failed to bind {address}"))?;

    log::info!("Listening on {address}");
    server.await;

    Ok(())
}
