use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use offline_tiles::{FetchOutcome, Method, Request, ServiceWorker, StaticDirNetwork, WorkerConfig};

#[derive(Parser)]
#[command(name = "offline-tiles")]
#[command(about = "Offline cache worker with mirrored tile synthesis", long_about = None)]
struct Cli {
    /// Site directory served as the network
    #[arg(short, long, default_value = "./site")]
    root: PathBuf,

    /// JSON configuration file (otherwise OFFLINE_TILES_* variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the cache version tag
    #[arg(long)]
    cache_version: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize one tile and write it to a file
    Tile {
        /// Source image path, e.g. /static/wall.png
        #[arg(long)]
        src: String,

        /// Mirror axis: x or y
        #[arg(long, default_value = "x")]
        axis: String,

        /// Output PNG path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Install, activate, then route each URL through the worker
    Fetch {
        /// URLs, absolute or relative to the scope
        urls: Vec<String>,

        /// Request method used for every URL
        #[arg(short, long, default_value = "GET")]
        method: String,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "offline_tiles=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => WorkerConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => WorkerConfig::from_env()?,
    };
    if let Some(version) = cli.cache_version {
        config.version = version;
        config.validate()?;
    }

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::Tile { src, axis, out } => {
            let mut url = config
                .scope
                .join(config.tile_suffix.trim_start_matches('/'))?;
            url.query_pairs_mut()
                .append_pair("axis", &axis)
                .append_pair("src", &src);

            let network = Arc::new(StaticDirNetwork::new(&config.scope, &cli.root));
            let worker = ServiceWorker::standalone(config, network)?;

            let response = worker
                .on_fetch(&Request::get(url.clone()))
                .await?
                .into_response()
                .context("tile request was not intercepted")?;

            if !response.is_ok() {
                bail!(
                    "{} {}: {}",
                    response.status,
                    response.status_text,
                    String::from_utf8_lossy(&response.body)
                );
            }

            tokio::fs::write(&out, &response.body).await?;
            println!("Wrote {} ({} bytes)", out.display(), response.body.len());
        }

        Commands::Fetch { urls, method } => {
            let method: Method = method.parse()?;
            let network = Arc::new(StaticDirNetwork::new(&config.scope, &cli.root));
            let scope = config.scope.clone();
            let worker = ServiceWorker::standalone(config, network)?;

            let installed = worker.on_install().await?;
            println!("Installed {} assets into {}", installed.cached.len(), installed.namespace);
            let activated = worker.on_activate().await?;
            println!("Activated, evicted {:?}", activated.evicted);

            for raw in &urls {
                let url = Url::parse(raw).or_else(|_| scope.join(raw))?;
                let request = Request::new(method, url);

                match worker.on_fetch(&request).await {
                    Ok(FetchOutcome::Declined(reason)) => {
                        println!("---  declined ({})  {}", reason, request.url);
                    }
                    Ok(FetchOutcome::Respond { class, response }) => {
                        println!(
                            "{}  {:<12}  {}  ({} bytes)",
                            response.status,
                            class.to_string(),
                            request.url,
                            response.body.len()
                        );
                    }
                    Err(e) => println!("ERR  {}  {}", request.url, e),
                }
            }

            let settled = worker.settle().await;
            if settled > 0 {
                println!("Settled {} background revalidations", settled);
            }

            println!("{}", serde_json::to_string_pretty(&worker.namespace_stats().await?)?);
        }
    }

    Ok(())
}
