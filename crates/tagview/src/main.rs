use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use tagview_core::{StaticTagSource, TagView};
use tagview_http::Tagview;
use tagview_pullstats::{FlushWorker, MemoryPullEventStore, MemoryPullStatisticsStore, PullRecorder};

mod config;
use crate::config::Config;

#[derive(Parser)]
struct Cli {
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the tag endpoints over HTTP.
    Serve,
    /// Print the tags of a repository as the tag view renders them.
    List {
        repository: String,
        #[arg(long)]
        show_signatures: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .compact()
        .init();

    // load configuration
    let mut dev_config = File::open(cli.config_file.unwrap_or("./dev-config.yml".into()))?;
    let mut s = String::new();
    dev_config.read_to_string(&mut s)?;
    let config: Config = serde_yaml::from_str(&s)?;

    let source = StaticTagSource::new(config.static_repositories.clone())?;

    match cli.command {
        Command::Serve => serve(config, source).await,
        Command::List {
            repository,
            show_signatures,
        } => list(&source, &repository, show_signatures).await,
    }
}

async fn list(source: &StaticTagSource, repository: &str, show_signatures: bool) -> Result<()> {
    let mut view = TagView::load(source, repository).await?;
    if show_signatures {
        view.activate_toggle();
    }
    for tag in view.visible_tags() {
        println!("{}\t{:?}\t{}", tag.name(), tag.kind(), tag.digest());
    }
    println!("[{}] {} hidden", view.toggle_label(), view.hidden_count());
    Ok(())
}

async fn serve(config: Config, source: StaticTagSource) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tagview = Tagview::new(Arc::new(source));

    let worker = if config.pull_statistics.enabled {
        let events = Arc::new(MemoryPullEventStore::new());
        let statistics = Arc::new(MemoryPullStatisticsStore::new());
        tagview = tagview.with_pull_statistics(PullRecorder::new(events.clone()), statistics.clone());
        let worker = FlushWorker::new(events, statistics, config.pull_statistics.flush_config());
        Some(tokio::spawn(worker.run(shutdown_rx)))
    } else {
        tracing::info!("pull statistics disabled; skipping flush worker");
        None
    };

    let router = tagview.router()?;

    tracing::info!("listening on {}", config.listen);
    axum::Server::bind(&config.listen)
        .serve(router.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {e}");
            }
        })
        .await?;

    if let Some(handle) = worker {
        shutdown_tx.send(true)?;
        handle.await?;
    }

    Ok(())
}
