use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use driveflow::{
    backend::{google, local::LocalDrive},
    batch::{BatchController, BatchOutcome, FileBoard},
    cache::{self, CacheStore},
    config::{CacheBackend, Config, StoreConfig},
    drive::Drive,
    notice::Notice,
    progress::create_observer,
    store::RemoteStore,
    walk::{Exclude, Walked, drop_paths, select_paths},
    warning::collect_warnings,
};
use tracing::{error, info};

#[derive(Parser)]
struct Opts {
    #[clap(short, long, env = "DRIVEFLOW_CONFIG")]
    config: PathBuf,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload files or a directory tree.
    Upload {
        #[clap(required = true)]
        paths: Vec<PathBuf>,
        /// Destination folder id; the drive root when omitted.
        #[clap(short, long)]
        parent: Option<String>,
        /// Treat the paths as a drag-and-drop payload.
        #[clap(long)]
        drop: bool,
    },
    /// Print a folder listing as JSON lines.
    List {
        #[clap(short, long)]
        folder: Option<String>,
        #[clap(short, long)]
        search: Option<String>,
    },
    Delete {
        id: String,
    },
    Url {
        id: String,
    },
}

async fn read_selection(paths: &[PathBuf], config: &Config, drop: bool) -> anyhow::Result<Walked> {
    let exclude = Exclude::new(config.upload.exclude.iter().map(String::as_str))?;
    let page = config.upload.read_batch;
    if drop {
        return Ok(drop_paths(paths, &exclude, page).await);
    }
    Ok(select_paths(paths, &exclude, page).await?)
}

async fn execute<S: RemoteStore, C: CacheStore>(
    store: S,
    cache: C,
    config: Config,
    command: Command,
) -> anyhow::Result<()> {
    let drive = Drive::new(store, cache, config.cache.ttl());
    match command {
        Command::Upload {
            paths,
            parent,
            drop,
        } => {
            let (walked, skipped) =
                collect_warnings(read_selection(&paths, &config, drop)).await;
            let walked = walked?;
            let observer = create_observer();
            if !skipped.is_empty() {
                observer.notify(&Notice::skipped(skipped.len()));
            }
            if walked.is_empty() {
                return Err(anyhow!("nothing to upload"));
            }
            let controller = BatchController::new(
                drive,
                Arc::new(FileBoard::new()),
                observer.clone(),
                config.upload.into(),
            );
            let outcome = controller.upload_walked(parent.as_deref(), walked).await;
            observer.finish();
            match outcome? {
                BatchOutcome::Tree(summary) => {
                    info!(
                        files = summary.uploaded.len(),
                        folders = summary.folders.len(),
                        "folder upload done"
                    );
                }
                BatchOutcome::Flat(summary) => {
                    if !summary.failed.is_empty() {
                        return Err(anyhow!(
                            "{} of {} uploads failed",
                            summary.failed.len(),
                            summary.failed.len() + summary.uploaded.len()
                        ));
                    }
                }
            }
        }
        Command::List { folder, search } => {
            let items = drive
                .list_files(folder.as_deref(), search.as_deref())
                .await
                .with_context(|| "list files")?;
            for item in items {
                println!("{}", serde_json::to_string(&item)?);
            }
        }
        Command::Delete { id } => {
            drive
                .delete_file(&id)
                .await
                .with_context(|| format!("delete {id}"))?;
        }
        Command::Url { id } => {
            let url = drive
                .download_url(&id)
                .await
                .with_context(|| format!("download url of {id}"))?;
            println!("{url}");
        }
    }
    Ok(())
}

async fn with_cache<S: RemoteStore>(
    store: S,
    config: Config,
    command: Command,
) -> anyhow::Result<()> {
    match config.cache.backend.clone() {
        CacheBackend::Redis { url, prefix } => {
            let cache = cache::redis::Client::open(&url, prefix)
                .with_context(|| format!("open redis cache at {url}"))?;
            execute(store, cache, config, command).await
        }
        CacheBackend::Memory => execute(store, cache::memory::Client::new(), config, command).await,
        CacheBackend::Disabled => execute(store, cache::Disabled, config, command).await,
    }
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let config = tokio::fs::read_to_string(&opts.config)
        .await
        .with_context(|| "read config")?;
    let config: Config = serde_yaml::from_str(&config)
        .with_context(|| format!("parse config from {}", opts.config.display()))?;
    config.validate().map_err(|msg| anyhow!("{msg}"))?;

    match config.store.clone() {
        StoreConfig::GoogleDrive {
            token_env,
            api_base,
            upload_base,
        } => {
            let token = std::env::var(&token_env)
                .with_context(|| format!("read access token from ${token_env}"))?;
            let client = google::Client::with_endpoints(
                token,
                api_base.as_ref().map_or(google::API_BASE, |url| url.as_str()),
                upload_base
                    .as_ref()
                    .map_or(google::UPLOAD_BASE, |url| url.as_str()),
            );
            with_cache(client, config, opts.command).await
        }
        StoreConfig::Local { url } => {
            let store = LocalDrive::open(&url)
                .await
                .with_context(|| format!("open local drive at {url}"))?;
            with_cache(store, config, opts.command).await
        }
    }
}

fn main() {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(?e, "failed to start runtime");
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run(opts)) {
        error!(?e, "critical error");
        std::process::exit(1);
    }
}
