//! `ario-gatewayd`: wires config, storage, the background worker pools and
//! the HTTP surface into a single running process (spec §9 "DESIGN NOTES":
//! no global singletons, an explicit top-level init order instead).

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use parking_lot::Mutex;
use prometheus_client::registry::Registry;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ario_gateway_chunks::{BlockIndexClient, ChunkBroadcaster, ChunkRetrievalService, ChunkStore};
use ario_gateway_config::GatewayConfig;
use ario_gateway_data_source::{
    ArIoNetworkSource, CacheSource, ChunksDataItemSource, ChunksSource, CompositeDataSource, DataSource,
    S3Source, TrustedGatewaysSource, TxDataSource,
};
use ario_gateway_peers::PeerLedger;
use ario_gateway_resolver::AttributesStore;
use ario_gateway_scheduler::spawn_periodic;
use ario_gateway_server::{create_router, AppState, Metrics};
use ario_gateway_store::Storage;
use ario_gateway_store_rocksdb::RocksDbStore;
use ario_gateway_verification::{PreferredRoots, VerificationWorker};

/// AR.IO-style gateway data retrieval and verification engine.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<Utf8PathBuf>,

    /// Overrides `listen_addr` from the loaded configuration.
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable verbose logging (repeat for more: -v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the gateway (the default if no subcommand is given).
    Run,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ario_gatewayd=info,ario_gateway_server=info,tower_http=info".into()),
        1 => tracing_subscriber::EnvFilter::new("debug"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_store(path: &Utf8Path) -> Result<Arc<dyn Storage>> {
    let store = RocksDbStore::open(path).wrap_err_with(|| format!("failed to open rocksdb store at {path}"))?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {}
    }

    let mut config = match &cli.config {
        Some(path) => {
            info!("loading configuration from {path}");
            GatewayConfig::load(Some(path.as_path())).wrap_err("failed to load configuration")?
        }
        None => {
            warn!("no --config given, using built-in defaults (data/ under the current directory)");
            GatewayConfig::default()
        }
    };
    if let Some(bind) = cli.bind {
        config.listen_addr = bind.parse().wrap_err("invalid --bind address")?;
    }
    let config = Arc::new(config);

    // DB: every on-disk table this process owns.
    let chunk_data_store = open_store(&config.store.chunks_path.join("data"))?;
    let chunk_metadata_store = open_store(&config.store.chunks_path.join("metadata"))?;
    let attributes_backing_store = open_store(&config.store.attributes_path)?;
    let contiguous_data_store = open_store(&config.store.contiguous_data_path)?;
    let bundle_backing_store = open_store(&config.store.bundles_path)?;

    // Peer ledger, ahead of anything that fans out to peers.
    let peers = Arc::new(PeerLedger::from_peers_config(&config.peers));
    let http = reqwest::Client::new();

    // Chunk stores and the chunk retrieval/broadcast services built on top.
    let chunk_store = Arc::new(ChunkStore::new(chunk_data_store, chunk_metadata_store));
    let block_index = BlockIndexClient::new(http.clone(), config.peers.trusted_node_url.clone());
    let chunk_retrieval = Arc::new(ChunkRetrievalService::new(
        Arc::clone(&chunk_store),
        Arc::clone(&peers),
        http.clone(),
        block_index,
    ));
    let chunk_broadcaster = Arc::new(ChunkBroadcaster::new(
        Arc::clone(&peers),
        http.clone(),
        config.peers.chunk_post_min_success_count,
        config.peers.chunk_post_abort_timeout,
    ));

    // Item attributes store, then the full composite data-source stack.
    let attributes = Arc::new(AttributesStore::new(attributes_backing_store));

    let sources: Vec<Arc<dyn DataSource>> = vec![
        Arc::new(CacheSource::new(contiguous_data_store)),
        Arc::new(ChunksSource::new(Arc::clone(&chunk_retrieval))),
        Arc::new(ChunksDataItemSource::new(Arc::clone(&attributes), Arc::clone(&chunk_retrieval))),
        Arc::new(TrustedGatewaysSource::new(http.clone(), config.peers.trusted_gateway_urls.clone())),
        Arc::new(ArIoNetworkSource::new(http.clone(), Arc::clone(&peers))),
        Arc::new(TxDataSource::new(http.clone(), config.peers.trusted_node_url.clone())),
        Arc::new(S3Source),
    ];
    let data_source = Arc::new(CompositeDataSource::new(
        sources,
        &config.data_source.on_demand_order,
        &config.data_source.background_order,
    ));

    // Bundle pipeline (download + unbundle worker pools) and its repair worker.
    let (bundles, repair) =
        ario_gateway_bundles::from_config(&config, bundle_backing_store, Arc::clone(&data_source), Arc::clone(&attributes));
    let bundle_records = Arc::clone(bundles.records());

    // Preferred-root set consulted by the verification worker (spec §4.6).
    let preferred_roots = Arc::new(PreferredRoots::new());

    // Metrics registry, wired into the shared `AppState` for `/metrics`.
    let mut registry = Registry::default();
    let metrics = Arc::new(Metrics::new(&mut registry));
    let registry = Arc::new(Mutex::new(registry));

    let node_release = format!("ario-gatewayd/{}", env!("CARGO_PKG_VERSION"));

    let state = Arc::new(AppState::new(
        Arc::clone(&config),
        Arc::clone(&data_source),
        Arc::clone(&bundles),
        Arc::clone(&attributes),
        Arc::clone(&chunk_store),
        Arc::clone(&chunk_retrieval),
        Arc::clone(&chunk_broadcaster),
        Arc::clone(&peers),
        Arc::clone(&preferred_roots),
        metrics,
        registry,
        node_release,
    ));

    // Workers: download, unbundle, repair, verification, each cancellable
    // through one shared token so shutdown unwinds in reverse init order.
    let shutdown = CancellationToken::new();
    let mut worker_handles = Vec::new();
    worker_handles.extend(bundles.spawn_download_workers(config.bundles.download_workers, shutdown.clone()));
    worker_handles.extend(bundles.spawn_unbundle_workers(config.bundles.unbundle_workers, shutdown.clone()));
    worker_handles.extend(bundles.spawn_index_workers(
        config.bundles.index_workers,
        config.bundles.index_batch_size,
        shutdown.clone(),
    ));

    let repair = Arc::new(repair);
    worker_handles.push(spawn_periodic(Duration::from_secs(60), shutdown.clone(), move || {
        let repair = Arc::clone(&repair);
        async move {
            let outcome = repair.run_once().await?;
            if outcome.requeued > 0 || outcome.dropped > 0 {
                info!(?outcome, "bundle repair pass complete");
            }
            Ok::<(), ario_gateway_bundles::BundlesError>(())
        }
    }));

    if config.verification.enabled {
        let worker = Arc::new(VerificationWorker::from_config(
            &config,
            bundle_records,
            Arc::clone(&attributes),
            Arc::clone(&data_source),
            Arc::clone(&preferred_roots),
        ));
        worker_handles.push(worker.spawn(config.verification.interval, shutdown.clone()));
    } else {
        info!("verification worker disabled by configuration");
    }

    // HTTP server, the last thing to come up.
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .wrap_err_with(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "ario-gatewayd listening");

    tokio::select! {
        result = axum::serve(listener, router.into_make_service()) => {
            if let Err(err) = result {
                warn!(error = %err, "server loop exited with an error");
            }
        }
        () = shutdown_signal() => {
            info!("shutdown signal received, draining in-flight requests");
        }
    }

    shutdown.cancel();
    for handle in worker_handles {
        handle.abort();
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
