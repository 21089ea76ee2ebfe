//! Hail dispatch server.
//!
//! The binary crate that wires the whole pipeline together: store backend
//! and batched writer, per-city ingestion consumers, the matching service,
//! the realtime gateways, the HTTP surface, a periodic metrics reporter,
//! and signal-driven graceful shutdown.

pub mod config;
pub mod error;
pub mod reporter;
pub mod routes;
pub mod service;
pub mod state;
pub mod telemetry;

pub use config::{Config, StorageKind};
pub use error::{Result, ServerError};
pub use service::MatchService;
pub use state::{AppState, StoreBackend};

use axum::Router;
use hail_core::PipelineMetrics;
use hail_ingest::{LocationConsumer, LocationProducer, RequestConsumer, RequestDispatcher};
use hail_match::{MatchConfig, MatchEngine};
use hail_realtime::{
    DriverGateway, DriverRegistry, MatchPublisher, OfferDispatcher, RedisConfig, UserGateway,
};
use hail_store::{BatchConfig, BatchWriter, DynamoStore, MemoryStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// Grace window for draining consumers and the batch writer after a signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Metrics report interval.
const REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// The assembled dispatch server.
pub struct HailServer {
    state: Arc<AppState>,
    router: Router,
    store: StoreBackend,
    writer: BatchWriter,
    match_service: Arc<MatchService>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl HailServer {
    /// Build every component from config.
    ///
    /// Fatal here means fatal for the process: an unreachable required
    /// store or a broken client configuration prevents startup entirely.
    pub async fn new(config: Config) -> Result<Self> {
        let metrics = Arc::new(PipelineMetrics::new());

        let store = match config.storage {
            StorageKind::Dynamodb => {
                let dynamo = DynamoStore::connect(config.dynamo_config()).await?;
                dynamo.ensure_table().await?;
                StoreBackend::Dynamo(Arc::new(dynamo))
            }
            StorageKind::Memory => StoreBackend::Memory(Arc::new(MemoryStore::new())),
        };

        let writer = BatchWriter::new(
            store.batch_backend(),
            BatchConfig::default(),
            metrics.clone(),
        );

        let producer = LocationProducer::new(
            &config.kafka.brokers.join(","),
            &config.kafka.topic_format,
        )?;

        let redis_config = RedisConfig {
            url: config.redis.url.clone(),
            ..RedisConfig::default()
        };
        let publisher = MatchPublisher::connect(&redis_config).await?;
        let user_gateway = UserGateway::new(&config.redis.url)?;

        let registry = Arc::new(DriverRegistry::new());
        let driver_gateway = Arc::new(DriverGateway::new(registry, metrics.clone()));

        let engine = MatchEngine::new(
            store.location_store(),
            MatchConfig {
                min_drivers: config.matching.min_drivers_to_return,
                max_distance_km: config.matching.max_distance_km,
                score_seed: 0,
            },
        );
        let dispatcher = OfferDispatcher::new(config.notification_url());
        let match_service = Arc::new(MatchService::new(
            engine,
            publisher,
            dispatcher,
            metrics.clone(),
        ));

        let state = Arc::new(AppState {
            config,
            producer,
            user_gateway,
            driver_gateway,
            metrics,
        });
        let router = routes::build_router(state.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(HailServer {
            state,
            router,
            store,
            writer,
            match_service,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Shared state (for tests).
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Active storage backend (for tests).
    pub fn store(&self) -> &StoreBackend {
        &self.store
    }

    /// Run until `SIGINT`/`SIGTERM`, then drain within the grace window.
    pub async fn run(self) -> Result<()> {
        let HailServer {
            state,
            router,
            store,
            writer,
            match_service,
            shutdown_tx,
            shutdown_rx,
        } = self;
        let config = &state.config;

        let mut workers = Vec::new();
        for cluster in config.location_clusters() {
            let consumer = LocationConsumer::new(
                cluster,
                &config.kafka.group_id,
                writer.clone(),
                state.metrics.clone(),
                shutdown_rx.clone(),
            )?;
            workers.push(tokio::spawn(consumer.run()));
        }

        let pool = RequestDispatcher::new(match_service, config.match_pool());
        let request_group = format!("{}-matching", config.kafka.group_id);
        for cluster in config.request_clusters() {
            let consumer = RequestConsumer::new(
                cluster,
                &request_group,
                pool.clone(),
                state.metrics.clone(),
                shutdown_rx.clone(),
            )?;
            workers.push(tokio::spawn(consumer.run()));
        }

        workers.push(tokio::spawn(reporter::run(
            state.metrics.clone(),
            REPORT_INTERVAL,
            shutdown_rx.clone(),
        )));

        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = TcpListener::bind(addr).await?;
        info!(
            addr = %addr,
            storage = store.kind(),
            cities = config.location_clusters().len(),
            "hail server started"
        );

        {
            let shutdown_tx = shutdown_tx.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            });
        }

        let mut graceful = shutdown_rx.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = graceful.changed().await;
            })
            .await?;

        // Consumers exit at their next poll; the writer flushes or counts
        // whatever is still buffered.
        let drain = async {
            writer.shutdown().await;
            for handle in workers {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!("shutdown grace period elapsed with tasks still running");
        }
        info!("shutdown complete");
        Ok(())
    }
}

/// Resolves on `SIGINT` or `SIGTERM`.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
