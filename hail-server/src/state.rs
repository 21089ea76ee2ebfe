//! Shared application state.

use crate::config::Config;
use hail_core::PipelineMetrics;
use hail_ingest::LocationProducer;
use hail_realtime::{DriverGateway, UserGateway};
use hail_store::{BatchBackend, DynamoStore, LocationStore, MemoryStore};
use std::sync::Arc;

/// Storage backend in use.
///
/// The server runs against DynamoDB in production and the in-memory store
/// for local development; both sides of the pipeline (batched writes, cell
/// queries) come from the same backend.
#[derive(Clone)]
pub enum StoreBackend {
    Dynamo(Arc<DynamoStore>),
    Memory(Arc<MemoryStore>),
}

impl StoreBackend {
    pub fn location_store(&self) -> Arc<dyn LocationStore> {
        match self {
            StoreBackend::Dynamo(s) => s.clone(),
            StoreBackend::Memory(s) => s.clone(),
        }
    }

    pub fn batch_backend(&self) -> Arc<dyn BatchBackend> {
        match self {
            StoreBackend::Dynamo(s) => s.clone(),
            StoreBackend::Memory(s) => s.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StoreBackend::Dynamo(_) => "dynamodb",
            StoreBackend::Memory(_) => "memory",
        }
    }
}

/// State shared across HTTP handlers and background tasks.
pub struct AppState {
    pub config: Config,
    pub producer: LocationProducer,
    pub user_gateway: UserGateway,
    pub driver_gateway: Arc<DriverGateway>,
    pub metrics: Arc<PipelineMetrics>,
}
