// Swapscan - Copyright (c) 2023

// Public modules
pub mod chain_adapters;
pub mod config;
pub mod decoder;
pub mod error_handling;
pub mod ingest;
pub mod logging;
pub mod storage;

#[cfg(test)]
pub(crate) mod tests;

// Re-export core types
pub use chain_adapters::{
    ChainClient, ChainError, EndpointSelector, HttpClientFactory, RpcError, SelectorConfig,
};
pub use config::{Config, ConfigError};
pub use decoder::{decode_swap_log, DecodeError, PoolSpec, SwapEvent};
pub use error_handling::IngestError;
pub use ingest::{IngestSettings, Ingestor, RunSummary};
pub use storage::{CheckpointStore, OutputStore, StorageError};
