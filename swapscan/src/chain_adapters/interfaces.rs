// External imports
use ethers::types::{Filter, Log};

// Standard library imports
use std::sync::Arc;

// Third party imports
use async_trait::async_trait;
use thiserror::Error;

/// Lỗi trả về từ một RPC endpoint cụ thể
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Lỗi kết nối đến RPC
    #[error("Connection error ({url}): {message}")]
    Connection { url: String, message: String },

    /// Lỗi timeout khi chờ kết quả
    #[error("Request to {url} timed out after {timeout_ms} ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// Lỗi quá giới hạn tần suất của RPC
    #[error("Rate limit exceeded for endpoint: {0}")]
    RateLimited(String),

    /// Node không trả về block
    #[error("Block {0} not found")]
    BlockNotFound(u64),

    /// URL không hợp lệ
    #[error("Invalid endpoint {url}: {message}")]
    InvalidEndpoint { url: String, message: String },
}

/// Lỗi của lớp chọn endpoint và retry
#[derive(Error, Debug)]
pub enum RpcError {
    /// Đã thử hết danh sách endpoint trong một lượt
    #[error("All {endpoints} RPC endpoints are unavailable")]
    AllEndpointsUnavailable { endpoints: usize },

    /// Toàn bộ pool vẫn hỏng sau khi đã chờ hết số lần cho phép
    #[error("RPC pool still exhausted after {waits} outage waits during '{operation}'")]
    PoolExhausted { operation: String, waits: u32 },

    /// Hết số lần thử cho một thao tác
    #[error("'{operation}' failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: ChainError,
    },

    /// Không có endpoint nào được cấu hình
    #[error("No RPC endpoints configured")]
    EmptyPool,
}

/// Các thao tác đọc cần thiết trên một node JSON-RPC
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// URL của endpoint
    fn url(&self) -> &str;

    /// Block hiện tại của chain
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Lấy logs theo filter
    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ChainError>;

    /// Timestamp (giây) của block
    async fn block_timestamp(&self, number: u64) -> Result<u64, ChainError>;
}

/// Tạo client cho một URL endpoint
pub trait ClientFactory: Send + Sync {
    fn connect(&self, url: &str) -> Result<Arc<dyn ChainClient>, ChainError>;
}
