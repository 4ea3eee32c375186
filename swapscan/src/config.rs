// External imports
use ethers::types::Address;

// Standard library imports
use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

// Internal imports
use crate::{
    chain_adapters::{RetryConfig, SelectorConfig},
    decoder::PoolSpec,
    ingest::IngestSettings,
};

// Third party imports
use config::{Environment, File};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pool WBTC/USDC 0.3% trên Uniswap V3
pub const DEFAULT_POOL_ADDRESS: &str = "0x99ac8cA7087fA4A2A1FB6357269965A2014ABc35";
/// Block tạo pool mặc định
pub const DEFAULT_START_BLOCK: u64 = 12_369_621;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Không đọc được cấu hình: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Cấu hình không hợp lệ: {0}")]
    Invalid(String),
}

/// Cấu hình của swapscan, đọc từ `swapscan.toml` và biến môi trường `SWAPSCAN_*`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    // RPC
    pub rpc_urls: Vec<String>,

    // Pool
    pub pool_address: String,
    pub token0_decimals: u32,
    pub token1_decimals: u32,

    // Khoảng block
    pub start_block: u64,
    pub end_block: Option<u64>,

    // Chunk
    pub chunk_size: u64,
    pub chunk_delay_ms: u64,
    pub chunk_retry_delay_ms: u64,
    pub max_chunk_failures: u32,

    // Retry
    pub max_attempts: u32,
    pub retry_unit_ms: u64,
    pub outage_initial_ms: u64,
    pub outage_max_ms: u64,
    pub max_outage_waits: u32,
    pub failed_reset_secs: u64,
    pub probe_timeout_ms: u64,
    pub request_timeout_ms: u64,

    // File
    pub output_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_urls: vec![
                "https://eth.llamarpc.com".to_string(),
                "https://rpc.ankr.com/eth".to_string(),
                "https://ethereum-rpc.publicnode.com".to_string(),
                "https://cloudflare-eth.com".to_string(),
            ],
            pool_address: DEFAULT_POOL_ADDRESS.to_string(),
            token0_decimals: 8,
            token1_decimals: 6,
            start_block: DEFAULT_START_BLOCK,
            end_block: None,
            chunk_size: 1000,
            chunk_delay_ms: 500,
            chunk_retry_delay_ms: 10_000,
            max_chunk_failures: 10,
            max_attempts: 3,
            retry_unit_ms: 2000,
            outage_initial_ms: 30_000,
            outage_max_ms: 300_000,
            max_outage_waits: 5,
            failed_reset_secs: 600,
            probe_timeout_ms: 5000,
            request_timeout_ms: 30_000,
            output_path: PathBuf::from("swaps.json"),
            checkpoint_path: PathBuf::from("swaps_progress.json"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Config {
    /// Đọc cấu hình: `.env`, file cấu hình rồi biến môi trường
    ///
    /// Không có `path` thì `swapscan.toml` trong thư mục hiện tại là tùy chọn.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv().ok();

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("swapscan").required(false),
        };

        let config: Config = config::Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("SWAPSCAN")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("rpc_urls")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_urls.iter().all(|url| url.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "rpc_urls must contain at least one endpoint".to_string(),
            ));
        }
        self.pool_address()?;
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".to_string()));
        }
        if self.max_chunk_failures == 0 {
            return Err(ConfigError::Invalid(
                "max_chunk_failures must be at least 1".to_string(),
            ));
        }
        // 10^77 là lũy thừa lớn nhất của 10 nằm trong U256
        if self.token0_decimals > 77 || self.token1_decimals > 77 {
            return Err(ConfigError::Invalid("token decimals must not exceed 77".to_string()));
        }
        if let Some(end) = self.end_block {
            if end < self.start_block {
                return Err(ConfigError::Invalid(format!(
                    "end_block {} is before start_block {}",
                    end, self.start_block
                )));
            }
        }
        // Phải chờ đủ lâu để endpoint lỗi được kiểm tra lại trước khi bỏ cuộc
        let selector = self.selector_config();
        if !selector.outage_covers_reset() {
            return Err(ConfigError::Invalid(format!(
                "outage waits total {:?} ({} waits), below failed_reset_secs = {}",
                selector.retry.total_outage_wait(),
                self.max_outage_waits,
                self.failed_reset_secs
            )));
        }
        Ok(())
    }

    pub fn pool_address(&self) -> Result<Address, ConfigError> {
        Address::from_str(self.pool_address.trim()).map_err(|e| {
            ConfigError::Invalid(format!("invalid pool_address '{}': {}", self.pool_address, e))
        })
    }

    /// Danh sách URL đã bỏ khoảng trắng và mục rỗng
    pub fn endpoints(&self) -> Vec<String> {
        self.rpc_urls
            .iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn selector_config(&self) -> SelectorConfig {
        SelectorConfig {
            failed_reset_interval: Duration::from_secs(self.failed_reset_secs),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            retry: RetryConfig {
                retry_unit: Duration::from_millis(self.retry_unit_ms),
                outage_initial: Duration::from_millis(self.outage_initial_ms),
                outage_max_interval: Duration::from_millis(self.outage_max_ms),
                max_outage_waits: self.max_outage_waits,
                ..RetryConfig::default()
            },
        }
    }

    pub fn ingest_settings(&self) -> Result<IngestSettings, ConfigError> {
        Ok(IngestSettings {
            pool: PoolSpec {
                address: self.pool_address()?,
                token0_decimals: self.token0_decimals,
                token1_decimals: self.token1_decimals,
            },
            start_block: self.start_block,
            end_block: self.end_block,
            chunk_size: self.chunk_size,
            chunk_delay: Duration::from_millis(self.chunk_delay_ms),
            chunk_retry_delay: Duration::from_millis(self.chunk_retry_delay_ms),
            max_chunk_failures: self.max_chunk_failures,
            max_attempts: self.max_attempts,
        })
    }
}
