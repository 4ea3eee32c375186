// External imports
use ethers::{
    abi::RawLog,
    contract::EthEvent,
    types::{Address, Log, H256, I256, U256},
};

// Internal imports
use swapscan_common::{
    models::{swap::iso_datetime, SwapRecord},
    utils::{derive_price, normalize_amount},
};

// Third party imports
use thiserror::Error;

/// Sự kiện Swap của pool Uniswap V3
#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(name = "Swap", abi = "Swap(address,address,int256,int256,uint160,uint128,int24)")]
pub struct SwapEvent {
    #[ethevent(indexed)]
    pub sender: Address,
    #[ethevent(indexed)]
    pub recipient: Address,
    pub amount0: I256,
    pub amount1: I256,
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub tick: i32,
}

/// Lỗi khi giải mã một log
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Log was removed by a chain reorganization")]
    Removed,

    #[error("Log is missing {0}")]
    MissingField(&'static str),

    #[error("ABI decoding failed: {0}")]
    Abi(#[from] ethers::abi::Error),
}

/// Thông tin pool cần để chuẩn hóa số lượng
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSpec {
    pub address: Address,
    pub token0_decimals: u32,
    pub token1_decimals: u32,
}

/// Swap đã giải mã, chưa gắn timestamp của block
#[derive(Debug, Clone)]
pub struct DecodedSwap {
    pub event: SwapEvent,
    pub block_number: u64,
    pub transaction_hash: H256,
    pub log_index: Option<u64>,
}

/// Topic0 của sự kiện Swap
pub fn swap_topic() -> H256 {
    SwapEvent::signature()
}

/// Giải mã một raw log thành `DecodedSwap`
pub fn decode_swap_log(log: &Log) -> Result<DecodedSwap, DecodeError> {
    if log.removed == Some(true) {
        return Err(DecodeError::Removed);
    }

    let block_number = log
        .block_number
        .ok_or(DecodeError::MissingField("block number"))?
        .as_u64();
    let transaction_hash = log
        .transaction_hash
        .ok_or(DecodeError::MissingField("transaction hash"))?;

    let raw = RawLog {
        topics: log.topics.clone(),
        data: log.data.to_vec(),
    };
    let event = <SwapEvent as EthEvent>::decode_log(&raw)?;

    Ok(DecodedSwap {
        event,
        block_number,
        transaction_hash,
        log_index: log.log_index.map(|index| index.as_u64()),
    })
}

impl DecodedSwap {
    /// Tạo bản ghi output với số lượng đã chuẩn hóa và giá
    pub fn into_record(self, pool: &PoolSpec, timestamp: u64) -> SwapRecord {
        let amount0 = normalize_amount(self.event.amount0, pool.token0_decimals);
        let amount1 = normalize_amount(self.event.amount1, pool.token1_decimals);
        let price = derive_price(&amount0, &amount1);

        SwapRecord {
            timestamp,
            datetime: iso_datetime(timestamp),
            block_number: self.block_number,
            transaction_hash: format!("{:?}", self.transaction_hash),
            log_index: self.log_index,
            sender: format!("{:?}", self.event.sender),
            recipient: format!("{:?}", self.event.recipient),
            amount0,
            amount1,
            price,
            tick: self.event.tick.to_string(),
        }
    }
}
