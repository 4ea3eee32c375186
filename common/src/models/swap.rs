// Third party imports
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Một sự kiện Swap đã giải mã, ghi ra file output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRecord {
    /// Unix timestamp của block (giây)
    pub timestamp: u64,
    /// Thời gian ISO-8601 (UTC)
    pub datetime: String,
    /// Số block
    pub block_number: u64,
    /// Hash của transaction
    pub transaction_hash: String,
    /// Vị trí log trong block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
    /// Địa chỉ gửi
    pub sender: String,
    /// Địa chỉ nhận
    pub recipient: String,
    /// Số lượng token0 đã chuẩn hóa theo decimals
    pub amount0: String,
    /// Số lượng token1 đã chuẩn hóa theo decimals
    pub amount1: String,
    /// Giá |amount1 / amount0|, null nếu một phía bằng 0
    pub price: Option<f64>,
    /// Tick của pool sau swap
    pub tick: String,
}

/// Định dạng timestamp thành chuỗi ISO-8601, rỗng nếu timestamp ngoài phạm vi
pub fn iso_datetime(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}
