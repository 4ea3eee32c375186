// Third party imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tiến độ đã xử lý, ghi lại sau mỗi chunk để chạy tiếp khi khởi động lại
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Block cuối cùng đã xử lý xong
    pub last_processed_block: u64,
    /// Tổng số swap đã ghi vào file output
    pub total_swaps: u64,
    /// Thời điểm ghi checkpoint
    pub timestamp: DateTime<Utc>,
    /// Block bắt đầu của lần quét
    pub start_block: u64,
    /// Block kết thúc của lần quét
    pub end_block: u64,
}

impl Checkpoint {
    pub fn new(
        last_processed_block: u64,
        total_swaps: u64,
        start_block: u64,
        end_block: u64,
    ) -> Self {
        Self {
            last_processed_block,
            total_swaps,
            timestamp: Utc::now(),
            start_block,
            end_block,
        }
    }

    /// Block tiếp theo cần quét, không bao giờ nhỏ hơn `start_block`
    pub fn resume_block(&self, start_block: u64) -> u64 {
        self.last_processed_block.saturating_add(1).max(start_block)
    }
}
