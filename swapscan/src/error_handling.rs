// Internal imports
use crate::chain_adapters::RpcError;
use crate::storage::StorageError;

// Third party imports
use thiserror::Error;

/// Mã thoát khi quét xong toàn bộ khoảng block
pub const EXIT_COMPLETE: u8 = 0;
/// Lỗi cấu hình hoặc khởi động
pub const EXIT_STARTUP: u8 = 1;
/// Dừng do lỗi RPC, chạy lại để tiếp tục
pub const EXIT_RPC_HALT: u8 = 2;
/// Lỗi ghi file output/checkpoint
pub const EXIT_PERSISTENCE: u8 = 3;
/// Bị ngắt bằng Ctrl-C
pub const EXIT_INTERRUPTED: u8 = 130;

/// Lỗi làm dừng một lần quét
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Lỗi ghi output cho block {from}-{to}: {source}")]
    AppendFailure {
        from: u64,
        to: u64,
        #[source]
        source: StorageError,
    },

    #[error("Lỗi trạng thái checkpoint/backup: {0}")]
    State(#[from] StorageError),

    #[error("Chunk {from}-{to} thất bại {failures} lần liên tiếp: {source}")]
    ChunkFailed {
        from: u64,
        to: u64,
        failures: u32,
        #[source]
        source: RpcError,
    },

    #[error("Lỗi RPC: {0}")]
    Rpc(#[from] RpcError),

    #[error("Khoảng block không hợp lệ: start {start} > end {end}")]
    InvalidRange { start: u64, end: u64 },
}

impl IngestError {
    /// Mã thoát của process tương ứng với lỗi
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::AppendFailure { .. } | Self::State(_) => EXIT_PERSISTENCE,
            Self::ChunkFailed { .. } | Self::Rpc(_) => EXIT_RPC_HALT,
            Self::InvalidRange { .. } => EXIT_STARTUP,
        }
    }

    /// Chạy lại có thể tiếp tục từ checkpoint
    pub fn is_resumable(&self) -> bool {
        self.exit_code() == EXIT_RPC_HALT
    }
}
