//! Mô hình dữ liệu dùng chung giữa các crate của swapscan

pub mod checkpoint;
pub mod chunk;
pub mod swap;

pub use checkpoint::Checkpoint;
pub use chunk::{ChunkPlan, ChunkRange};
pub use swap::SwapRecord;
