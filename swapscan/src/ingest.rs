// External imports
use ethers::types::Filter;

// Standard library imports
use std::{collections::HashMap, time::Duration};

// Internal imports
use crate::{
    chain_adapters::{EndpointSelector, RpcError},
    decoder::{decode_swap_log, swap_topic, PoolSpec},
    error_handling::IngestError,
    storage::{CheckpointStore, OutputStore},
};
use swapscan_common::models::{Checkpoint, ChunkPlan, ChunkRange, SwapRecord};

// Third party imports
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Tham số của một lần quét
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub pool: PoolSpec,
    pub start_block: u64,
    /// `None` nghĩa là quét đến block mới nhất lúc khởi động
    pub end_block: Option<u64>,
    pub chunk_size: u64,
    /// Nghỉ giữa hai chunk thành công
    pub chunk_delay: Duration,
    /// Nghỉ trước khi thử lại chunk lỗi
    pub chunk_retry_delay: Duration,
    pub max_chunk_failures: u32,
    /// Số lần thử cho mỗi request RPC
    pub max_attempts: u32,
}

/// Bộ đếm trong lúc chạy
#[derive(Debug, Clone, Default)]
struct IngestStats {
    chunks: u64,
    swaps_written: u64,
    decode_failures: u64,
    chunk_retries: u64,
}

/// Kết quả của một lần quét hoàn tất
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub start_block: u64,
    pub end_block: u64,
    /// Block bắt đầu thực tế sau khi đọc checkpoint
    pub resumed_from: u64,
    pub chunks: u64,
    pub swaps_written: u64,
    pub decode_failures: u64,
    pub chunk_retries: u64,
    /// Tổng số bản ghi trong file output
    pub total_swaps: u64,
    pub elapsed: Duration,
}

/// Vị trí tiếp tục sau khi đối chiếu checkpoint với file output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResumePoint {
    next_block: u64,
    total_swaps: u64,
}

/// Kết quả của một chunk trước khi ghi ra file
struct ChunkBatch {
    records: Vec<SwapRecord>,
    decode_failures: u64,
}

/// Quét log Swap theo từng chunk, ghi nối tiếp vào file output và lưu checkpoint
pub struct Ingestor {
    selector: EndpointSelector,
    output: OutputStore,
    checkpoints: CheckpointStore,
    settings: IngestSettings,
    stats: IngestStats,
}

impl Ingestor {
    pub fn new(
        selector: EndpointSelector,
        output: OutputStore,
        checkpoints: CheckpointStore,
        settings: IngestSettings,
    ) -> Self {
        Self {
            selector,
            output,
            checkpoints,
            settings,
            stats: IngestStats::default(),
        }
    }

    /// Chạy đến hết khoảng block; checkpoint bị xóa khi hoàn tất
    pub async fn run(&mut self) -> Result<RunSummary, IngestError> {
        let started = Instant::now();
        self.stats = IngestStats::default();

        let start = self.settings.start_block;
        let end = self.resolve_end_block().await?;
        if start > end {
            return Err(IngestError::InvalidRange { start, end });
        }

        let resume = self.initialize(end).await?;
        let plan = ChunkPlan::new(resume.next_block, end, self.settings.chunk_size);
        let mut remaining = plan.remaining();
        info!(
            "Scanning pool {:?} blocks {}-{} ({} chunks of {}), {} swaps already stored",
            self.settings.pool.address,
            resume.next_block,
            end,
            remaining,
            self.settings.chunk_size,
            resume.total_swaps
        );

        let mut total = resume.total_swaps;
        for range in plan {
            total = self.process_chunk_with_retry(range, total, end).await?;
            remaining = remaining.saturating_sub(1);

            if remaining > 0 && !self.settings.chunk_delay.is_zero() {
                tokio::time::sleep(self.settings.chunk_delay).await;
            }
        }

        self.output.ensure_exists().await?;
        self.checkpoints.clear().await?;

        let summary = RunSummary {
            start_block: start,
            end_block: end,
            resumed_from: resume.next_block,
            chunks: self.stats.chunks,
            swaps_written: self.stats.swaps_written,
            decode_failures: self.stats.decode_failures,
            chunk_retries: self.stats.chunk_retries,
            total_swaps: total,
            elapsed: started.elapsed(),
        };
        info!(
            "Completed blocks {}-{}: {} chunks, {} new swaps, {} decode failures, \
             {} chunk retries, {} total swaps in {:?}",
            summary.start_block,
            summary.end_block,
            summary.chunks,
            summary.swaps_written,
            summary.decode_failures,
            summary.chunk_retries,
            summary.total_swaps,
            summary.elapsed
        );
        Ok(summary)
    }

    async fn resolve_end_block(&mut self) -> Result<u64, IngestError> {
        if let Some(end) = self.settings.end_block {
            return Ok(end);
        }

        let head = self
            .selector
            .execute_with_retry("eth_blockNumber", self.settings.max_attempts, |client| async move {
                client.block_number().await
            })
            .await?;
        info!("No end block configured, scanning up to chain head {}", head);
        Ok(head)
    }

    /// Đọc checkpoint, đối chiếu với file output và quyết định block bắt đầu.
    ///
    /// File hỏng được đổi tên sang bản backup thay vì ghi đè. Output có nhiều bản ghi
    /// hơn checkpoint (dừng giữa lúc ghi output và ghi checkpoint) bị cắt bớt; output
    /// có ít bản ghi hơn thì cả hai file được backup và quét lại từ đầu.
    async fn initialize(&mut self, end: u64) -> Result<ResumePoint, IngestError> {
        let start = self.settings.start_block;
        let fresh = ResumePoint {
            next_block: start,
            total_swaps: 0,
        };

        let checkpoint = match self.checkpoints.load().await {
            Ok(checkpoint) => checkpoint,
            Err(e) if e.is_corrupt() => {
                warn!("Checkpoint is unreadable, starting over: {}", e);
                self.checkpoints.backup("corrupt").await?;
                None
            }
            Err(e) => return Err(e.into()),
        };

        let checkpoint = match checkpoint {
            Some(checkpoint) if checkpoint.start_block != start => {
                warn!(
                    "Ignoring checkpoint written for start block {}, configured start is {}",
                    checkpoint.start_block, start
                );
                self.checkpoints.backup("stale").await?;
                None
            }
            other => other,
        };

        let stored = match self.output.count_records().await {
            Ok(count) => count as u64,
            Err(e) if e.is_corrupt() => {
                warn!("Output file is unreadable, starting a new one: {}", e);
                self.output.backup("corrupt").await?;
                0
            }
            Err(e) => return Err(e.into()),
        };

        let Some(checkpoint) = checkpoint else {
            if stored > 0 {
                warn!(
                    "Found {} records without a checkpoint, moving previous output aside",
                    stored
                );
                self.output.backup("previous").await?;
            }
            return Ok(fresh);
        };

        if stored < checkpoint.total_swaps {
            error!(
                "Output holds {} records, checkpoint expects {}; backing up both, starting over",
                stored, checkpoint.total_swaps
            );
            self.output.backup("mismatch").await?;
            self.checkpoints.backup("mismatch").await?;
            return Ok(fresh);
        }

        if stored > checkpoint.total_swaps {
            warn!(
                "Output holds {} records, checkpoint has {}; dropping the uncommitted tail",
                stored, checkpoint.total_swaps
            );
            let keep = usize::try_from(checkpoint.total_swaps).unwrap_or(usize::MAX);
            self.output.truncate(keep).await?;
        }

        let next_block = checkpoint.resume_block(start);
        info!(
            "Resuming after block {} with {} swaps stored (target end {}, previous target {})",
            checkpoint.last_processed_block, checkpoint.total_swaps, end, checkpoint.end_block
        );
        Ok(ResumePoint {
            next_block,
            total_swaps: checkpoint.total_swaps,
        })
    }

    /// Xử lý một chunk, thử lại sau mỗi lần lỗi RPC. Trả về tổng số bản ghi mới.
    async fn process_chunk_with_retry(
        &mut self,
        range: ChunkRange,
        total: u64,
        end: u64,
    ) -> Result<u64, IngestError> {
        let start = self.settings.start_block;
        let mut failures = 0u32;

        loop {
            let source = match self.collect_chunk(range).await {
                Ok(batch) => return self.commit_chunk(range, batch, total, end).await,
                Err(e) => e,
            };

            failures += 1;
            self.stats.chunk_retries += 1;
            warn!(
                "Chunk {}-{} failed ({}/{}): {}",
                range.from, range.to, failures, self.settings.max_chunk_failures, source
            );

            if range.from > 0 {
                self.checkpoints
                    .save(&Checkpoint::new(range.from - 1, total, start, end))
                    .await?;
            }

            if failures >= self.settings.max_chunk_failures {
                return Err(IngestError::ChunkFailed {
                    from: range.from,
                    to: range.to,
                    failures,
                    source,
                });
            }

            tokio::time::sleep(self.settings.chunk_retry_delay).await;
        }
    }

    async fn commit_chunk(
        &mut self,
        range: ChunkRange,
        batch: ChunkBatch,
        total: u64,
        end: u64,
    ) -> Result<u64, IngestError> {
        // Chunk rỗng không cần ghi lại file output
        let total = if batch.records.is_empty() {
            total
        } else {
            self.output
                .append(&batch.records)
                .await
                .map_err(|source| IngestError::AppendFailure {
                    from: range.from,
                    to: range.to,
                    source,
                })? as u64
        };

        self.checkpoints
            .save(&Checkpoint::new(range.to, total, self.settings.start_block, end))
            .await?;

        self.stats.chunks += 1;
        self.stats.swaps_written += batch.records.len() as u64;
        self.stats.decode_failures += batch.decode_failures;
        info!(
            "Blocks {}-{}: {} swaps (total {})",
            range.from,
            range.to,
            batch.records.len(),
            total
        );
        Ok(total)
    }

    /// Lấy logs, giải mã và gắn timestamp cho một chunk
    async fn collect_chunk(&mut self, range: ChunkRange) -> Result<ChunkBatch, RpcError> {
        let pool = self.settings.pool;
        let max_attempts = self.settings.max_attempts;
        let filter = Filter::new()
            .address(pool.address)
            .topic0(swap_topic())
            .from_block(range.from)
            .to_block(range.to);

        let logs = self
            .selector
            .execute_with_retry("eth_getLogs", max_attempts, |client| {
                let filter = filter.clone();
                async move { client.get_logs(&filter).await }
            })
            .await?;

        let mut decode_failures = 0u64;
        let mut swaps = Vec::with_capacity(logs.len());
        for log in &logs {
            match decode_swap_log(log) {
                Ok(swap) => swaps.push(swap),
                Err(e) => {
                    decode_failures += 1;
                    warn!(
                        "Skipping undecodable log in tx {:?} (block {:?}): {}",
                        log.transaction_hash, log.block_number, e
                    );
                }
            }
        }
        swaps.sort_by_key(|swap| (swap.block_number, swap.log_index));

        let mut timestamps: HashMap<u64, u64> = HashMap::new();
        let mut records = Vec::with_capacity(swaps.len());
        for swap in swaps {
            let block = swap.block_number;
            let timestamp = match timestamps.get(&block) {
                Some(timestamp) => *timestamp,
                None => {
                    let timestamp = self
                        .selector
                        .execute_with_retry("eth_getBlockByNumber", max_attempts, |client| {
                            async move { client.block_timestamp(block).await }
                        })
                        .await?;
                    timestamps.insert(block, timestamp);
                    timestamp
                }
            };
            records.push(swap.into_record(&pool, timestamp));
        }

        debug!(
            "Chunk {}-{}: {} logs, {} decoded, {} blocks",
            range.from,
            range.to,
            logs.len(),
            records.len(),
            timestamps.len()
        );
        Ok(ChunkBatch {
            records,
            decode_failures,
        })
    }
}
