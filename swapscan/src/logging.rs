// Standard library imports
use std::path::Path;

// Third party imports
use anyhow::{Context, Result};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

/// Thiết lập logging ra stderr và file xoay vòng theo ngày trong `log_dir`.
///
/// Guard trả về phải được giữ đến khi process kết thúc để log file được flush.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Không tạo được thư mục log {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "swapscan.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::Layer::new().with_writer(std::io::stderr).with_ansi(true))
        .with(
            fmt::Layer::new()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE),
        )
        .try_init()
        .context("Không khởi tạo được tracing subscriber")?;

    Ok(guard)
}
