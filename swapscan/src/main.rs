// Standard library imports
use std::{path::PathBuf, process::ExitCode, sync::Arc};

// Internal imports
use swapscan::{
    error_handling::{EXIT_COMPLETE, EXIT_INTERRUPTED, EXIT_STARTUP},
    logging::init_logging,
    CheckpointStore, Config, EndpointSelector, HttpClientFactory, Ingestor, OutputStore,
};

// Third party imports
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "swapscan",
    about = "Ghi lịch sử sự kiện Swap của một pool Uniswap V3 ra file JSON"
)]
struct Cli {
    /// File cấu hình (mặc định: swapscan.toml nếu có)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Block bắt đầu
    #[arg(long)]
    start_block: Option<u64>,

    /// Block kết thúc (mặc định: block mới nhất)
    #[arg(long)]
    end_block: Option<u64>,

    /// File output JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// File checkpoint
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(start) = self.start_block {
            config.start_block = start;
        }
        if let Some(end) = self.end_block {
            config.end_block = Some(end);
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(checkpoint) = &self.checkpoint {
            config.checkpoint_path = checkpoint.clone();
        }
    }
}

fn build_ingestor(config: &Config) -> Result<Ingestor> {
    config.validate().context("Cấu hình không hợp lệ")?;

    let factory = Arc::new(HttpClientFactory::new(config.request_timeout()));
    let selector = EndpointSelector::new(config.endpoints(), factory, config.selector_config());
    let settings = config.ingest_settings()?;

    Ok(Ingestor::new(
        selector,
        OutputStore::new(&config.output_path),
        CheckpointStore::new(&config.checkpoint_path),
        settings,
    ))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_STARTUP);
        }
    };
    cli.apply(&mut config);

    // Giữ guard đến cuối main để log file được flush
    let _guard = match init_logging(&config.log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    let mut ingestor = match build_ingestor(&config) {
        Ok(ingestor) => ingestor,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    info!(
        "Output: {}, checkpoint: {}",
        config.output_path.display(),
        config.checkpoint_path.display()
    );

    tokio::select! {
        result = ingestor.run() => match result {
            Ok(summary) => {
                info!("Done: {} swaps in {}", summary.total_swaps, config.output_path.display());
                ExitCode::from(EXIT_COMPLETE)
            }
            Err(e) => {
                error!("Run halted: {}", e);
                if e.is_resumable() {
                    warn!(
                        "Progress is saved in {}, run again to resume",
                        config.checkpoint_path.display()
                    );
                }
                ExitCode::from(e.exit_code())
            }
        },
        Ok(()) = signal::ctrl_c() => {
            info!("Đã nhận tín hiệu tắt, checkpoint giữ chunk cuối cùng đã ghi");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}
