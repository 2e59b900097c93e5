//! Batch watermark replacement binary.

use clap::Parser;
use tracing::{error, info};

use wmark_media::check_environment;
use wmark_worker::{init_tracing, BatchArgs, BatchConfig, BatchOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = BatchArgs::parse();
    init_tracing();

    let config = BatchConfig::from_env()?.with_args(args)?;
    info!("Batch config: {:?}", config);

    // Nothing can be processed without ffmpeg/ffprobe
    if let Err(e) = check_environment() {
        error!("Environment check failed: {}", e);
        eprintln!("wmark-batch: {}. Install FFmpeg and make sure it is on PATH.", e);
        std::process::exit(2);
    }

    let limit = config.limit;
    let report_path = config.report_path.clone();
    let orchestrator = BatchOrchestrator::new(config);

    let report = match orchestrator.run(limit).await {
        Ok(report) => report,
        Err(e) => {
            error!("Batch aborted: {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", report);

    if let Some(path) = report_path {
        report.write_json(&path).await?;
        info!(path = %path.display(), "JSON report written");
    }

    Ok(())
}
