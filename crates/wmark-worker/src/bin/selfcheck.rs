use std::path::Path;

use wmark_media::{check_ffmpeg, check_ffprobe};
use wmark_worker::BatchConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = BatchConfig::from_env()?;
    let scratch = config.scratch_root();

    println!(
        "wmark-selfcheck: starting with scratch_root={}",
        scratch.display()
    );
    let ffmpeg = check_ffmpeg()?;
    println!("wmark-selfcheck: ffmpeg at {}", ffmpeg.display());
    let ffprobe = check_ffprobe()?;
    println!("wmark-selfcheck: ffprobe at {}", ffprobe.display());
    ensure_writable(&scratch).await?;

    println!("wmark-selfcheck: ok");
    Ok(())
}

async fn ensure_writable(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let probe = tempfile::Builder::new()
        .prefix("wmark-selfcheck-")
        .tempfile_in(path)
        .map_err(|e| anyhow::anyhow!("scratch root {} not writable: {}", path.display(), e))?;
    drop(probe);
    Ok(())
}
