use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pitchtrack::pipeline;
use pitchtrack::Config;

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pitchtrack={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(config = %config_path, input = %config.video.input_dir, "starting analysis");
    pipeline::run(&config)?;
    Ok(())
}
