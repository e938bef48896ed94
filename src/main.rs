use anyhow::Result;
use quote_shorts::generator::run_generation;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    run_generation(config_path.as_deref()).await
}
