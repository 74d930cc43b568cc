use anyhow::Result;
use clap::Parser;
use rivalscope::cli::Args;
use rivalscope::generator::workflow::launch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let request = args.to_request();
    let config = args.into_config()?;

    // RUST_LOG优先，否则由--verbose决定日志级别
    let default_level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rivalscope={}", default_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let payload = launch(&config, &request).await?;
    println!(
        "📊 {} competitors analysed ({:?}), report saved to {}",
        payload.competitors.len(),
        payload.status,
        config.output_path.display()
    );

    Ok(())
}
