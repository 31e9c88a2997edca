use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use insertbench::config::Config;
use insertbench::runner::{BenchRun, run_benchmark};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(config.log_level.clone())
        .with_writer(std::io::stderr)
        .init();

    info!("insertbench v{}", env!("CARGO_PKG_VERSION"));

    config.validate()?;

    // First ctrl-c stops scheduling new inserts, the second exits
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, waiting for in-flight inserts to settle");
                shutdown.cancel();
            }
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        });
    }

    for &backend in &config.backends {
        for &total in &config.counts {
            let target = backend
                .connect(&config, total)
                .await
                .with_context(|| format!("Failed to connect to {}", backend))?;

            let run = BenchRun::from_config(&config, total).with_cancellation(shutdown.clone());
            let report = match run_benchmark(target, &run).await {
                Ok(report) => report,
                Err(e) => {
                    error!(backend = %backend, total, kind = e.kind(), "Benchmark failed: {}", e);
                    return Err(e).with_context(|| format!("{} batch of {} inserts failed", backend, total));
                }
            };

            println!("{}", report.render(config.format));
        }
    }

    Ok(())
}
