use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webp_convert::cli::{self, CliArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let default_filter = if args.verbose {
        "webp_convert=debug"
    } else {
        "webp_convert=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting webp-convert");

    match cli::run(&args).await {
        Ok(summary) => {
            info!(
                "Finished: {} converted, {} failed",
                summary.converted, summary.failed
            );
            Ok(())
        }
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
