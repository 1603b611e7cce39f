mod config;
mod logging;
mod statsd;

use clap::Parser;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(about = "Relays appservice pings from clients to registered appservices")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "relay.yaml")]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let config = match config::Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            process::exit(1);
        }
    };

    let _sentry_guard = logging::init(config.common.logging.as_ref());

    if let Some(metrics_config) = &config.common.metrics {
        if let Err(e) = statsd::init(metrics_config) {
            tracing::error!("Failed to initialize metrics: {e}");
            process::exit(1);
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("ping-relay")
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to build runtime: {e}");
            process::exit(1);
        }
    };

    tracing::info!("Starting ping relay");
    if let Err(e) = runtime.block_on(ping_relay::run(config.ping_relay)) {
        tracing::error!("Ping relay stopped: {e}");
        process::exit(1);
    }
}
