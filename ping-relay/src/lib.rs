pub mod api;
pub mod config;
pub mod errors;
pub mod guard;
pub mod invoker;
pub mod metrics_defs;
pub mod outcome;
pub mod registry;
pub mod relay;

#[cfg(test)]
mod testutils;

use errors::RelayError;
use invoker::HttpInvoker;
use registry::StaticRegistry;
use relay::PingRelay;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;

/// Runs the client API and the admin listener until either fails.
pub async fn run(config: config::Config) -> Result<(), RelayError> {
    config.validate()?;

    tracing::info!(
        "Loading {} appservice registrations, ping timeout {}s",
        config.appservices.len(),
        config.ping.timeout_secs
    );
    let registry = StaticRegistry::new(config.appservices);
    let invoker = HttpInvoker::new(config.ping.timeout(), config.ping.max_error_body_bytes)?;
    let relay = PingRelay::new(Arc::new(registry), Arc::new(invoker));

    // Ready once the registry is loaded and the API listener is bound.
    let ready = Arc::new(AtomicBool::new(false));

    let addr = format!("{}:{}", config.listener.host, config.listener.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Ping relay listening on {addr}");
    ready.store(true, Ordering::Relaxed);

    let api_task = api::serve(listener, relay);

    let ready_clone = ready.clone();
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new(move || ready_clone.load(Ordering::Relaxed)),
    );

    tokio::try_join!(api_task, admin_task)?;
    Ok(())
}
