use crate::guard::authorize;
use crate::invoker::PingInvoker;
use crate::metrics_defs::{PING_DURATION, PING_REQUESTS, PINGS_INFLIGHT};
use crate::outcome::PingOutcome;
use crate::registry::{Registry, Resolution};
use shared::{counter, gauge, histogram};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A ping as received from a client.
#[derive(Clone, Debug)]
pub struct PingRequest {
    pub appservice_id: String,
    pub transaction_id: Option<String>,
    pub caller_token: String,
}

/// Runs the ping pipeline: authorize, resolve the push URL, probe, classify.
///
/// Pings share nothing but the in-flight count, so one instance is shared by
/// all requests.
#[derive(Clone)]
pub struct PingRelay {
    registry: Arc<dyn Registry>,
    invoker: Arc<dyn PingInvoker>,
    inflight: Arc<AtomicUsize>,
}

impl PingRelay {
    pub fn new(registry: Arc<dyn Registry>, invoker: Arc<dyn PingInvoker>) -> Self {
        PingRelay {
            registry,
            invoker,
            inflight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of probes currently waiting on an appservice.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    pub async fn ping(&self, request: &PingRequest) -> PingOutcome {
        let outcome = self.run(request).await;

        match &outcome {
            PingOutcome::Success { duration_ms } => {
                tracing::info!(
                    "Pinged appservice {} in {duration_ms}ms",
                    request.appservice_id
                );
                histogram!(PING_DURATION).record(*duration_ms as f64 / 1000.0);
            }
            PingOutcome::ConnectionFailed { detail } => {
                tracing::warn!(
                    "Ping to appservice {} failed to connect: {detail}",
                    request.appservice_id
                );
            }
            other => {
                tracing::info!(
                    "Ping to appservice {} failed: {}",
                    request.appservice_id,
                    other.name()
                );
            }
        }
        counter!(PING_REQUESTS, "outcome" => outcome.name()).increment(1);

        outcome
    }

    async fn run(&self, request: &PingRequest) -> PingOutcome {
        let appservice = match authorize(
            self.registry.as_ref(),
            &request.caller_token,
            &request.appservice_id,
        ) {
            Ok(appservice) => appservice,
            Err(e) => {
                tracing::debug!("Rejecting ping for {}: {e}", request.appservice_id);
                return e.into();
            }
        };

        let target = match self.registry.resolve(&appservice.id) {
            Resolution::Configured(target) => target,
            Resolution::NotConfigured => return PingOutcome::UrlNotConfigured,
        };

        let _inflight = InflightGuard::new(self.inflight.clone());
        let result = self
            .invoker
            .invoke(&target, request.transaction_id.as_deref())
            .await;

        PingOutcome::from_probe(result)
    }
}

// Decrements on drop, so cancelled probes are accounted for too.
struct InflightGuard {
    count: Arc<AtomicUsize>,
}

impl InflightGuard {
    fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        gauge!(PINGS_INFLIGHT).increment(1.0);
        InflightGuard { count }
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
        gauge!(PINGS_INFLIGHT).decrement(1.0);
    }
}
