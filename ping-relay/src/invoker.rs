use crate::registry::PushTarget;
use async_trait::async_trait;
use serde::Serialize;
use std::error::Error as StdError;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout_at;

/// Path of the ping endpoint, relative to the appservice's push URL.
pub const APPSERVICE_PING_PATH: &str = "_matrix/app/v1/ping";

/// Raw result of a probe, before it is turned into a `PingOutcome`.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum ProbeError {
    #[error("no response within the deadline")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("appservice responded with status {status}")]
    BadStatus { status: u16, body: String },
}

pub type ProbeResult = Result<Duration, ProbeError>;

/// Sends a single probe to an appservice.
///
/// Implementations make exactly one attempt per call and must not retry.
#[async_trait]
pub trait PingInvoker: Send + Sync {
    async fn invoke(&self, target: &PushTarget, transaction_id: Option<&str>) -> ProbeResult;
}

#[derive(Serialize)]
struct PingBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_id: Option<&'a str>,
}

/// Probes appservices over HTTP with reqwest.
#[derive(Clone)]
pub struct HttpInvoker {
    client: reqwest::Client,
    timeout: Duration,
    max_error_body_bytes: usize,
}

impl HttpInvoker {
    pub fn new(timeout: Duration, max_error_body_bytes: usize) -> Result<Self, reqwest::Error> {
        // Redirects are reported as a bad status rather than followed.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(HttpInvoker {
            client,
            timeout,
            max_error_body_bytes,
        })
    }
}

#[async_trait]
impl PingInvoker for HttpInvoker {
    /// The timeout applies to the whole exchange:
    /// - Establishing the connection
    /// - Sending the request
    /// - Receiving the response headers
    /// - Collecting the (capped) body of a failed response
    ///
    /// Dropping the request future on timeout also drops its connection.
    async fn invoke(&self, target: &PushTarget, transaction_id: Option<&str>) -> ProbeResult {
        let url = ping_url(&target.url);
        let request = self
            .client
            .post(url.as_str())
            .bearer_auth(&target.hs_token)
            .json(&PingBody { transaction_id });

        // A deadline too far out to represent means no deadline.
        let deadline = tokio::time::Instant::now().checked_add(self.timeout);
        let start = Instant::now();

        let response = within(deadline, request.send())
            .await
            // First ok_or: the deadline fired before any response arrived
            .ok_or(ProbeError::Timeout)?
            // Second map_err: connection refused, reset, DNS failure, ...
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout
                } else {
                    ProbeError::ConnectionFailed(error_chain(&e))
                }
            })?;

        let elapsed = start.elapsed();
        let status = response.status();

        if status.is_success() {
            return Ok(elapsed);
        }

        let body = read_capped_body(response, self.max_error_body_bytes, deadline).await;
        Err(ProbeError::BadStatus {
            status: status.as_u16(),
            body,
        })
    }
}

/// Runs `fut` until `deadline`. `None` once the deadline has passed.
async fn within<F: Future>(deadline: Option<tokio::time::Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

pub fn ping_url(push_url: &url::Url) -> String {
    format!(
        "{}/{}",
        push_url.as_str().trim_end_matches('/'),
        APPSERVICE_PING_PATH
    )
}

/// Reads at most `limit` bytes of the body. Whatever arrived before an error
/// or the deadline is kept.
async fn read_capped_body(
    mut response: reqwest::Response,
    limit: usize,
    deadline: Option<tokio::time::Instant>,
) -> String {
    let mut buf = Vec::new();

    while buf.len() < limit {
        match within(deadline, response.chunk()).await {
            Some(Ok(Some(chunk))) => {
                let take = chunk.len().min(limit - buf.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            Some(Ok(None)) => break,
            Some(Err(e)) => {
                tracing::debug!("Error reading appservice response body: {e}");
                break;
            }
            None => {
                tracing::debug!("Deadline reached while reading appservice response body");
                break;
            }
        }
    }

    truncate_to_utf8(buf)
}

// The cap may cut a multi-byte character in half; drop the partial tail.
fn truncate_to_utf8(mut buf: Vec<u8>) -> String {
    if let Err(e) = std::str::from_utf8(&buf) {
        if e.error_len().is_none() {
            buf.truncate(e.valid_up_to());
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn error_chain(e: &dyn StdError) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
