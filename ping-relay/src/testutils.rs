use crate::config::AppserviceRegistration;
use crate::invoker::{APPSERVICE_PING_PATH, PingInvoker, ProbeResult};
use crate::registry::PushTarget;
use async_trait::async_trait;
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::post,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

/// Registration with predictable tokens: `{id}_as_token` and `{id}_hs_token`.
pub fn registration(id: &str, url: Option<&str>) -> AppserviceRegistration {
    AppserviceRegistration {
        id: id.to_string(),
        url: url.map(|u| Url::parse(u).unwrap()),
        as_token: format!("{id}_as_token"),
        hs_token: format!("{id}_hs_token"),
    }
}

/// A URL on which nothing is listening.
pub async fn refused_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    Url::parse(&format!("http://127.0.0.1:{port}")).unwrap()
}

/// An appservice that accepts one connection and never answers. The receiver
/// resolves once the client has closed that connection.
pub async fn silent_appservice() -> (Url, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = closed_tx.send(());
    });

    (Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(), closed_rx)
}

#[derive(Clone)]
pub struct MockBehavior {
    status: StatusCode,
    body: String,
    delay: Duration,
}

impl MockBehavior {
    pub fn respond(status: StatusCode, body: &str) -> Self {
        MockBehavior {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Clone)]
struct MockState {
    behavior: MockBehavior,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// An appservice answering pings with a fixed status, body and delay.
pub struct MockAppservice {
    port: u16,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl MockAppservice {
    pub async fn start(behavior: MockBehavior) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            behavior,
            requests: requests.clone(),
        };

        let app = Router::new()
            .route(&format!("/{APPSERVICE_PING_PATH}"), post(mock_ping))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockAppservice {
            port,
            requests,
            handle,
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://127.0.0.1:{}", self.port)).unwrap()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockAppservice {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn mock_ping(
    State(state): State<MockState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    state.requests.lock().unwrap().push(RecordedRequest {
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    });

    tokio::time::sleep(state.behavior.delay).await;
    (state.behavior.status, state.behavior.body.clone())
}

/// Invoker that never touches the network and counts its calls.
pub struct MockInvoker {
    result: ProbeResult,
    delay: Duration,
    calls: AtomicUsize,
    transaction_ids: Mutex<Vec<Option<String>>>,
}

impl MockInvoker {
    pub fn new(result: ProbeResult) -> Self {
        MockInvoker {
            result,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            transaction_ids: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn transaction_ids(&self) -> Vec<Option<String>> {
        self.transaction_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl PingInvoker for MockInvoker {
    async fn invoke(&self, _target: &PushTarget, transaction_id: Option<&str>) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.transaction_ids
            .lock()
            .unwrap()
            .push(transaction_id.map(String::from));
        tokio::time::sleep(self.delay).await;
        self.result.clone()
    }
}
