use crate::errors::ApiError;
use crate::outcome::PingOutcome;
use crate::relay::{PingRelay, PingRequest};
use axum::{
    Router,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{BytesRejection, PathRejection, QueryRejection},
    },
    http::{HeaderMap, header::AUTHORIZATION},
    routing::post,
};
use serde::Deserialize;
use tokio::net::TcpListener;

pub const PING_PATH: &str = "/_matrix/client/v1/appservice/{appservice_id}/ping";
pub const UNSTABLE_PING_PATH: &str =
    "/_matrix/client/unstable/fi.mau.msc2659/appservice/{appservice_id}/ping";

pub fn router(relay: PingRelay) -> Router {
    Router::new()
        .route(PING_PATH, post(ping))
        .route(UNSTABLE_PING_PATH, post(ping))
        .fallback(unrecognized)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(relay)
}

/// Serves the client API on an already bound listener until it fails.
pub async fn serve(listener: TcpListener, relay: PingRelay) -> Result<(), std::io::Error> {
    axum::serve(listener, router(relay)).await
}

#[derive(Deserialize, Debug)]
struct TokenParams {
    access_token: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct PingBody {
    #[serde(default)]
    transaction_id: Option<String>,
}

async fn ping(
    State(relay): State<PingRelay>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<TokenParams>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<PingOutcome, ApiError> {
    let Path(appservice_id) = path?;
    let Query(params) = query?;
    let body = body?;

    let caller_token = access_token(&headers, params.access_token)?;
    let body = parse_body(&body)?;

    let request = PingRequest {
        appservice_id,
        transaction_id: body.transaction_id,
        caller_token,
    };

    Ok(relay.ping(&request).await)
}

async fn unrecognized() -> ApiError {
    ApiError::Unrecognized
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

// A non-empty bearer token in the Authorization header wins over the
// `access_token` query parameter. The scheme is case-insensitive.
fn access_token(headers: &HeaderMap, query_token: Option<String>) -> Result<String, ApiError> {
    let header_token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim().to_string())
        .filter(|token| !token.is_empty());

    header_token
        .or(query_token.filter(|token| !token.is_empty()))
        .ok_or(ApiError::MissingToken)
}

// An empty body is accepted as `{}`.
fn parse_body(body: &[u8]) -> Result<PingBody, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PingBody::default());
    }

    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ApiError::NotJson(e.to_string()))?;

    if !value.is_object() {
        return Err(ApiError::BadJson("expected a JSON object".into()));
    }

    serde_json::from_value(value).map_err(|e| ApiError::BadJson(e.to_string()))
}
