//! Outcome of a ping and its rendering on the wire.
use crate::invoker::{ProbeError, ProbeResult};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Every ping request resolves to exactly one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PingOutcome {
    Success { duration_ms: u64 },
    UrlNotConfigured,
    Forbidden,
    BadStatus { status: u16, body: String },
    ConnectionFailed { detail: String },
    ConnectionTimeout,
}

impl PingOutcome {
    /// Classifies the result of a probe. Durations are rounded to the
    /// nearest millisecond.
    pub fn from_probe(result: ProbeResult) -> Self {
        match result {
            Ok(elapsed) => PingOutcome::Success {
                duration_ms: ((elapsed.as_micros() + 500) / 1000) as u64,
            },
            Err(ProbeError::Timeout) => PingOutcome::ConnectionTimeout,
            Err(ProbeError::ConnectionFailed(detail)) => PingOutcome::ConnectionFailed { detail },
            Err(ProbeError::BadStatus { status, body }) => PingOutcome::BadStatus { status, body },
        }
    }

    /// Short stable name, used for logs and metric tags.
    pub fn name(&self) -> &'static str {
        match self {
            PingOutcome::Success { .. } => "success",
            PingOutcome::UrlNotConfigured => "url_not_configured",
            PingOutcome::Forbidden => "forbidden",
            PingOutcome::BadStatus { .. } => "bad_status",
            PingOutcome::ConnectionFailed { .. } => "connection_failed",
            PingOutcome::ConnectionTimeout => "connection_timeout",
        }
    }

    pub fn render(&self) -> (StatusCode, PingResponse) {
        let error = |errcode, error: &str| ErrorBody {
            errcode,
            error: error.to_string(),
            status: None,
            body: None,
        };

        match self {
            PingOutcome::Success { duration_ms } => (
                StatusCode::OK,
                PingResponse::Success {
                    duration_ms: *duration_ms,
                },
            ),
            PingOutcome::UrlNotConfigured => (
                StatusCode::BAD_REQUEST,
                PingResponse::Error(error(
                    ErrCode::UrlNotSet,
                    "Application service has not configured a URL",
                )),
            ),
            PingOutcome::Forbidden => (
                StatusCode::FORBIDDEN,
                PingResponse::Error(error(
                    ErrCode::Forbidden,
                    "Access token does not belong to this application service",
                )),
            ),
            PingOutcome::BadStatus { status, body } => (
                StatusCode::BAD_GATEWAY,
                PingResponse::Error(ErrorBody {
                    status: Some(*status),
                    body: Some(body.clone()),
                    ..error(
                        ErrCode::BadStatus,
                        &format!("Application service returned HTTP status {status}"),
                    )
                }),
            ),
            // The detail may contain internal addresses; it is logged, not returned.
            PingOutcome::ConnectionFailed { detail: _ } => (
                StatusCode::BAD_GATEWAY,
                PingResponse::Error(error(
                    ErrCode::ConnectionFailed,
                    "Connection to application service failed",
                )),
            ),
            PingOutcome::ConnectionTimeout => (
                StatusCode::GATEWAY_TIMEOUT,
                PingResponse::Error(error(
                    ErrCode::ConnectionTimeout,
                    "Connection to application service timed out",
                )),
            ),
        }
    }
}

impl IntoResponse for PingOutcome {
    fn into_response(self) -> Response {
        let (status, body) = self.render();
        (status, Json(body)).into_response()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ErrCode {
    #[serde(rename = "M_URL_NOT_SET")]
    UrlNotSet,
    #[serde(rename = "M_FORBIDDEN")]
    Forbidden,
    #[serde(rename = "M_BAD_STATUS")]
    BadStatus,
    #[serde(rename = "M_CONNECTION_FAILED")]
    ConnectionFailed,
    #[serde(rename = "M_CONNECTION_TIMEOUT")]
    ConnectionTimeout,
    #[serde(rename = "M_MISSING_TOKEN")]
    MissingToken,
    #[serde(rename = "M_NOT_JSON")]
    NotJson,
    #[serde(rename = "M_BAD_JSON")]
    BadJson,
    #[serde(rename = "M_INVALID_PARAM")]
    InvalidParam,
    #[serde(rename = "M_TOO_LARGE")]
    TooLarge,
    #[serde(rename = "M_UNRECOGNIZED")]
    Unrecognized,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorBody {
    pub errcode: ErrCode,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PingResponse {
    Success { duration_ms: u64 },
    Error(ErrorBody),
}
