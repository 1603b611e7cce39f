use crate::config::ValidationError;
use crate::outcome::{ErrCode, ErrorBody};
use axum::{
    Json,
    extract::rejection::{BytesRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Errors that stop the relay from starting or serving
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Requests rejected before they reach the ping pipeline
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ApiError {
    #[error("Missing access token")]
    MissingToken,

    #[error("Content not JSON: {0}")]
    NotJson(String),

    #[error("Invalid request body: {0}")]
    BadJson(String),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Request body too large")]
    TooLarge,

    #[error("Unrecognized request")]
    Unrecognized,

    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    fn status_and_errcode(&self) -> (StatusCode, ErrCode) {
        match self {
            ApiError::MissingToken => (StatusCode::UNAUTHORIZED, ErrCode::MissingToken),
            ApiError::NotJson(_) => (StatusCode::BAD_REQUEST, ErrCode::NotJson),
            ApiError::BadJson(_) => (StatusCode::BAD_REQUEST, ErrCode::BadJson),
            ApiError::InvalidParam(_) => (StatusCode::BAD_REQUEST, ErrCode::InvalidParam),
            ApiError::TooLarge => (StatusCode::PAYLOAD_TOO_LARGE, ErrCode::TooLarge),
            ApiError::Unrecognized => (StatusCode::NOT_FOUND, ErrCode::Unrecognized),
            ApiError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, ErrCode::Unrecognized),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        ApiError::InvalidParam(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::InvalidParam(e.body_text())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(e: BytesRejection) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::TooLarge
        } else {
            ApiError::NotJson(e.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, errcode) = self.status_and_errcode();

        let body = Json(ErrorBody {
            errcode,
            error: self.to_string(),
            status: None,
            body: None,
        });

        (status, body).into_response()
    }
}
