use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use thiserror;

use tagview_core::Error as CoreError;
use tagview_pullstats::Error as PullStatsError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("http invalid header name")]
    HTTPInvalidHeaderName(#[from] http::header::InvalidHeaderName),
    #[error("http invalid header value")]
    HTTPInvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("missing path parameter: {0}")]
    MissingPathParameter(&'static str),

    #[error("manifest unknown: {0}")]
    ManifestUnknown(String),

    #[error("tagview error: {0}")]
    TagviewCoreError(#[from] CoreError),

    #[error("pull statistics error: {0}")]
    PullStatsError(#[from] PullStatsError),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::TagviewCoreError(e) => core_error_to_response(e),
            Error::ManifestUnknown(s) => {
                into_error_response(DistributionErrorCode::ManifestUnknown, Some(s))
            }
            Error::MissingPathParameter(_) => {
                (StatusCode::BAD_REQUEST, format!("{}", self)).into_response()
            }
            Error::HTTPInvalidHeaderName(_) => {
                (StatusCode::BAD_REQUEST, format!("{}", self)).into_response()
            }
            Error::HTTPInvalidHeaderValue(_) => {
                (StatusCode::BAD_REQUEST, format!("{}", self)).into_response()
            }
            Error::PullStatsError(e) => internal_server_error(e),
        }
    }
}

/// Subset of the distribution spec error codes this service can produce.
// https://github.com/opencontainers/distribution-spec/blob/main/spec.md#error-codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionErrorCode {
    DigestInvalid,
    ManifestInvalid,
    ManifestUnknown,
    NameUnknown,
}

#[derive(Debug, Serialize)]
struct ErrorInfo {
    code: DistributionErrorCode,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    errors: Vec<ErrorInfo>,
}

#[inline]
fn into_error_response(code: DistributionErrorCode, msg: Option<String>) -> Response {
    let message = msg.unwrap_or_else(|| default_message(&code).to_string());
    let response = ErrorResponse {
        errors: vec![ErrorInfo { code, message }],
    };
    (status_code(&code), axum::Json(response)).into_response()
}

#[inline]
fn internal_server_error(e: impl std::fmt::Debug) -> Response {
    tracing::warn!("{:?}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        String::from("internal server error"),
    )
        .into_response()
}

#[inline]
fn core_error_to_response(e: CoreError) -> Response {
    match e {
        CoreError::InvalidDigest(s) => {
            into_error_response(DistributionErrorCode::DigestInvalid, Some(s))
        }
        CoreError::UnsupportedDigestAlgorithm(s) => {
            into_error_response(DistributionErrorCode::DigestInvalid, Some(s))
        }
        CoreError::InvalidTag(s) => {
            into_error_response(DistributionErrorCode::ManifestInvalid, Some(s))
        }
        CoreError::NameUnknown(s) => {
            into_error_response(DistributionErrorCode::NameUnknown, Some(s))
        }
        e @ CoreError::DuplicateRepository(_) => {
            internal_server_error(e)
        }
    }
}

#[inline]
fn status_code(c: &DistributionErrorCode) -> StatusCode {
    match c {
        DistributionErrorCode::DigestInvalid => StatusCode::BAD_REQUEST,
        DistributionErrorCode::ManifestInvalid => StatusCode::BAD_REQUEST,
        DistributionErrorCode::ManifestUnknown => StatusCode::NOT_FOUND,
        DistributionErrorCode::NameUnknown => StatusCode::NOT_FOUND,
    }
}

#[inline]
fn default_message(c: &DistributionErrorCode) -> &str {
    match c {
        DistributionErrorCode::DigestInvalid => "provided digest is invalid",
        DistributionErrorCode::ManifestInvalid => "manifest invalid",
        DistributionErrorCode::ManifestUnknown => "manifest unknown to registry",
        DistributionErrorCode::NameUnknown => "repository name not known to registry",
    }
}
