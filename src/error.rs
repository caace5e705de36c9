use actix_web::{http::StatusCode, ResponseError};
use reqwest::Error as REQWEST_ERROR;
use std::num::ParseIntError;
use std::{env::VarError, io::Error as IO_ERROR};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::subscriber::SetGlobalDefaultError as TRACING_GLOBAL_DEFAULT_ERROR;
use url::ParseError as URL_ERROR;

/// Longest response body kept inside a [`TransportError`].
pub const MAX_BODY_PREVIEW: usize = 512;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] IO_ERROR),

    #[error("{0}")]
    URL(#[from] URL_ERROR),

    #[error("{0}")]
    INT(#[from] ParseIntError),

    #[error("{0}")]
    VAR(#[from] VarError),

    #[error("{0}")]
    TokioJoinError(#[from] JoinError),

    #[error("Tracing error: {0}")]
    SetGlobalDefaultError(#[from] TRACING_GLOBAL_DEFAULT_ERROR),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Missing params: {0}")]
    MissingParams(String),

    #[error("Remote query error: {0}")]
    RemoteQuery(#[source] TransportError),

    #[error("Indexer query error: {0}")]
    IndexerQuery(#[source] TransportError),

    #[error("Schema validation error at `{path}`, received: {raw}")]
    SchemaValidation { path: String, raw: String },

    #[error("Query construction error: {0}")]
    QueryConstruction(String),
}

impl Error {
    pub fn schema(path: impl Into<String>, raw: impl ToString) -> Self {
        Error::SchemaValidation {
            path: path.into(),
            raw: truncate(&raw.to_string()),
        }
    }

    /// Transport level failures may succeed on a later attempt, everything
    /// else points at a protocol mismatch or a bad input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RemoteQuery(_) | Error::IndexerQuery(_))
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: REQWEST_ERROR,
    },

    #[error("{endpoint} responded with status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("malformed response envelope from {endpoint}: {message}")]
    Envelope { endpoint: String, message: String },

    #[error("request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u128 },

    #[error("request to {endpoint} was cancelled")]
    Cancelled { endpoint: String },
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Request { source, .. } => {
                source.status().map(|status| status.as_u16())
            },
            _ => None,
        }
    }

    pub fn envelope(endpoint: &str, message: impl ToString) -> Self {
        TransportError::Envelope {
            endpoint: endpoint.to_owned(),
            message: truncate(&message.to_string()),
        }
    }
}

/// A single event that could not be classified or aggregated. Reported next
/// to a series, never returned as an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed event in tx {tx_hash} at height {block_height}: {reason}")]
pub struct MalformedEvent {
    pub tx_hash: String,
    pub block_height: i64,
    pub reason: String,
}

pub fn truncate(value: &str) -> String {
    if value.len() <= MAX_BODY_PREVIEW {
        return value.to_owned();
    }

    let mut end = MAX_BODY_PREVIEW;
    while !value.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}... ({} bytes total)", &value[..end], value.len())
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingParams(_) | Error::QueryConstruction(_) => {
                StatusCode::BAD_REQUEST
            },
            Error::SchemaValidation { .. } => StatusCode::BAD_GATEWAY,
            Error::RemoteQuery(_) | Error::IndexerQuery(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        let err = Error::IndexerQuery(TransportError::Status {
            endpoint: String::from("http://localhost:3100/graphql/query"),
            status: 500,
            body: String::from("internal"),
        });

        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!Error::schema("fee", "x").is_retryable());
    }

    #[test]
    fn test_ambient_errors_are_internal() {
        let missing = Error::from(VarError::NotPresent);
        let port = Error::from("x".parse::<u16>().unwrap_err());

        assert_eq!(missing.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(port.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!port.is_retryable());
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "é".repeat(MAX_BODY_PREVIEW);
        let preview = truncate(&body);

        assert!(preview.ends_with(&format!("({} bytes total)", body.len())));
        assert!(preview.len() < body.len());
        assert_eq!(truncate("short"), "short");
    }
}
