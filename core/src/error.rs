//! Error types for the Roadie client.
//!
//! # Design
//! Every failure reaches the caller as an `Error` value; nothing is retried
//! or swallowed. Non-2xx responses carry the decoded `ErrorResponse` payload
//! together with the status code. Transport failures are boxed unchanged so
//! custom transports can report whatever error type they use.

use thiserror::Error;

use crate::types::ErrorResponse;

/// Errors returned by the client, its builder and its sub-services.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration option rejected its input during construction.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The caller's context was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// The caller's context deadline passed before the call completed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The transport failed to complete the round trip.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The API answered with a non-2xx status.
    #[error("API error (status {status}): {response}")]
    Api { status: u16, response: ErrorResponse },

    /// The request body could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The response body could not be decoded into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),
}

impl Error {
    /// HTTP status of an `Api` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Decoded error payload of an `Api` error.
    pub fn api_response(&self) -> Option<&ErrorResponse> {
        match self {
            Error::Api { response, .. } => Some(response),
            _ => None,
        }
    }

    pub(crate) fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Transport(Box::new(err))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
