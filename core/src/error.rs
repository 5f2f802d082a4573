//! Error types for descriptor construction and operation calls.
//!
//! # Design
//! `ConfigError` is only produced while building descriptors, configs and
//! clients. Once a `Client` exists, every failure is an `ApiError`. Status
//! errors and decode errors are separate variants so a caller can tell
//! "the server said no" from "the server said OK but sent the wrong shape".
//! Both keep the raw response body.

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

/// Boxed error used for transport causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A descriptor, config or client is malformed. Raised at build time only.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("operation name must not be empty")]
    EmptyOperationName,

    #[error("{operation}: malformed path template `{template}`")]
    MalformedTemplate { operation: String, template: String },

    #[error("{operation}: path parameter `{name}` does not appear in the path template")]
    UnboundPathParameter { operation: String, name: String },

    #[error("{operation}: placeholder `{{{name}}}` has no matching path parameter")]
    UnmatchedPlaceholder { operation: String, name: String },

    #[error("{operation}: parameter `{name}` is declared more than once")]
    DuplicateParameter { operation: String, name: String },

    #[error("{operation}: more than one body parameter declared")]
    MultipleBodies { operation: String },

    #[error("duplicate operation name `{name}`")]
    DuplicateOperation { name: String },

    #[error("{operation}: no codec registered for content type `{content_type}`")]
    UnregisteredCodec {
        operation: String,
        content_type: String,
    },

    #[error("invalid base URL `{url}` (expected http:// or https://)")]
    InvalidBaseUrl { url: String },

    #[error("default header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to construct transport")]
    Transport(#[source] BoxError),
}

/// A transport could not complete the exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(#[source] BoxError),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport failure: {0}")]
    Other(#[source] BoxError),
}

/// A payload could not be decoded into the declared shape.
///
/// `path` is the dotted location of the offending field (`.` for the root).
/// `expected` is the type serde was looking for when the mismatch is a type
/// error. For a missing required field serde reports only the field name,
/// so `path` ends in that name and `expected` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decode failed at `{path}`: {message}")]
pub struct DecodeError {
    pub path: String,
    pub expected: Option<String>,
    pub message: String,
}

impl DecodeError {
    pub fn at_root(message: impl Into<String>) -> Self {
        Self {
            path: ".".to_string(),
            expected: None,
            message: message.into(),
        }
    }
}

/// A request body could not be encoded for its content type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot encode body as {content_type}: {message}")]
pub struct EncodeError {
    pub content_type: String,
    pub message: String,
}

/// Errors returned by `Client` operation calls.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("unknown operation `{name}`")]
    UnknownOperation { name: String },

    /// A required parameter was absent or null. Raised before any network I/O.
    #[error("missing required parameter `{name}`")]
    MissingParameter { name: String },

    #[error("invalid value for parameter `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },

    /// An interceptor produced a header that cannot be sent. Raised before
    /// any network I/O.
    #[error("header `{name}` set by an interceptor: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered outside [200, 300).
    #[error("HTTP {status}: {}", String::from_utf8_lossy(.body))]
    Status { status: u16, body: Bytes },

    /// The server answered 2xx but the body does not match the declared type.
    #[error("HTTP {status} response could not be decoded")]
    ResponseDecode {
        status: u16,
        body: Bytes,
        #[source]
        source: DecodeError,
    },

    #[error("call cancelled")]
    Cancelled,
}

impl ApiError {
    /// Status code carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } | ApiError::ResponseDecode { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Raw response body for status and decode errors.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            ApiError::Status { body, .. } | ApiError::ResponseDecode { body, .. } => Some(body),
            _ => None,
        }
    }

    /// 4xx status error.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if (400..500).contains(status))
    }

    /// 5xx status error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if (500..600).contains(status))
    }
}
