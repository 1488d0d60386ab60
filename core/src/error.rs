//! Error types for the visual search client.
//!
//! # Design
//! Three layers, each with its own type:
//! - `ClientError` is raised by parameter constructors when a precondition is
//!   violated (bad color code, missing image reference). It is the only error
//!   that crosses the operation boundary as an `Err`.
//! - `TransportError` is what an injected `Transport` returns when it cannot
//!   produce a response at all.
//! - `ResponseError` is recovered into the returned result object. Its `kind`
//!   tells the caller which of the failure classes applied; the raw response
//!   body stays on the result for diagnostics.

use thiserror::Error;

pub const INVALID_COLOR: &str =
    "Invalid color. It should be a six hexadecimal number color code e.g. 123ACF.";
pub const MISSING_IMAGE_FILE: &str = "The image file path must not be empty";
pub const MISSING_IMAGE_STREAM: &str = "The image input stream must not be empty";

pub const PARSE_RESPONSE_ERROR: &str = "Could not parse the visual search response.";
pub const INVALID_RESPONSE_FORMAT: &str = "Invalid visual search response format.";
pub const INVALID_IMAGE_OR_URL: &str = "Invalid image file or image URL.";
pub const REQUEST_FAILED: &str = "Could not reach the visual search service.";

/// Precondition violations raised while building request parameters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("{}", INVALID_COLOR)]
    InvalidColor(String),

    #[error("{}", MISSING_IMAGE_FILE)]
    MissingImageFile,

    #[error("{}", MISSING_IMAGE_STREAM)]
    MissingImageStream,
}

/// Failures reported by a `Transport` implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The image payload could not be read or was refused before sending.
    #[error("image could not be sent: {0}")]
    Image(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Any other failure to complete the round trip.
    #[error("request failed: {0}")]
    Request(String),
}

/// Classification of a failure recovered into a result object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The body is not syntactically valid JSON, or a known field has the
    /// wrong JSON type.
    ParseError,
    /// Valid JSON that does not match the response envelope, or a failure
    /// status without error detail.
    InvalidFormat,
    /// The service reported a failure with an explicit message.
    ApplicationError,
    /// The image reference could not be read or sent.
    InvalidImageOrUrl,
    /// The transport could not complete the round trip.
    RequestFailed,
}

impl ErrorKind {
    /// Message used when the service gives no better one.
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => PARSE_RESPONSE_ERROR,
            Self::InvalidFormat => INVALID_RESPONSE_FORMAT,
            Self::InvalidImageOrUrl => INVALID_IMAGE_OR_URL,
            Self::RequestFailed => REQUEST_FAILED,
            Self::ApplicationError => "The visual search service reported an error.",
        }
    }
}

/// A failure carried on a result object instead of being raised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ResponseError {
    pub kind: ErrorKind,
    pub message: String,
    /// Display text of the underlying error, when there was one.
    pub cause: Option<String>,
}

impl ResponseError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_string(),
            cause: None,
        }
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ApplicationError,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl ToString) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

impl From<TransportError> for ResponseError {
    fn from(err: TransportError) -> Self {
        let kind = match err {
            TransportError::Image(_) => ErrorKind::InvalidImageOrUrl,
            TransportError::Io(_) | TransportError::Request(_) => ErrorKind::RequestFailed,
        };
        ResponseError::new(kind).with_cause(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_messages() {
        assert_eq!(
            ClientError::InvalidColor("#123ABC".into()).to_string(),
            "Invalid color. It should be a six hexadecimal number color code e.g. 123ACF."
        );
        assert_eq!(
            ClientError::MissingImageFile.to_string(),
            "The image file path must not be empty"
        );
        assert_eq!(
            ClientError::MissingImageStream.to_string(),
            "The image input stream must not be empty"
        );
    }

    #[test]
    fn transport_image_error_maps_to_invalid_image() {
        let err = ResponseError::from(TransportError::Image("unreadable".into()));
        assert_eq!(err.kind, ErrorKind::InvalidImageOrUrl);
        assert_eq!(err.message, INVALID_IMAGE_OR_URL);
        assert_eq!(err.cause.as_deref(), Some("image could not be sent: unreadable"));
    }

    #[test]
    fn other_transport_errors_map_to_request_failed() {
        let err = ResponseError::from(TransportError::Request("connection refused".into()));
        assert_eq!(err.kind, ErrorKind::RequestFailed);
        assert_eq!(err.to_string(), REQUEST_FAILED);
    }
}
