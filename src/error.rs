//! Error handling.

use ndarray::ShapeError;
use std::sync::Arc;
use thiserror::Error;

/// NH5 reader error type
///
/// This type encapsulates the various errors that may occur while opening or reading a remote
/// NH5 container. The variants fall into four broad kinds, which may be queried using
/// [Nh5Error::is_format_error], [Nh5Error::is_not_implemented] and
/// [Nh5Error::is_transport_error].
///
/// A path that matches no group or dataset is not an error: lookups return `Ok(None)` or `None`.
#[derive(Debug, Error)]
pub enum Nh5Error {
    /// The container does not start with the NH5 magic string
    #[error("not an NH5 container: expected magic \"nh5\", found {found:?}")]
    BadMagic { found: String },

    /// The container declares a version this reader does not understand
    #[error("unsupported NH5 version {version:?}")]
    UnsupportedVersion { version: String },

    /// The text prefix is missing one or more separators
    #[error("malformed NH5 prefix: {reason}")]
    MalformedPrefix { reason: &'static str },

    /// The header length field is not a non-negative integer
    #[error("invalid NH5 header length {value:?}")]
    InvalidHeaderLength { value: String },

    /// The header is not valid JSON, or does not deserialise into the header model
    #[error("failed to parse NH5 header JSON")]
    HeaderJson(#[from] serde_json::Error),

    /// The header JSON does not have the structure of an NH5 header
    #[error("NH5 header failed structural validation")]
    InvalidHeader,

    /// The extent of a dataset does not fit in the addressable range
    #[error("dataset {path} extends beyond the addressable range")]
    DatasetExtent { path: String },

    /// A byte range does not fit in the addressable range
    #[error("byte range of {size} bytes at offset {offset} is not addressable")]
    RangeOverflow { offset: u64, size: u64 },

    /// The caller requested an option that is not supported
    #[error("{feature} is not implemented")]
    NotImplemented { feature: &'static str },

    /// Error sending an HTTP request or receiving its body
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// An HTTP request completed with an unexpected status
    #[error("HTTP request for {url} failed with status: {status}")]
    HttpRequest { url: String, status: u16 },

    /// A range response did not contain the requested number of bytes
    #[error("expected {expected} bytes in range response, received {actual}")]
    UnexpectedLength { expected: u64, actual: u64 },

    /// Error converting from bytes to a type
    #[error("failed to convert from bytes to {type_name}")]
    FromBytes { type_name: &'static str },

    /// Error creating an ndarray array from a shape
    #[error("failed to create array from shape")]
    ShapeInvalid(#[from] ShapeError),

    /// Error converting between integer types
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),

    /// The URL of the container could not be parsed
    #[error("invalid URL")]
    InvalidUrl(#[from] url::ParseError),

    /// Error validating client configuration
    #[error("client configuration is not valid")]
    ConfigValidation(#[from] validator::ValidationErrors),

    /// An error shared between concurrent requests for the same data
    #[error(transparent)]
    Shared(Arc<Nh5Error>),
}

impl Nh5Error {
    /// Returns true if the error indicates a malformed container.
    pub fn is_format_error(&self) -> bool {
        if let Self::Shared(error) = self {
            return error.is_format_error();
        }
        matches!(
            self,
            Self::BadMagic { .. }
                | Self::UnsupportedVersion { .. }
                | Self::MalformedPrefix { .. }
                | Self::InvalidHeaderLength { .. }
                | Self::HeaderJson(_)
                | Self::InvalidHeader
                | Self::DatasetExtent { .. }
                | Self::RangeOverflow { .. }
        )
    }

    /// Returns true if the error indicates an unsupported request option.
    pub fn is_not_implemented(&self) -> bool {
        if let Self::Shared(error) = self {
            return error.is_not_implemented();
        }
        matches!(self, Self::NotImplemented { .. })
    }

    /// Returns true if the error originated in the transport layer.
    pub fn is_transport_error(&self) -> bool {
        if let Self::Shared(error) = self {
            return error.is_transport_error();
        }
        matches!(
            self,
            Self::Http(_) | Self::HttpRequest { .. } | Self::UnexpectedLength { .. }
        )
    }
}
