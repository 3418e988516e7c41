#![forbid(unsafe_code)]
//! Binary (UADP) and JSON codec for the OPC UA PubSub built-in type system.
//!
//! The crate is split along the wire layers: [`cursor`] holds the
//! bounds-checked byte cursors, [`types`] the owned value model, [`binary`]
//! and [`json`] the two codecs over it, and [`pubsub`] the
//! NetworkMessage/DataSetMessage framing on top of both.

pub mod binary;
pub mod cursor;
pub mod descriptor;
pub mod json;
pub mod pubsub;
pub mod status;
pub mod types;

#[cfg(test)]
mod test;

use serde::Serialize;

use crate::status::StatusCode;

/// Recursion cap shared by DiagnosticInfo, nested structured types and the
/// JSON matrix writer: a value may nest this many levels, the root level
/// included. One level past it is an error, never a stack overflow.
pub const MAX_RECURSION_DEPTH: u8 = 20;

/// Failure kinds surfaced by every codec operation. A `Good` status is the
/// absence of an error (`Ok`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Error {
    /// The output span is too small, or a length prefix points past the
    /// input.
    LimitsExceeded,
    /// The value violates an encoding invariant (unknown type descriptor,
    /// malformed UTF-8, invalid publisher-id kind).
    Encoding,
    /// Malformed input bytes or tokens.
    Decoding,
    OutOfMemory,
    /// RawData field encoding, metadata messages.
    NotImplemented,
    /// A namespace or server-uri table index is out of range in
    /// non-reversible JSON mode.
    NotFound,
    /// The symbolic status-name table was compiled out.
    NotSupported,
}

pub type EncodingResult<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Error::LimitsExceeded => "encoding limits exceeded",
            Error::Encoding => "encoding error",
            Error::Decoding => "decoding error",
            Error::OutOfMemory => "out of memory",
            Error::NotImplemented => "not implemented",
            Error::NotFound => "not found",
            Error::NotSupported => "not supported",
        };
        f.write_str(text)
    }
}

impl std::error::Error for Error {}

impl From<Error> for StatusCode {
    fn from(value: Error) -> Self {
        match value {
            Error::LimitsExceeded => StatusCode::BAD_ENCODING_LIMITS_EXCEEDED,
            Error::Encoding => StatusCode::BAD_ENCODING_ERROR,
            Error::Decoding => StatusCode::BAD_DECODING_ERROR,
            Error::OutOfMemory => StatusCode::BAD_OUT_OF_MEMORY,
            Error::NotImplemented => StatusCode::BAD_NOT_IMPLEMENTED,
            Error::NotFound => StatusCode::BAD_NOT_FOUND,
            Error::NotSupported => StatusCode::BAD_NOT_SUPPORTED,
        }
    }
}
