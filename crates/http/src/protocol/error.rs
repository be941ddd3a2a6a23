use std::io;
use thiserror::Error;

/// Framing failures found while decoding the wire format.
///
/// The decoder never returns these across the pipeline boundary: they are attached to
/// the emitted events as [`DecoderResult::Failure`](super::DecoderResult) and the decoder
/// discards input until it is reset.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("initial line is larger than {max} bytes")]
    TooLongInitialLine { max: usize },

    #[error("header block is larger than {max} bytes")]
    TooLongHeader { max: usize },

    #[error("invalid http version: {version}")]
    InvalidVersion { version: String },

    #[error("invalid http method: {method}")]
    InvalidMethod { method: String },

    #[error("invalid status code: {status}")]
    InvalidStatus { status: String },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid chunk size: {reason}")]
    InvalidChunkSize { reason: String },

    #[error("prohibited trailer field: {name}")]
    InvalidTrailer { name: String },

    #[error("chunked transfer encoding is disabled")]
    UnsupportedChunked,

    #[error("connection closed before the {0} was complete")]
    PrematureClosure(&'static str),
}

impl DecodeError {
    pub fn invalid_version<S: ToString>(str: S) -> Self {
        Self::InvalidVersion { version: str.to_string() }
    }

    pub fn invalid_method<S: ToString>(str: S) -> Self {
        Self::InvalidMethod { method: str.to_string() }
    }

    pub fn invalid_status<S: ToString>(str: S) -> Self {
        Self::InvalidStatus { status: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn invalid_chunk_size<S: ToString>(str: S) -> Self {
        Self::InvalidChunkSize { reason: str.to_string() }
    }

    pub fn invalid_trailer<S: ToString>(name: S) -> Self {
        Self::InvalidTrailer { name: name.to_string() }
    }

    /// Whether the failure was caused by the peer closing the stream mid-message.
    pub fn is_premature_closure(&self) -> bool {
        matches!(self, Self::PrematureClosure(_))
    }
}

/// Errors crossing the codec API boundary.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("decode error: {source}")]
    Decode {
        #[from]
        source: DecodeError,
    },

    #[error("{decoder} produced output without consuming any input")]
    NoProgress { decoder: &'static str },

    #[error("unexpected message: {reason}")]
    UnexpectedMessage { reason: String },

    #[error("response content exceeds the limit of {max_size} bytes")]
    TooLongResponse { max_size: usize },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl CodecError {
    pub fn no_progress(decoder: &'static str) -> Self {
        Self::NoProgress { decoder }
    }

    pub fn unexpected_message<S: ToString>(str: S) -> Self {
        Self::UnexpectedMessage { reason: str.to_string() }
    }

    pub fn too_long_response(max_size: usize) -> Self {
        Self::TooLongResponse { max_size }
    }
}
