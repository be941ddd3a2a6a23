//! Typed conversion of header values.
//!
//! All typed accessors of [`Headers`](super::Headers) go through one [`ValueConverter`],
//! so an alternate wire representation only needs a new converter.

use std::time::SystemTime;

use thiserror::Error;

/// Failure to convert a header value into a typed value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("invalid integer header value: {value}")]
    InvalidInteger { value: String },

    #[error("integer header value {value} is out of range")]
    OutOfRange { value: i64 },

    #[error("invalid date header value: {value}")]
    InvalidTimestamp { value: String },
}

impl ConvertError {
    pub fn invalid_integer<S: ToString>(value: S) -> Self {
        Self::InvalidInteger { value: value.to_string() }
    }

    pub fn invalid_timestamp<S: ToString>(value: S) -> Self {
        Self::InvalidTimestamp { value: value.to_string() }
    }
}

/// Converts between header value text and typed values.
pub trait ValueConverter: Clone + Default + std::fmt::Debug {
    fn parse_i64(&self, value: &str) -> Result<i64, ConvertError>;

    fn format_i64(&self, value: i64) -> String;

    fn parse_timestamp(&self, value: &str) -> Result<SystemTime, ConvertError>;

    fn format_timestamp(&self, value: SystemTime) -> String;
}

/// The textual HTTP/1.1 representation: decimal integers and HTTP-dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextConverter;

impl ValueConverter for TextConverter {
    fn parse_i64(&self, value: &str) -> Result<i64, ConvertError> {
        value.trim().parse::<i64>().map_err(|_| ConvertError::invalid_integer(value))
    }

    fn format_i64(&self, value: i64) -> String {
        value.to_string()
    }

    fn parse_timestamp(&self, value: &str) -> Result<SystemTime, ConvertError> {
        httpdate::parse_http_date(value.trim()).map_err(|_| ConvertError::invalid_timestamp(value))
    }

    fn format_timestamp(&self, value: SystemTime) -> String {
        httpdate::fmt_http_date(value)
    }
}
