//! Header-level helpers shared by the decoder, encoder and aggregator.
//!
//! All of them read or rewrite an [`HttpHead`] in place; none of them look at the body.

use http::{StatusCode, Version, header};

use crate::ensure;
use crate::headers::HttpHeaders;
use crate::protocol::{DecodeError, HttpHead};

const CHUNKED: &str = "chunked";
const CLOSE: &str = "close";
const KEEP_ALIVE: &str = "keep-alive";
const CONTINUE: &str = "100-continue";

/// Whether the connection stays open after this message.
///
/// `Connection: close` always wins; otherwise HTTP/1.1 defaults to persistent and
/// HTTP/1.0 requires `Connection: keep-alive`.
pub fn is_keep_alive(head: &HttpHead) -> bool {
    let headers = head.headers();
    if contains_token(headers, header::CONNECTION.as_str(), CLOSE) {
        return false;
    }
    head.version() >= Version::HTTP_11 || contains_token(headers, header::CONNECTION.as_str(), KEEP_ALIVE)
}

/// Rewrites the `Connection` header so that [`is_keep_alive`] returns `keep_alive`.
pub fn set_keep_alive(head: &mut HttpHead, keep_alive: bool) {
    let version = head.version();
    let headers = head.headers_mut();
    match (keep_alive, version >= Version::HTTP_11) {
        (true, true) => {
            headers.remove(header::CONNECTION.as_str());
        }
        (true, false) => {
            headers.set(header::CONNECTION.as_str(), KEEP_ALIVE);
        }
        (false, true) => {
            headers.set(header::CONNECTION.as_str(), CLOSE);
        }
        (false, false) => {
            headers.remove(header::CONNECTION.as_str());
        }
    }
}

/// The declared `Content-Length`, `None` when absent or not a non-negative integer.
pub fn content_length(head: &HttpHead) -> Option<u64> {
    head.headers().get(header::CONTENT_LENGTH.as_str()).and_then(|value| value.trim().parse::<u64>().ok())
}

pub fn is_content_length_set(head: &HttpHead) -> bool {
    head.headers().contains(header::CONTENT_LENGTH.as_str())
}

pub fn set_content_length(head: &mut HttpHead, length: u64) {
    head.headers_mut().set(header::CONTENT_LENGTH.as_str(), length.to_string());
}

/// Whether the final transfer coding of the message is `chunked`.
pub fn is_transfer_encoding_chunked(headers: &HttpHeaders) -> bool {
    headers
        .get_all(header::TRANSFER_ENCODING.as_str())
        .last()
        .and_then(|value| value.rsplit(',').next())
        .is_some_and(|coding| coding.trim().eq_ignore_ascii_case(CHUNKED))
}

/// Switches the message to chunked framing, or strips `chunked` from its codings.
///
/// Turning chunked on removes `Content-Length`; turning it off removes the header
/// entirely when no other coding is left.
pub fn set_transfer_encoding_chunked(head: &mut HttpHead, chunked: bool) {
    let headers = head.headers_mut();
    if chunked {
        headers.set(header::TRANSFER_ENCODING.as_str(), CHUNKED);
        headers.remove(header::CONTENT_LENGTH.as_str());
        return;
    }

    let codings: Vec<String> = headers
        .get_all_and_remove(header::TRANSFER_ENCODING.as_str())
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|coding| !coding.is_empty() && !coding.eq_ignore_ascii_case(CHUNKED))
        .map(ToString::to_string)
        .collect();

    if !codings.is_empty() {
        headers.add(header::TRANSFER_ENCODING.as_str(), codings.join(", "));
    }
}

/// Whether an HTTP/1.1 request carries `Expect: 100-continue`.
pub fn is_100_continue_expected(head: &HttpHead) -> bool {
    is_expectation_version(head)
        && head.headers().get(header::EXPECT.as_str()).is_some_and(|value| value.trim().eq_ignore_ascii_case(CONTINUE))
}

/// Whether an HTTP/1.1 request carries an `Expect` other than `100-continue`.
pub fn is_unsupported_expectation(head: &HttpHead) -> bool {
    is_expectation_version(head)
        && head.headers().get(header::EXPECT.as_str()).is_some_and(|value| !value.trim().eq_ignore_ascii_case(CONTINUE))
}

/// Removes the `Expect` header once the expectation has been answered.
pub fn set_100_continue_handled(head: &mut HttpHead) {
    head.headers_mut().remove(header::EXPECT.as_str());
}

fn is_expectation_version(head: &HttpHead) -> bool {
    head.is_request() && head.version() >= Version::HTTP_11
}

/// Resolves every `Content-Length` value of a message into one length.
///
/// - no value: `Ok(None)`
/// - several values, or one comma-joined value, on HTTP/1.1: rejected unless
///   `allow_duplicates`, and then every value must be the same
/// - HTTP/1.0: the first header wins
/// - each value must be a plain run of digits
pub fn normalize_content_length(values: &[&str], is_http10: bool, allow_duplicates: bool) -> Result<Option<u64>, DecodeError> {
    let Some(first) = values.first() else {
        return Ok(None);
    };

    let multiple = values.len() > 1 || first.contains(',');
    let value = if multiple && !is_http10 {
        ensure!(allow_duplicates, DecodeError::invalid_content_length("multiple content-length values found"));

        let mut tokens = values.iter().flat_map(|value| value.split(',')).map(str::trim);
        let candidate = tokens.next().unwrap_or_default();
        ensure!(
            tokens.all(|token| token == candidate),
            DecodeError::invalid_content_length("multiple content-length values found")
        );
        candidate
    } else {
        first.trim()
    };

    ensure!(
        !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()),
        DecodeError::invalid_content_length(format!("value {value} is not a number"))
    );
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|_| DecodeError::invalid_content_length(format!("value {value} is out of range")))
}

/// Whether a response hands the connection over to a protocol other than HTTP/1.x.
pub fn is_switching_to_non_http1(head: &HttpHead) -> bool {
    if head.status() != Some(StatusCode::SWITCHING_PROTOCOLS) {
        return false;
    }
    match head.headers().get(header::UPGRADE.as_str()) {
        Some(protocol) => !protocol.contains("HTTP/1.0") && !protocol.contains("HTTP/1.1"),
        None => true,
    }
}

/// Checks that `name` is a non-empty RFC 9110 token.
pub fn validate_name(name: &str) -> Result<(), DecodeError> {
    ensure!(!name.is_empty(), DecodeError::invalid_header("empty header name"));
    if let Some(b) = name.bytes().find(|b| !is_token(*b)) {
        return Err(DecodeError::invalid_header(format!("invalid byte {b:#04x} in header name {name:?}")));
    }
    Ok(())
}

/// Checks that `value` carries no control bytes other than horizontal tab.
pub fn validate_value(value: &str) -> Result<(), DecodeError> {
    if let Some(b) = value.bytes().find(|b| b.is_ascii_control() && *b != b'\t') {
        return Err(DecodeError::invalid_header(format!("invalid byte {b:#04x} in header value")));
    }
    Ok(())
}

#[inline]
fn is_token(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn contains_token(headers: &HttpHeaders, name: &str, token: &str) -> bool {
    headers.get_all(name).iter().flat_map(|value| value.split(',')).any(|item| item.trim().eq_ignore_ascii_case(token))
}
