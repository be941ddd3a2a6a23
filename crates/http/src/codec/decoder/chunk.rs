//! Chunk size lines of the chunked transfer coding.
//!
//! `chunk-size [ BWS ";" chunk-ext ] CRLF`, see
//! [RFC 9112 Section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1).

use tracing::trace;

use crate::protocol::DecodeError;

/// Parses the hexadecimal size of a chunk size line, ignoring any extensions.
///
/// The line terminator must already be stripped.
pub(crate) fn parse_chunk_size(line: &[u8]) -> Result<u64, DecodeError> {
    macro_rules! or_overflow {
        ($e:expr) => {
            match $e {
                Some(val) => val,
                None => return Err(DecodeError::invalid_chunk_size("chunk size overflows")),
            }
        };
    }

    let line = line.trim_ascii_start();
    let mut size: u64 = 0;
    let mut digits = 0;
    let mut rest: &[u8] = &[];

    for (index, b) in line.iter().enumerate() {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b + 10 - b'a',
            b'A'..=b'F' => b + 10 - b'A',
            b'\t' | b' ' | b';' => {
                rest = &line[index..];
                break;
            }
            _ => return Err(DecodeError::invalid_chunk_size(format!("invalid byte {b:#04x} in chunk size line"))),
        };
        size = or_overflow!(size.checked_mul(16));
        size = or_overflow!(size.checked_add(u64::from(digit)));
        digits += 1;
    }

    if digits == 0 {
        return Err(DecodeError::invalid_chunk_size("missing chunk size"));
    }

    // only whitespace may sit between the size and its extensions
    let rest = rest.trim_ascii_start();
    if !rest.is_empty() && rest[0] != b';' {
        return Err(DecodeError::invalid_chunk_size("invalid chunk size linear white space"));
    }

    trace!(chunk_size = size, has_extension = !rest.is_empty(), "parsed chunk size");
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_sizes() {
        assert_eq!(parse_chunk_size(b"0").unwrap(), 0);
        assert_eq!(parse_chunk_size(b"4").unwrap(), 4);
        assert_eq!(parse_chunk_size(b"1f").unwrap(), 31);
        assert_eq!(parse_chunk_size(b"1F").unwrap(), 31);
        assert_eq!(parse_chunk_size(b"  a").unwrap(), 10);
        assert_eq!(parse_chunk_size(b"ffffffffffffffff").unwrap(), u64::MAX);
    }

    #[test]
    fn extensions_are_ignored() {
        assert_eq!(parse_chunk_size(b"10;name=value").unwrap(), 16);
        assert_eq!(parse_chunk_size(b"10 ; name=\"quoted\"").unwrap(), 16);
        assert_eq!(parse_chunk_size(b"3\t").unwrap(), 3);
    }

    #[test]
    fn invalid_sizes() {
        assert!(matches!(parse_chunk_size(b""), Err(DecodeError::InvalidChunkSize { .. })));
        assert!(matches!(parse_chunk_size(b";ext"), Err(DecodeError::InvalidChunkSize { .. })));
        assert!(matches!(parse_chunk_size(b"zz"), Err(DecodeError::InvalidChunkSize { .. })));
        assert!(matches!(parse_chunk_size(b"-1"), Err(DecodeError::InvalidChunkSize { .. })));
        assert!(matches!(parse_chunk_size(b"4 x"), Err(DecodeError::InvalidChunkSize { .. })));
        assert!(matches!(parse_chunk_size(b"10000000000000000"), Err(DecodeError::InvalidChunkSize { .. })));
    }
}
