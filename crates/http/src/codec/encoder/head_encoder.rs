//! Start line and header block serialization.
//!
//! Everything goes out as ASCII. Characters outside ASCII are replaced by `?` instead of
//! failing the whole message.

use bytes::{BufMut, BytesMut};

use crate::headers::HttpHeaders;
use crate::protocol::{HttpHead, StartLine, version_str};

const CRLF: &[u8] = b"\r\n";

/// Bytes the head of `head` takes on the wire, used to reserve space once.
pub(crate) fn encoded_len(head: &HttpHead) -> usize {
    // versions are 8 bytes, status codes 3, plus two separating spaces
    let start_line = match head.start_line() {
        StartLine::Request(line) => line.method().as_str().len() + line.target().len() + 10,
        StartLine::Response(line) => line.reason().len() + 13,
    };
    start_line + 2 + fields_len(head.headers()) + 2
}

pub(crate) fn fields_len(fields: &HttpHeaders) -> usize {
    fields.iter().map(|(name, value)| name.len() + value.len() + 4).sum()
}

/// Writes the start line, the headers and the blank line that ends the head.
pub(crate) fn write_head(head: &HttpHead, dst: &mut BytesMut) {
    dst.reserve(encoded_len(head));

    match head.start_line() {
        StartLine::Request(line) => {
            dst.put_slice(line.method().as_str().as_bytes());
            dst.put_u8(b' ');
            put_ascii(line.target(), dst);
            dst.put_u8(b' ');
            dst.put_slice(version_str(line.version()).as_bytes());
        }
        StartLine::Response(line) => {
            dst.put_slice(version_str(line.version()).as_bytes());
            dst.put_u8(b' ');
            dst.put_slice(line.status().as_str().as_bytes());
            dst.put_u8(b' ');
            put_ascii(line.reason(), dst);
        }
    }
    dst.put_slice(CRLF);

    write_fields(head.headers(), dst);
    dst.put_slice(CRLF);
}

/// Writes `name: value CRLF` for every field, in insertion order.
pub(crate) fn write_fields(fields: &HttpHeaders, dst: &mut BytesMut) {
    for (name, value) in fields {
        put_ascii(name, dst);
        dst.put_slice(b": ");
        put_ascii(value, dst);
        dst.put_slice(CRLF);
    }
}

#[inline]
fn put_ascii(text: &str, dst: &mut BytesMut) {
    if text.is_ascii() {
        dst.put_slice(text.as_bytes());
        return;
    }
    for c in text.chars() {
        dst.put_u8(u8::try_from(c).ok().filter(u8::is_ascii).unwrap_or(b'?'));
    }
}
