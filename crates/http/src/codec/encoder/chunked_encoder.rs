//! Chunked transfer coding on the way out.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};

use super::head_encoder::{fields_len, write_fields};
use crate::headers::HttpHeaders;

/// `HEX CRLF data CRLF`; nothing at all for empty data, which would read as the last chunk.
pub(crate) fn write_chunk(data: &[u8], dst: &mut BytesMut) -> io::Result<()> {
    if data.is_empty() {
        return Ok(());
    }

    dst.reserve(data.len() + 20);
    write!(FastWrite(dst), "{:X}\r\n", data.len())?;
    dst.put_slice(data);
    dst.put_slice(b"\r\n");
    Ok(())
}

/// `0 CRLF`, the trailer fields, and the final `CRLF`.
pub(crate) fn write_last_chunk(trailers: &HttpHeaders, dst: &mut BytesMut) {
    dst.reserve(fields_len(trailers) + 5);
    dst.put_slice(b"0\r\n");
    write_fields(trailers, dst);
    dst.put_slice(b"\r\n");
}

/// Formatting straight into the buffer; space has been reserved already.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
