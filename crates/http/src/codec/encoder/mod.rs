//! HTTP/1.1 message encoder.
//!
//! [`HttpEncoder`] is the mirror of the decoder: it takes the same [`HttpEvent`]
//! vocabulary, or a whole [`FullMessage`], and writes wire bytes. The body framing is
//! picked from the head: `Transfer-Encoding: chunked` selects chunked framing, anything
//! else passes body bytes through as they come.
//!
//! # Example
//!
//! ```
//! use bytes::{Bytes, BytesMut};
//! use http::StatusCode;
//! use micro_http_codec::codec::HttpEncoder;
//! use micro_http_codec::protocol::{HttpEvent, HttpHead, LastContent};
//! use tokio_util::codec::Encoder;
//!
//! let mut encoder = HttpEncoder::new();
//! let mut dst = BytesMut::new();
//!
//! let mut head = HttpHead::response(StatusCode::OK);
//! head.headers_mut().add("Transfer-Encoding", "chunked");
//! encoder.encode(HttpEvent::Head(head), &mut dst).unwrap();
//! encoder.encode(HttpEvent::Content(Bytes::from_static(b"hello")), &mut dst).unwrap();
//! encoder.encode(HttpEvent::LastContent(LastContent::empty()), &mut dst).unwrap();
//!
//! assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n");
//! ```

mod chunked_encoder;
mod head_encoder;

use bytes::{BufMut, Bytes, BytesMut};
use http::{StatusCode, header};
use tokio_util::codec::Encoder;
use tracing::{error, trace};

use crate::protocol::{CodecError, FullMessage, HttpEvent, HttpHead, LastContent, util};
use chunked_encoder::{write_chunk, write_last_chunk};

/// Bodies up to this size are written into the same buffer reservation as the head.
const MAX_COALESCED_CONTENT: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EncoderState {
    /// Waiting for a head.
    #[default]
    Init,
    /// Body bytes pass through unchanged.
    ContentLength,
    Chunked,
    /// The message carries no body; content is dropped.
    AlwaysEmpty,
}

/// Stateful HTTP/1.1 serializer, one per connection and direction.
#[derive(Debug, Default)]
pub struct HttpEncoder {
    state: EncoderState,
    content_empty: bool,
}

impl HttpEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the body of the next message empty whatever its headers say.
    ///
    /// A response to `HEAD` keeps the `Content-Length` of the resource but sends no body.
    pub fn expect_empty_content(&mut self) {
        self.content_empty = true;
    }

    /// Whether the encoder waits for the head of a new message.
    pub fn is_idle(&self) -> bool {
        self.state == EncoderState::Init
    }

    fn encode_head(&mut self, mut head: HttpHead, dst: &mut BytesMut) -> Result<(), CodecError> {
        if self.state != EncoderState::Init {
            error!(state = ?self.state, "expect content but receive message head");
            return Err(CodecError::unexpected_message("message head while the previous body is still being encoded"));
        }

        let status_empty = is_content_always_empty(&head);
        if status_empty {
            sanitize_empty_response(&mut head);
        }
        let always_empty = std::mem::take(&mut self.content_empty) || status_empty;

        head_encoder::write_head(&head, dst);

        self.state = if always_empty {
            EncoderState::AlwaysEmpty
        } else if util::is_transfer_encoding_chunked(head.headers()) {
            EncoderState::Chunked
        } else {
            EncoderState::ContentLength
        };
        trace!(start_line = %head.start_line(), state = ?self.state, "encoded head");
        Ok(())
    }

    fn encode_content(&mut self, content: &Bytes, dst: &mut BytesMut) -> Result<(), CodecError> {
        match self.state {
            EncoderState::Init => {
                error!("expect message head but receive content");
                Err(CodecError::unexpected_message("content before any message head"))
            }
            EncoderState::ContentLength => {
                dst.put_slice(content);
                Ok(())
            }
            EncoderState::Chunked => Ok(write_chunk(content, dst)?),
            EncoderState::AlwaysEmpty => {
                if !content.is_empty() {
                    trace!(content_size = content.len(), "dropping content of a message without body");
                }
                Ok(())
            }
        }
    }

    fn encode_last(&mut self, last: LastContent, dst: &mut BytesMut) -> Result<(), CodecError> {
        if self.state == EncoderState::Init {
            error!("expect message head but receive last content");
            return Err(CodecError::unexpected_message("last content before any message head"));
        }

        let (content, trailers, _) = last.into_parts();
        self.encode_content(&content, dst)?;
        if self.state == EncoderState::Chunked {
            write_last_chunk(&trailers, dst);
        }

        self.state = EncoderState::Init;
        Ok(())
    }
}

impl Encoder<HttpEvent> for HttpEncoder {
    type Error = CodecError;

    fn encode(&mut self, item: HttpEvent, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            HttpEvent::Head(head) => self.encode_head(head, dst),
            HttpEvent::Content(content) => self.encode_content(&content, dst),
            HttpEvent::LastContent(last) => self.encode_last(last, dst),
        }
    }
}

impl Encoder<FullMessage> for HttpEncoder {
    type Error = CodecError;

    /// Encodes head, body and trailers in one go.
    ///
    /// A response, or a request with a body, that carries no framing header gets a
    /// `Content-Length` of its body.
    fn encode(&mut self, item: FullMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, content, trailers) = item.into_parts();

        let framed = util::is_content_length_set(&head) || util::is_transfer_encoding_chunked(head.headers());
        let needs_length = !head.is_request() || !content.is_empty();
        if !framed && needs_length && !self.content_empty && !is_content_always_empty(&head) {
            util::set_content_length(&mut head, content.len() as u64);
        }

        let mut reserve = head_encoder::encoded_len(&head);
        if content.len() <= MAX_COALESCED_CONTENT {
            reserve += content.len() + 16;
        }
        dst.reserve(reserve);

        self.encode_head(head, dst)?;
        self.encode_last(LastContent::with_trailers(content, trailers), dst)
    }
}

/// Responses whose status forbids a body.
fn is_content_always_empty(head: &HttpHead) -> bool {
    let Some(status) = head.status() else {
        return false;
    };

    if status == StatusCode::SWITCHING_PROTOCOLS {
        // an old style websocket handshake answers with a body
        let legacy_websocket = !head.headers().contains(header::SEC_WEBSOCKET_ACCEPT.as_str())
            && head.headers().get(header::UPGRADE.as_str()).is_some_and(|value| value.eq_ignore_ascii_case("websocket"));
        return !legacy_websocket;
    }

    status.is_informational()
        || matches!(status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT | StatusCode::NOT_MODIFIED)
}

/// Drops framing headers a bodiless status must not carry.
fn sanitize_empty_response(head: &mut HttpHead) {
    let Some(status) = head.status() else {
        return;
    };

    let headers = head.headers_mut();
    if status.is_informational() || status == StatusCode::NO_CONTENT {
        headers.remove(header::CONTENT_LENGTH.as_str());
        headers.remove(header::TRANSFER_ENCODING.as_str());
    } else if status == StatusCode::RESET_CONTENT {
        headers.remove(header::TRANSFER_ENCODING.as_str());
        headers.set(header::CONTENT_LENGTH.as_str(), "0");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    use crate::headers::HttpHeaders;

    fn encode_events(encoder: &mut HttpEncoder, events: Vec<HttpEvent>) -> BytesMut {
        let mut dst = BytesMut::new();
        for event in events {
            encoder.encode(event, &mut dst).unwrap();
        }
        dst
    }

    #[test]
    fn content_length_body() {
        let mut head = HttpHead::request(Method::POST, "/upload");
        head.headers_mut().add("Content-Length", "6");

        let dst = encode_events(
            &mut HttpEncoder::new(),
            vec![
                HttpEvent::Head(head),
                HttpEvent::Content(Bytes::from_static(b"abc")),
                HttpEvent::LastContent(LastContent::new(Bytes::from_static(b"def"))),
            ],
        );
        assert_eq!(&dst[..], b"POST /upload HTTP/1.1\r\nContent-Length: 6\r\n\r\nabcdef");
    }

    #[test]
    fn chunked_body_with_trailers() {
        let mut head = HttpHead::response(StatusCode::OK);
        head.headers_mut().add("Transfer-Encoding", "chunked");
        let mut trailers = HttpHeaders::new();
        trailers.add("X-Checksum", "1");

        let dst = encode_events(
            &mut HttpEncoder::new(),
            vec![
                HttpEvent::Head(head),
                HttpEvent::Content(Bytes::from_static(b"test")),
                HttpEvent::Content(Bytes::new()),
                HttpEvent::LastContent(LastContent::with_trailers(Bytes::from_static(b"!"), trailers)),
            ],
        );
        assert_eq!(
            &dst[..],
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\ntest\r\n1\r\n!\r\n0\r\nX-Checksum: 1\r\n\r\n"
        );
    }

    #[test]
    fn bodiless_statuses_are_sanitized() {
        let mut head = HttpHead::response(StatusCode::NO_CONTENT);
        head.headers_mut().add("Content-Length", "4").add("Transfer-Encoding", "chunked");
        let dst = encode_events(
            &mut HttpEncoder::new(),
            vec![HttpEvent::Head(head), HttpEvent::LastContent(LastContent::new(Bytes::from_static(b"body")))],
        );
        assert_eq!(&dst[..], b"HTTP/1.1 204 No Content\r\n\r\n");

        let mut head = HttpHead::response(StatusCode::RESET_CONTENT);
        head.headers_mut().add("Transfer-Encoding", "chunked");
        let dst = encode_events(&mut HttpEncoder::new(), vec![HttpEvent::Head(head), HttpEvent::LastContent(LastContent::empty())]);
        assert_eq!(&dst[..], b"HTTP/1.1 205 Reset Content\r\ncontent-length: 0\r\n\r\n");

        let mut head = HttpHead::response(StatusCode::NOT_MODIFIED);
        head.headers_mut().add("Content-Length", "4");
        let dst = encode_events(&mut HttpEncoder::new(), vec![HttpEvent::Head(head), HttpEvent::LastContent(LastContent::empty())]);
        assert_eq!(&dst[..], b"HTTP/1.1 304 Not Modified\r\nContent-Length: 4\r\n\r\n");
    }

    #[test]
    fn head_response_keeps_length_but_drops_body() {
        let mut encoder = HttpEncoder::new();
        encoder.expect_empty_content();

        let mut head = HttpHead::response(StatusCode::OK);
        head.headers_mut().add("Content-Length", "5");
        let dst = encode_events(
            &mut encoder,
            vec![HttpEvent::Head(head), HttpEvent::LastContent(LastContent::new(Bytes::from_static(b"hello")))],
        );
        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n");

        // the declaration only covers one message
        let dst = encode_events(
            &mut encoder,
            vec![
                HttpEvent::Head(HttpHead::response(StatusCode::OK)),
                HttpEvent::LastContent(LastContent::new(Bytes::from_static(b"x"))),
            ],
        );
        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\n\r\nx");
    }

    #[test]
    fn out_of_phase_events() {
        let mut encoder = HttpEncoder::new();
        let mut dst = BytesMut::new();

        let result = encoder.encode(HttpEvent::Content(Bytes::from_static(b"x")), &mut dst);
        assert!(matches!(result, Err(CodecError::UnexpectedMessage { .. })));
        let result = encoder.encode(HttpEvent::LastContent(LastContent::empty()), &mut dst);
        assert!(matches!(result, Err(CodecError::UnexpectedMessage { .. })));

        encoder.encode(HttpEvent::Head(HttpHead::request(Method::GET, "/")), &mut dst).unwrap();
        let result = encoder.encode(HttpEvent::Head(HttpHead::request(Method::GET, "/")), &mut dst);
        assert!(matches!(result, Err(CodecError::UnexpectedMessage { .. })));
        assert!(!encoder.is_idle());
    }

    #[test]
    fn full_message_gets_content_length() {
        let mut encoder = HttpEncoder::new();
        let mut dst = BytesMut::new();
        encoder.encode(FullMessage::response(StatusCode::OK, "hello"), &mut dst).unwrap();
        assert_eq!(&dst[..], b"HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nhello");
        assert!(encoder.is_idle());

        let mut message = FullMessage::request(Method::PUT, "/", "data");
        message.headers_mut().add("Transfer-Encoding", "chunked");
        let mut dst = BytesMut::new();
        encoder.encode(message, &mut dst).unwrap();
        assert_eq!(&dst[..], b"PUT / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\ndata\r\n0\r\n\r\n");
    }
}
