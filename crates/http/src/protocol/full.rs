//! Fully buffered messages.
//!
//! A [`FullMessage`] is what the aggregator hands to the application, and what an
//! application can hand to the encoder in one piece.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;

use crate::headers::HttpHeaders;
use crate::protocol::{CodecError, DecoderResult, HttpHead, StartLine};

/// Head, whole body and trailers of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct FullMessage {
    head: HttpHead,
    content: Bytes,
    trailers: HttpHeaders,
}

impl FullMessage {
    pub fn new(head: HttpHead, content: Bytes) -> Self {
        Self { head, content, trailers: HttpHeaders::new() }
    }

    pub fn with_trailers(head: HttpHead, content: Bytes, trailers: HttpHeaders) -> Self {
        Self { head, content, trailers }
    }

    /// An HTTP/1.1 request with the given body.
    pub fn request(method: Method, target: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self::new(HttpHead::request(method, target), content.into())
    }

    /// An HTTP/1.1 response with the given body.
    pub fn response(status: StatusCode, content: impl Into<Bytes>) -> Self {
        Self::new(HttpHead::response(status), content.into())
    }

    pub fn head(&self) -> &HttpHead {
        &self.head
    }

    pub fn head_mut(&mut self) -> &mut HttpHead {
        &mut self.head
    }

    pub fn headers(&self) -> &HttpHeaders {
        self.head.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HttpHeaders {
        self.head.headers_mut()
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn trailers(&self) -> &HttpHeaders {
        &self.trailers
    }

    pub fn trailers_mut(&mut self) -> &mut HttpHeaders {
        &mut self.trailers
    }

    pub fn decoder_result(&self) -> &DecoderResult {
        self.head.decoder_result()
    }

    pub fn into_parts(self) -> (HttpHead, Bytes, HttpHeaders) {
        (self.head, self.content, self.trailers)
    }

    /// Converts a request into an `http::Request`. Trailers are not carried over.
    pub fn into_http_request(self) -> Result<Request<Full<Bytes>>, CodecError> {
        let (start_line, headers) = self.head.into_parts();
        let StartLine::Request(line) = start_line else {
            return Err(CodecError::unexpected_message("expected a request, found a response"));
        };

        let mut builder = Request::builder().method(line.method().clone()).uri(line.target()).version(line.version());
        for (name, value) in &headers {
            builder = builder.header(header_name(name)?, header_value(value)?);
        }
        builder.body(Full::new(self.content)).map_err(CodecError::unexpected_message)
    }

    /// Converts a response into an `http::Response`. The reason phrase and trailers are
    /// not carried over.
    pub fn into_http_response(self) -> Result<Response<Full<Bytes>>, CodecError> {
        let (start_line, headers) = self.head.into_parts();
        let StartLine::Response(line) = start_line else {
            return Err(CodecError::unexpected_message("expected a response, found a request"));
        };

        let mut builder = Response::builder().status(line.status()).version(line.version());
        for (name, value) in &headers {
            builder = builder.header(header_name(name)?, header_value(value)?);
        }
        builder.body(Full::new(self.content)).map_err(CodecError::unexpected_message)
    }
}

fn header_name(name: &str) -> Result<HeaderName, CodecError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(CodecError::unexpected_message)
}

fn header_value(value: &str) -> Result<HeaderValue, CodecError> {
    HeaderValue::from_str(value).map_err(CodecError::unexpected_message)
}
