use bytes::Bytes;
use http::{Method, StatusCode, Version};
use triomphe::Arc;

use crate::headers::HttpHeaders;
use crate::protocol::{DecodeError, RequestLine, StartLine, StatusLine};

/// Outcome of decoding the event it is attached to.
///
/// Framing failures travel with the data instead of being returned as errors, so the
/// application decides what to do with a broken message.
#[derive(Debug, Clone, Default)]
pub enum DecoderResult {
    #[default]
    Success,
    Failure(Arc<DecodeError>),
}

impl DecoderResult {
    pub fn failure(cause: DecodeError) -> Self {
        Self::Failure(Arc::new(cause))
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn cause(&self) -> Option<&DecodeError> {
        match self {
            Self::Success => None,
            Self::Failure(cause) => Some(cause),
        }
    }
}

impl PartialEq for DecoderResult {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Success, Self::Success) => true,
            (Self::Failure(a), Self::Failure(b)) => Arc::ptr_eq(a, b) || a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

/// Start line plus headers of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpHead {
    start_line: StartLine,
    headers: HttpHeaders,
    result: DecoderResult,
}

impl HttpHead {
    pub fn new(start_line: impl Into<StartLine>, headers: HttpHeaders) -> Self {
        Self { start_line: start_line.into(), headers, result: DecoderResult::Success }
    }

    /// An HTTP/1.1 request head without headers.
    pub fn request(method: Method, target: impl Into<String>) -> Self {
        Self::new(RequestLine::new(method, target, Version::HTTP_11), HttpHeaders::new())
    }

    /// An HTTP/1.1 response head without headers.
    pub fn response(status: StatusCode) -> Self {
        Self::new(StatusLine::new(Version::HTTP_11, status), HttpHeaders::new())
    }

    pub fn start_line(&self) -> &StartLine {
        &self.start_line
    }

    pub fn start_line_mut(&mut self) -> &mut StartLine {
        &mut self.start_line
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HttpHeaders {
        &mut self.headers
    }

    pub fn version(&self) -> Version {
        self.start_line.version()
    }

    pub fn method(&self) -> Option<&Method> {
        self.start_line.method()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.start_line.status()
    }

    #[inline]
    pub fn is_request(&self) -> bool {
        self.start_line.is_request()
    }

    pub fn decoder_result(&self) -> &DecoderResult {
        &self.result
    }

    pub fn set_decoder_result(&mut self, result: DecoderResult) {
        self.result = result;
    }

    pub fn into_parts(self) -> (StartLine, HttpHeaders) {
        (self.start_line, self.headers)
    }
}

/// The final body event of a message, carrying any trailer fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LastContent {
    content: Bytes,
    trailers: HttpHeaders,
    result: DecoderResult,
}

impl LastContent {
    pub fn new(content: Bytes) -> Self {
        Self { content, trailers: HttpHeaders::new(), result: DecoderResult::Success }
    }

    /// The empty terminator used when a message has no (more) body.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_trailers(content: Bytes, trailers: HttpHeaders) -> Self {
        Self { content, trailers, result: DecoderResult::Success }
    }

    /// An empty terminator marking the message as broken.
    pub fn failed(cause: DecodeError) -> Self {
        Self { result: DecoderResult::failure(cause), ..Self::default() }
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
        &self.result
    }

    pub fn set_decoder_result(&mut self, result: DecoderResult) {
        self.result = result;
    }

    pub fn into_parts(self) -> (Bytes, HttpHeaders, DecoderResult) {
        (self.content, self.trailers, self.result)
    }
}

/// One step of an HTTP message stream, in both directions.
///
/// A message is always one `Head`, any number of `Content`, then one `LastContent`.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpEvent {
    Head(HttpHead),
    Content(Bytes),
    LastContent(LastContent),
}

impl HttpEvent {
    #[inline]
    pub fn is_head(&self) -> bool {
        matches!(self, HttpEvent::Head(_))
    }

    #[inline]
    pub fn is_last(&self) -> bool {
        matches!(self, HttpEvent::LastContent(_))
    }

    /// Body bytes carried by the event, if any.
    pub fn content(&self) -> Option<&Bytes> {
        match self {
            HttpEvent::Head(_) => None,
            HttpEvent::Content(bytes) => Some(bytes),
            HttpEvent::LastContent(last) => Some(last.content()),
        }
    }

    pub fn decoder_result(&self) -> &DecoderResult {
        const SUCCESS: &DecoderResult = &DecoderResult::Success;
        match self {
            HttpEvent::Head(head) => head.decoder_result(),
            HttpEvent::Content(_) => SUCCESS,
            HttpEvent::LastContent(last) => last.decoder_result(),
        }
    }

    pub fn into_head(self) -> Option<HttpHead> {
        match self {
            HttpEvent::Head(head) => Some(head),
            _ => None,
        }
    }
}

impl From<HttpHead> for HttpEvent {
    fn from(head: HttpHead) -> Self {
        HttpEvent::Head(head)
    }
}

impl From<Bytes> for HttpEvent {
    fn from(bytes: Bytes) -> Self {
        HttpEvent::Content(bytes)
    }
}

impl From<LastContent> for HttpEvent {
    fn from(last: LastContent) -> Self {
        HttpEvent::LastContent(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_result_equality() {
        let a = DecoderResult::failure(DecodeError::UnsupportedChunked);
        let b = DecoderResult::failure(DecodeError::UnsupportedChunked);
        assert_eq!(a, b);
        assert_ne!(a, DecoderResult::Success);
        assert_ne!(a, DecoderResult::failure(DecodeError::PrematureClosure("content")));
        assert!(a.is_failure());
        assert!(matches!(a.cause(), Some(DecodeError::UnsupportedChunked)));
    }

    #[test]
    fn event_accessors() {
        let head = HttpEvent::from(HttpHead::request(Method::GET, "/"));
        assert!(head.is_head());
        assert_eq!(head.content(), None);

        let content = HttpEvent::from(Bytes::from_static(b"abc"));
        assert_eq!(content.content(), Some(&Bytes::from_static(b"abc")));
        assert!(content.decoder_result().is_success());

        let last = HttpEvent::from(LastContent::failed(DecodeError::PrematureClosure("content")));
        assert!(last.is_last());
        assert!(last.decoder_result().is_failure());
        assert_eq!(last.content(), Some(&Bytes::new()));
    }
}
