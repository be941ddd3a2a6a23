//! HTTP/1.1 message decoder.
//!
//! [`HttpDecoder`] turns a byte stream into [`HttpEvent`]s: one `Head`, any number of
//! `Content`, one `LastContent` per message. It is a [`ProtocolDecoder`], so it runs on
//! top of a [`ByteToMessage`](crate::codec::ByteToMessage) which hides how the transport
//! fragmented the stream.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use micro_http_codec::codec::{ByteToMessage, Cumulator, DecoderConfig, HttpDecoder};
//! use micro_http_codec::protocol::HttpEvent;
//!
//! let mut decoder = ByteToMessage::new(HttpDecoder::request(DecoderConfig::default()), Cumulator::Merge);
//! let mut events = Vec::new();
//! decoder.feed(Bytes::from_static(b"GET /x HTTP/1.1\r\nHost: a\r\n\r\n"), &mut events).unwrap();
//!
//! assert!(matches!(&events[0], HttpEvent::Head(head) if head.headers().get("host") == Some("a")));
//! assert!(matches!(&events[1], HttpEvent::LastContent(last) if last.content().is_empty()));
//! ```
//!
//! # Failures
//!
//! Framing errors are never returned. The decoder attaches them to the head (or, once the
//! head went out, to an empty last content) as [`DecoderResult::Failure`], moves to
//! [`State::BadMessage`] and drops everything until [`reset`](HttpDecoder::reset).

mod chunk;
mod line_parser;
mod state;

pub use state::State;

use std::collections::VecDeque;

use bytes::Buf;
use http::{Method, StatusCode, Version, header};
use tracing::{debug, trace};

use crate::codec::{Cumulation, DecoderConfig, ProtocolDecoder};
use crate::ensure;
use crate::headers::HttpHeaders;
use crate::protocol::{
    DecodeError, DecoderResult, HttpEvent, HttpHead, LastContent, RequestLine, StartLine, StatusLine, util,
};
use chunk::parse_chunk_size;
use line_parser::{FieldReader, FieldRules, LineLimit, LineParser, line_to_string};

/// Which kind of message a decoder reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Reads requests, the server side.
    Request,
    /// Reads responses, the client side.
    Response,
}

/// Streaming HTTP/1.1 decoder, one per connection and direction.
#[derive(Debug)]
pub struct HttpDecoder {
    direction: Direction,
    config: DecoderConfig,
    state: State,
    reset_requested: bool,

    line_parser: LineParser,
    fields: FieldReader,

    /// Head being parsed; taken when it is emitted.
    head: Option<HttpHead>,
    head_emitted: bool,
    trailers: HttpHeaders,
    content_length: Option<u64>,
    chunked: bool,
    /// The current message hands the stream over to another protocol once complete.
    switching: bool,

    /// Methods of the requests whose responses have not been decoded yet.
    pending_methods: VecDeque<Method>,
}

impl HttpDecoder {
    pub fn new(direction: Direction, config: DecoderConfig) -> Self {
        Self {
            direction,
            config,
            state: State::SkipControlChars,
            reset_requested: false,
            line_parser: LineParser::new(LineLimit::InitialLine(config.max_initial_line_length)),
            fields: FieldReader::new(config.max_header_size),
            head: None,
            head_emitted: false,
            trailers: HttpHeaders::new(),
            content_length: None,
            chunked: false,
            switching: false,
            pending_methods: VecDeque::new(),
        }
    }

    /// A decoder for requests.
    pub fn request(config: DecoderConfig) -> Self {
        Self::new(Direction::Request, config)
    }

    /// A decoder for responses.
    pub fn response(config: DecoderConfig) -> Self {
        Self::new(Direction::Response, config)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Whether the stream was handed over to another protocol.
    pub fn is_upgraded(&self) -> bool {
        self.state == State::Upgraded
    }

    /// Requests a reset, applied at the start of the next decode call.
    ///
    /// All state of the current message is dropped and the decoder waits for a new
    /// message. Used to leave [`State::BadMessage`], and to resynchronize after the
    /// application refused a message body.
    pub fn reset(&mut self) {
        self.reset_requested = true;
    }

    /// Records the method of a request sent on this connection, so that its response is
    /// framed correctly: a response to `HEAD` has no body, a successful response to
    /// `CONNECT` opens a tunnel. Only meaningful when decoding responses.
    pub fn expect_response_to(&mut self, method: Method) {
        if self.direction == Direction::Response {
            self.pending_methods.push_back(method);
        }
    }

    /// Clears all message state and returns the state to continue in.
    fn reset_now(&mut self) -> State {
        let next = if self.switching { State::Upgraded } else { State::SkipControlChars };
        trace!(next_state = ?next, "reset decoder");

        self.reset_requested = false;
        self.line_parser.reset();
        self.fields.reset();
        self.head = None;
        self.head_emitted = false;
        self.trailers = HttpHeaders::new();
        self.content_length = None;
        self.chunked = false;
        self.switching = false;
        next
    }

    /// Runs one state, returning the next one, or `None` when more input is needed.
    fn step(&mut self, src: &mut Cumulation, out: &mut Vec<HttpEvent>) -> Result<Option<State>, DecodeError> {
        match self.state {
            State::SkipControlChars => Ok(skip_control_chars(src)),
            State::ReadInitialLine => self.read_initial_line(src),
            State::ReadHeaders => self.read_headers(src, out),
            State::ReadVariableLengthContent => {
                let size = src.remaining().min(self.config.chunk_limit());
                if size > 0 {
                    out.push(HttpEvent::Content(src.copy_to_bytes(size)));
                }
                Ok(None)
            }
            State::ReadFixedLengthContent { remaining } => Ok(self.read_fixed_length_content(src, out, remaining)),
            State::ReadChunkSize => {
                let Some(line) = self.line_parser.parse(src)? else {
                    return Ok(None);
                };
                self.line_parser.reset();
                match parse_chunk_size(&line)? {
                    0 => Ok(Some(State::ReadChunkFooter)),
                    size => Ok(Some(State::ReadChunkedContent { remaining: size })),
                }
            }
            State::ReadChunkedContent { remaining } => Ok(self.read_chunked_content(src, out, remaining)),
            State::ReadChunkDelimiter => match src.find_byte(b'\n', 0) {
                Some(lf) => {
                    src.advance(lf + 1);
                    Ok(Some(State::ReadChunkSize))
                }
                None => {
                    src.advance(src.remaining());
                    Ok(None)
                }
            },
            State::ReadChunkFooter => self.read_chunk_footer(src, out),
            State::BadMessage => {
                src.advance(src.remaining());
                Ok(None)
            }
            State::Upgraded => {
                let size = src.remaining();
                if size > 0 {
                    out.push(HttpEvent::Content(src.copy_to_bytes(size)));
                }
                Ok(None)
            }
        }
    }

    fn read_initial_line(&mut self, src: &mut Cumulation) -> Result<Option<State>, DecodeError> {
        let Some(line) = self.line_parser.parse(src)? else {
            return Ok(None);
        };
        self.line_parser.reset();
        trace!(line_size = line.len(), "read initial line");

        let text = line_to_string(&line);
        let Some((first, second, third)) = split_initial_line(&text) else {
            debug!(line = %text, "dropping malformed initial line");
            return Ok(Some(State::SkipControlChars));
        };

        let start_line: StartLine = match self.direction {
            Direction::Request => {
                if third.is_empty() {
                    debug!(line = %text, "dropping request line without version");
                    return Ok(Some(State::SkipControlChars));
                }
                RequestLine::parse(first, second, third)?.into()
            }
            Direction::Response => StatusLine::parse(first, second, third)?.into(),
        };

        self.head = Some(HttpHead::new(start_line, HttpHeaders::new()));
        Ok(Some(State::ReadHeaders))
    }

    fn read_headers(&mut self, src: &mut Cumulation, out: &mut Vec<HttpEvent>) -> Result<Option<State>, DecodeError> {
        let Some(head) = self.head.as_mut() else {
            return Err(DecodeError::invalid_header("header block without initial line"));
        };

        let rules = FieldRules {
            validate: self.config.validate_headers,
            lenient_name: self.direction == Direction::Response,
            trailers: false,
        };
        if !self.fields.read(src, head.headers_mut(), rules)? {
            return Ok(None);
        }

        self.on_headers_complete(out).map(Some)
    }

    /// Picks the body framing once the blank line after the headers was read.
    fn on_headers_complete(&mut self, out: &mut Vec<HttpEvent>) -> Result<State, DecodeError> {
        let Some(mut head) = self.head.take() else {
            return Err(DecodeError::invalid_header("header block without initial line"));
        };

        let result = self.select_framing(&mut head);
        let next = match result {
            Ok(next) => next,
            Err(cause) => {
                // keep the head so that the failure is reported on it
                self.head = Some(head);
                return Err(cause);
            }
        };

        trace!(start_line = %head.start_line(), headers = head.headers().len(), next_state = ?next, "decoded head");
        out.push(HttpEvent::Head(head));
        self.head_emitted = true;

        match next {
            State::SkipControlChars | State::ReadFixedLengthContent { remaining: 0 } => {
                out.push(HttpEvent::LastContent(LastContent::empty()));
                Ok(self.reset_now())
            }
            next => Ok(next),
        }
    }

    fn select_framing(&mut self, head: &mut HttpHead) -> Result<State, DecodeError> {
        let is_http10 = head.version() == Version::HTTP_10;
        let lengths = head.headers().get_all(header::CONTENT_LENGTH.as_str());
        let content_length =
            util::normalize_content_length(&lengths, is_http10, self.config.allow_duplicate_content_lengths)?;
        let rewrite = lengths.len() > 1 || lengths.first().is_some_and(|value| value.contains(','));
        if let (Some(length), true) = (content_length, rewrite) {
            util::set_content_length(head, length);
        }

        let method = self.method_for_response(head);
        self.switching = self.direction == Direction::Response
            && (util::is_switching_to_non_http1(head) || opens_tunnel(method.as_ref(), head.status()));

        if self.is_content_always_empty(head, method.as_ref()) {
            util::set_transfer_encoding_chunked(head, false);
            return Ok(State::SkipControlChars);
        }

        if util::is_transfer_encoding_chunked(head.headers()) {
            ensure!(self.config.chunked_supported, DecodeError::UnsupportedChunked);
            self.chunked = true;
            if content_length.is_some() && head.version() == Version::HTTP_11 {
                // chunked framing wins, a length next to it is a smuggling vector
                head.headers_mut().remove(header::CONTENT_LENGTH.as_str());
            } else {
                self.content_length = content_length;
            }
            return Ok(State::ReadChunkSize);
        }

        self.content_length = content_length;
        match (content_length, self.direction) {
            (Some(length), _) => Ok(State::ReadFixedLengthContent { remaining: length }),
            (None, Direction::Request) => Ok(State::SkipControlChars),
            (None, Direction::Response) => Ok(State::ReadVariableLengthContent),
        }
    }

    /// The method of the request a response answers. Interim responses keep it queued.
    fn method_for_response(&mut self, head: &HttpHead) -> Option<Method> {
        match head.status() {
            Some(status) if !status.is_informational() => self.pending_methods.pop_front(),
            _ => None,
        }
    }

    fn is_content_always_empty(&self, head: &HttpHead, method: Option<&Method>) -> bool {
        let Some(status) = head.status() else {
            return false;
        };

        if status.is_informational() {
            // an old style websocket handshake response still carries a body
            let legacy_websocket = status == StatusCode::SWITCHING_PROTOCOLS
                && !head.headers().contains(header::SEC_WEBSOCKET_ACCEPT.as_str())
                && head.headers().get(header::UPGRADE.as_str()).is_some_and(|value| value.eq_ignore_ascii_case("websocket"));
            return !legacy_websocket;
        }

        if method == Some(&Method::HEAD) || opens_tunnel(method, Some(status)) {
            return true;
        }

        matches!(status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT | StatusCode::NOT_MODIFIED)
    }

    fn read_fixed_length_content(&mut self, src: &mut Cumulation, out: &mut Vec<HttpEvent>, remaining: u64) -> Option<State> {
        let size = capped(src.remaining().min(self.config.chunk_limit()), remaining);
        if size == 0 {
            return None;
        }

        let content = src.copy_to_bytes(size);
        let remaining = remaining - size as u64;
        if remaining == 0 {
            out.push(HttpEvent::LastContent(LastContent::new(content)));
            Some(self.reset_now())
        } else {
            out.push(HttpEvent::Content(content));
            Some(State::ReadFixedLengthContent { remaining })
        }
    }

    fn read_chunked_content(&mut self, src: &mut Cumulation, out: &mut Vec<HttpEvent>, remaining: u64) -> Option<State> {
        let wanted = capped(self.config.chunk_limit(), remaining);
        if !self.config.allow_partial_chunks && src.remaining() < wanted {
            return None;
        }

        let size = wanted.min(src.remaining());
        if size == 0 {
            return None;
        }

        trace!(size, "read chunked content");
        out.push(HttpEvent::Content(src.copy_to_bytes(size)));
        match remaining - size as u64 {
            0 => Some(State::ReadChunkDelimiter),
            remaining => Some(State::ReadChunkedContent { remaining }),
        }
    }

    fn read_chunk_footer(&mut self, src: &mut Cumulation, out: &mut Vec<HttpEvent>) -> Result<Option<State>, DecodeError> {
        let rules = FieldRules {
            validate: self.config.validate_headers,
            lenient_name: self.direction == Direction::Response,
            trailers: true,
        };
        if !self.fields.read(src, &mut self.trailers, rules)? {
            return Ok(None);
        }

        let trailers = std::mem::take(&mut self.trailers);
        trace!(trailers = trailers.len(), "read chunk footer");
        out.push(HttpEvent::LastContent(LastContent::with_trailers(bytes::Bytes::new(), trailers)));
        Ok(Some(self.reset_now()))
    }

    /// Reports `cause` downstream, drops the buffered input and enters `BadMessage`.
    fn fail(&mut self, src: &mut Cumulation, out: &mut Vec<HttpEvent>, cause: DecodeError) -> State {
        debug!(state = ?self.state, cause = %cause, "bad message");
        src.clear();

        if self.head_emitted {
            out.push(HttpEvent::LastContent(LastContent::failed(cause)));
        } else {
            let mut head = self.head.take().unwrap_or_else(|| self.invalid_head());
            head.set_decoder_result(DecoderResult::failure(cause));
            out.push(HttpEvent::Head(head));
        }

        self.head = None;
        self.head_emitted = false;
        self.trailers = HttpHeaders::new();
        self.fields.reset();
        self.switching = false;
        State::BadMessage
    }

    /// Stand-in head for failures before the initial line could be parsed.
    fn invalid_head(&self) -> HttpHead {
        match self.direction {
            Direction::Request => HttpHead::new(RequestLine::new(Method::GET, "/bad-request", Version::HTTP_10), HttpHeaders::new()),
            Direction::Response => {
                let status = StatusCode::from_u16(999).unwrap_or(StatusCode::BAD_REQUEST);
                HttpHead::new(StatusLine::with_reason(Version::HTTP_10, status, "Unknown"), HttpHeaders::new())
            }
        }
    }

    /// Whether an early end of the stream in the current state truncates the message.
    fn is_premature_closure(&self) -> bool {
        self.direction == Direction::Request || self.chunked || self.content_length.is_some_and(|length| length > 0)
    }
}

impl ProtocolDecoder for HttpDecoder {
    type Item = HttpEvent;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut Cumulation, out: &mut Vec<HttpEvent>) -> Result<(), DecodeError> {
        if self.reset_requested {
            self.state = self.reset_now();
        }

        let produced = out.len();
        loop {
            match self.step(src, out) {
                Ok(Some(next)) => {
                    if next != self.state {
                        trace!(from = ?self.state, to = ?next, "state transition");
                    }
                    self.state = next;
                }
                Ok(None) => return Ok(()),
                Err(cause) => {
                    self.state = self.fail(src, out, cause);
                    return Ok(());
                }
            }

            if out.len() > produced || !src.has_remaining() {
                return Ok(());
            }
        }
    }

    fn decode_last(&mut self, src: &mut Cumulation, out: &mut Vec<HttpEvent>) -> Result<(), DecodeError> {
        if self.reset_requested {
            self.state = self.reset_now();
        }

        match self.state {
            State::ReadVariableLengthContent => {
                if !self.chunked && !src.has_remaining() {
                    out.push(HttpEvent::LastContent(LastContent::empty()));
                    self.state = self.reset_now();
                }
            }
            State::ReadHeaders => {
                self.fail(src, out, DecodeError::PrematureClosure("header block"));
                self.state = self.reset_now();
            }
            state if state.is_reading_content() => {
                if self.is_premature_closure() {
                    let what = if self.chunked { "chunked content" } else { "content" };
                    debug!(state = ?self.state, "stream closed before the message was complete");
                    self.fail(src, out, DecodeError::PrematureClosure(what));
                } else {
                    out.push(HttpEvent::LastContent(LastContent::empty()));
                }
                self.state = self.reset_now();
            }
            _ => {}
        }
        Ok(())
    }
}

fn skip_control_chars(src: &mut Cumulation) -> Option<State> {
    while src.has_remaining() {
        let chunk = src.chunk();
        match chunk.iter().position(|b| !b.is_ascii_control() && !b.is_ascii_whitespace()) {
            Some(skip) => {
                src.advance(skip);
                return Some(State::ReadInitialLine);
            }
            None => {
                let skip = chunk.len();
                src.advance(skip);
            }
        }
    }
    None
}

/// Splits an initial line into its two leading tokens and the trimmed rest.
///
/// Returns `None` when fewer than two tokens are present; the third part may be empty.
fn split_initial_line(line: &str) -> Option<(&str, &str, &str)> {
    let line = line.trim_matches(|c: char| c.is_ascii_whitespace());
    let (first, rest) = line.split_once(|c: char| c.is_ascii_whitespace())?;
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
    let (second, third) = match rest.split_once(|c: char| c.is_ascii_whitespace()) {
        Some((second, third)) => (second, third.trim_start_matches(|c: char| c.is_ascii_whitespace())),
        None => (rest, ""),
    };
    if second.is_empty() {
        return None;
    }
    Some((first, second, third))
}

fn opens_tunnel(method: Option<&Method>, status: Option<StatusCode>) -> bool {
    method == Some(&Method::CONNECT) && status.is_some_and(|status| status.is_success())
}

/// `available` capped to the bytes still expected.
#[inline]
fn capped(available: usize, remaining: u64) -> usize {
    usize::try_from(remaining).map_or(available, |remaining| available.min(remaining))
}
