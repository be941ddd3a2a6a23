//! Coalescing of decoded events into whole messages.
//!
//! [`HttpObjectAggregator`] consumes `Head`, `Content*`, `LastContent` runs and produces
//! one [`FullMessage`] per run, never buffering more than the configured maximum. It also
//! answers `Expect: 100-continue` itself: the caller receives a [`Reply`] to write back
//! before the client sends its body.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use http::Method;
//! use micro_http_codec::codec::{Aggregated, AggregatorConfig, HttpObjectAggregator};
//! use micro_http_codec::protocol::{HttpEvent, HttpHead, LastContent};
//!
//! let mut aggregator = HttpObjectAggregator::new(AggregatorConfig::new(1024));
//!
//! let head = HttpHead::request(Method::POST, "/upload");
//! assert!(aggregator.aggregate(HttpEvent::Head(head)).unwrap().is_none());
//! assert!(aggregator.aggregate(HttpEvent::Content(Bytes::from_static(b"hello "))).unwrap().is_none());
//!
//! let last = LastContent::new(Bytes::from_static(b"world"));
//! let Some(Aggregated::Message(message)) = aggregator.aggregate(HttpEvent::LastContent(last)).unwrap() else {
//!     panic!("expected a whole message");
//! };
//! assert_eq!(message.content(), &Bytes::from_static(b"hello world"));
//! assert_eq!(message.headers().get("content-length"), Some("11"));
//! ```

use bytes::{Buf, Bytes};
use http::StatusCode;
use tracing::{debug, trace, warn};

use crate::codec::{AggregatorConfig, Cumulation, Cumulator};
use crate::headers::HttpHeaders;
use crate::protocol::{CodecError, DecodeError, DecoderResult, FullMessage, HttpEvent, HttpHead, LastContent, util};

/// What the aggregator hands back for one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregated {
    /// A complete message.
    Message(FullMessage),
    /// A response the caller has to write back to the peer.
    Reply(Reply),
}

/// A response generated by the aggregator itself: `100 Continue`, `413 Payload Too Large`
/// or `417 Expectation Failed`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    response: FullMessage,
    close: bool,
    reset_decoder: bool,
}

impl Reply {
    fn new(status: StatusCode, close: bool, reset_decoder: bool) -> Self {
        let mut response = FullMessage::response(status, Bytes::new());
        if !status.is_informational() {
            util::set_content_length(response.head_mut(), 0);
        }
        if close {
            util::set_keep_alive(response.head_mut(), false);
        }
        Self { response, close, reset_decoder }
    }

    pub fn response(&self) -> &FullMessage {
        &self.response
    }

    pub fn into_response(self) -> FullMessage {
        self.response
    }

    /// The connection has to be closed once the reply is written.
    pub fn is_close(&self) -> bool {
        self.close
    }

    /// The request body will never arrive, so the request decoder has to be reset to
    /// read the next message.
    pub fn is_reset_decoder(&self) -> bool {
        self.reset_decoder
    }
}

/// In-flight message.
#[derive(Debug)]
struct Aggregation {
    head: HttpHead,
    content: Cumulation,
}

/// Turns event runs into bounded [`FullMessage`]s.
#[derive(Debug)]
pub struct HttpObjectAggregator {
    config: AggregatorConfig,
    current: Option<Aggregation>,
    /// Content of the current message is dropped until its last content.
    discarding: bool,
}

impl HttpObjectAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config, current: None, discarding: false }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Whether a message has been started but not finished.
    pub fn is_aggregating(&self) -> bool {
        self.current.is_some()
    }

    /// Feeds one event.
    ///
    /// Returns a message once its last content arrived, a reply that has to be sent to
    /// the peer, or nothing when more events are needed.
    ///
    /// # Errors
    ///
    /// - [`CodecError::UnexpectedMessage`] for a head in the middle of a message
    /// - [`CodecError::TooLongResponse`] for a response above the maximum size
    pub fn aggregate(&mut self, event: HttpEvent) -> Result<Option<Aggregated>, CodecError> {
        match event {
            HttpEvent::Head(head) => self.on_head(head),
            HttpEvent::Content(content) => self.on_content(content),
            HttpEvent::LastContent(last) => self.on_last(last),
        }
    }

    /// Ends aggregation because the stream closed, returning the partial message marked
    /// with a premature closure failure.
    pub fn finish(&mut self) -> Option<FullMessage> {
        self.discarding = false;
        let Aggregation { mut head, mut content } = self.current.take()?;

        debug!(start_line = %head.start_line(), received = content.remaining(), "stream closed during aggregation");
        head.set_decoder_result(DecoderResult::failure(DecodeError::PrematureClosure("aggregated message")));
        Some(FullMessage::new(head, content.take_all()))
    }

    fn on_head(&mut self, mut head: HttpHead) -> Result<Option<Aggregated>, CodecError> {
        if let Some(current) = self.current.take() {
            warn!(start_line = %current.head.start_line(), "received a new head before the last content");
            return Err(CodecError::unexpected_message("message head while a message is being aggregated"));
        }
        self.discarding = false;

        if head.decoder_result().is_failure() {
            // nothing else will follow for this message
            return Ok(Some(Aggregated::Message(FullMessage::new(head, Bytes::new()))));
        }

        if let Some(reply) = self.continue_reply(&mut head) {
            if reply.response().head().status() != Some(StatusCode::CONTINUE) {
                debug!(start_line = %head.start_line(), status = ?reply.response().head().status(), "rejected expectation");
                self.discarding = true;
                return Ok(Some(Aggregated::Reply(reply)));
            }
            self.begin(head);
            return Ok(Some(Aggregated::Reply(reply)));
        }

        if util::content_length(&head).is_some_and(|length| length > self.config.max_content_length as u64) {
            return self.on_oversized(&head, false);
        }

        self.begin(head);
        Ok(None)
    }

    fn on_content(&mut self, content: Bytes) -> Result<Option<Aggregated>, CodecError> {
        let Some(current) = self.current.as_mut() else {
            if !self.discarding {
                trace!(content_size = content.len(), "content without message head");
            }
            return Ok(None);
        };

        if current.content.remaining() + content.len() > self.config.max_content_length {
            let head = self.current.take().map(|current| current.head);
            return match head {
                Some(head) => self.on_oversized(&head, true),
                None => Ok(None),
            };
        }

        current.content.push(content);
        Ok(None)
    }

    fn on_last(&mut self, last: LastContent) -> Result<Option<Aggregated>, CodecError> {
        let (content, trailers, result) = last.into_parts();
        if self.current.is_none() {
            self.discarding = false;
            return Ok(None);
        }

        let response = self.on_content(content)?;
        if response.is_some() {
            // the content tipped the message over the limit
            self.discarding = false;
            return Ok(response);
        }

        match self.current.take() {
            Some(current) => Ok(Some(Aggregated::Message(Self::complete(current, trailers, result)))),
            None => Ok(None),
        }
    }

    fn begin(&mut self, mut head: HttpHead) {
        util::set_transfer_encoding_chunked(&mut head, false);
        self.current = Some(Aggregation { head, content: Cumulation::new(Cumulator::Composite) });
    }

    fn complete(current: Aggregation, trailers: HttpHeaders, result: DecoderResult) -> FullMessage {
        let Aggregation { mut head, mut content } = current;
        let content = content.take_all();

        if !util::is_content_length_set(&head) {
            util::set_content_length(&mut head, content.len() as u64);
        }
        if result.is_failure() {
            head.set_decoder_result(result);
        }

        trace!(start_line = %head.start_line(), content_size = content.len(), "aggregated message");
        FullMessage::with_trailers(head, content, trailers)
    }

    /// The interim reply an `Expect` header calls for, if any.
    fn continue_reply(&self, head: &mut HttpHead) -> Option<Reply> {
        let close = self.config.close_on_expectation_failed;
        let reply = if util::is_unsupported_expectation(head) {
            Reply::new(StatusCode::EXPECTATION_FAILED, close, true)
        } else if util::is_100_continue_expected(head) {
            let max = self.config.max_content_length as u64;
            if util::content_length(head).is_some_and(|length| length > max) {
                Reply::new(StatusCode::PAYLOAD_TOO_LARGE, close, true)
            } else {
                Reply::new(StatusCode::CONTINUE, false, false)
            }
        } else {
            return None;
        };

        // answered here, so the expectation does not travel further
        util::set_100_continue_handled(head);
        Some(reply)
    }

    fn on_oversized(&mut self, head: &HttpHead, receiving_content: bool) -> Result<Option<Aggregated>, CodecError> {
        self.discarding = true;
        warn!(
            start_line = %head.start_line(),
            max_content_length = self.config.max_content_length,
            "message exceeds the maximum content length"
        );

        if !head.is_request() {
            return Err(CodecError::too_long_response(self.config.max_content_length));
        }

        // once the body is on its way the framing cannot be recovered
        let close = receiving_content || (!util::is_100_continue_expected(head) && !util::is_keep_alive(head));
        Ok(Some(Aggregated::Reply(Reply::new(StatusCode::PAYLOAD_TOO_LARGE, close, false))))
    }
}

impl Default for HttpObjectAggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}
