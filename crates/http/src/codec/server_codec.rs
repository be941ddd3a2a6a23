//! Server side of a connection: requests in, responses out.

use std::collections::VecDeque;

use bytes::BytesMut;
use http::Method;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::codec::{ByteToMessage, Cumulator, DecoderConfig, HttpDecoder, HttpEncoder};
use crate::protocol::{CodecError, FullMessage, HttpEvent, HttpHead};

/// Request decoder plus response encoder for one connection.
///
/// The codec remembers the method of every decoded request, so that the matching
/// response is framed right: the response to `HEAD` and a successful response to
/// `CONNECT` are sent without body.
///
/// ```no_run
/// use futures::{SinkExt, StreamExt};
/// use http::StatusCode;
/// use micro_http_codec::codec::HttpServerCodec;
/// use micro_http_codec::protocol::{FullMessage, HttpEvent};
/// use tokio::net::TcpStream;
/// use tokio_util::codec::Framed;
///
/// # async fn serve(stream: TcpStream) -> Result<(), micro_http_codec::protocol::CodecError> {
/// let mut framed = Framed::new(stream, HttpServerCodec::default());
/// while let Some(event) = framed.next().await {
///     if event?.is_last() {
///         framed.send(FullMessage::response(StatusCode::OK, "done")).await?;
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HttpServerCodec {
    decoder: ByteToMessage<HttpDecoder>,
    encoder: HttpEncoder,
    methods: VecDeque<Method>,
}

impl HttpServerCodec {
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_cumulator(config, Cumulator::Merge)
    }

    pub fn with_cumulator(config: DecoderConfig, cumulator: Cumulator) -> Self {
        Self { decoder: ByteToMessage::new(HttpDecoder::request(config), cumulator), encoder: HttpEncoder::new(), methods: VecDeque::new() }
    }

    pub fn decoder(&self) -> &HttpDecoder {
        self.decoder.decoder()
    }

    /// Resets the request decoder, see [`HttpDecoder::reset`].
    pub fn reset_decoder(&mut self) {
        self.decoder.decoder_mut().reset();
    }

    fn on_decoded(&mut self, event: Option<HttpEvent>) -> Option<HttpEvent> {
        if let Some(HttpEvent::Head(head)) = &event {
            if let Some(method) = head.method() {
                self.methods.push_back(method.clone());
            }
        }
        event
    }

    /// Matches an outgoing response with the request it answers.
    fn on_response_head(&mut self, head: &HttpHead) {
        let Some(status) = head.status() else {
            return;
        };
        if status.is_informational() {
            return;
        }

        let method = self.methods.pop_front();
        let empty = match method {
            Some(Method::HEAD) => true,
            Some(Method::CONNECT) => status.is_success(),
            _ => false,
        };
        if empty {
            trace!(method = ?method, status = status.as_u16(), "response is sent without body");
            self.encoder.expect_empty_content();
        }
    }
}

impl Default for HttpServerCodec {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl Decoder for HttpServerCodec {
    type Item = HttpEvent;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let event = self.decoder.decode(src)?;
        Ok(self.on_decoded(event))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let event = self.decoder.decode_eof(src)?;
        Ok(self.on_decoded(event))
    }
}

impl Encoder<HttpEvent> for HttpServerCodec {
    type Error = CodecError;

    fn encode(&mut self, item: HttpEvent, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if let HttpEvent::Head(head) = &item {
            self.on_response_head(head);
        }
        self.encoder.encode(item, dst)
    }
}

impl Encoder<FullMessage> for HttpServerCodec {
    type Error = CodecError;

    fn encode(&mut self, item: FullMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.on_response_head(item.head());
        self.encoder.encode(item, dst)
    }
}
