//! Client side of a connection: requests out, responses in.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{ByteToMessage, Cumulator, DecoderConfig, HttpDecoder, HttpEncoder};
use crate::protocol::{CodecError, FullMessage, HttpEvent, HttpHead};

/// Request encoder plus response decoder for one connection.
///
/// Every encoded request head tells the response decoder which method the next response
/// answers: responses to `HEAD` carry no body and a successful `CONNECT` turns the
/// connection into a tunnel.
#[derive(Debug)]
pub struct HttpClientCodec {
    decoder: ByteToMessage<HttpDecoder>,
    encoder: HttpEncoder,
}

impl HttpClientCodec {
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_cumulator(config, Cumulator::Merge)
    }

    pub fn with_cumulator(config: DecoderConfig, cumulator: Cumulator) -> Self {
        Self { decoder: ByteToMessage::new(HttpDecoder::response(config), cumulator), encoder: HttpEncoder::new() }
    }

    pub fn decoder(&self) -> &HttpDecoder {
        self.decoder.decoder()
    }

    pub fn reset_decoder(&mut self) {
        self.decoder.decoder_mut().reset();
    }

    fn on_request_head(&mut self, head: &HttpHead) {
        if let Some(method) = head.method() {
            self.decoder.decoder_mut().expect_response_to(method.clone());
        }
    }
}

impl Default for HttpClientCodec {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl Decoder for HttpClientCodec {
    type Item = HttpEvent;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decoder.decode(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decoder.decode_eof(src)
    }
}

impl Encoder<HttpEvent> for HttpClientCodec {
    type Error = CodecError;

    fn encode(&mut self, item: HttpEvent, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if let HttpEvent::Head(head) = &item {
            self.on_request_head(head);
        }
        self.encoder.encode(item, dst)
    }
}

impl Encoder<FullMessage> for HttpClientCodec {
    type Error = CodecError;

    fn encode(&mut self, item: FullMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.on_request_head(item.head());
        self.encoder.encode(item, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::Method;

    use crate::codec::State;

    #[test]
    fn head_response_after_head_request() {
        let mut codec = HttpClientCodec::default();
        let mut dst = BytesMut::new();
        codec.encode(FullMessage::request(Method::HEAD, "/", Bytes::new()), &mut dst).unwrap();
        assert_eq!(&dst[..], b"HEAD / HTTP/1.1\r\n\r\n");

        let mut src = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n"[..]);
        assert!(codec.decode(&mut src).unwrap().is_some_and(|event| event.is_head()));
        assert!(codec.decode(&mut src).unwrap().is_some_and(|event| event.is_last()));
        assert_eq!(codec.decoder().state(), State::SkipControlChars);
    }

    #[test]
    fn connect_opens_tunnel() {
        let mut codec = HttpClientCodec::default();
        let mut dst = BytesMut::new();
        codec.encode(FullMessage::request(Method::CONNECT, "example.com:443", Bytes::new()), &mut dst).unwrap();

        let mut src = BytesMut::from(&b"HTTP/1.1 200 Connection Established\r\n\r\n\x16\x03\x01"[..]);
        let mut events = Vec::new();
        while let Some(event) = codec.decode(&mut src).unwrap() {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], HttpEvent::Content(Bytes::from_static(b"\x16\x03\x01")));
        assert!(codec.decoder().is_upgraded());
    }
}
