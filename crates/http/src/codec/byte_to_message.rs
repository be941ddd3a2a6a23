//! Incremental decoding over a fragmented byte stream.
//!
//! [`ByteToMessage`] owns a [`Cumulation`] and drives a [`ProtocolDecoder`] over it until
//! no further progress can be made. Protocol decoders only ever see a logical buffer of
//! unread bytes; they never learn where the transport split the stream.
//!
//! # Example
//!
//! ```
//! use bytes::{Buf, Bytes};
//! use micro_http_codec::codec::{ByteToMessage, Cumulation, Cumulator, ProtocolDecoder};
//! use micro_http_codec::protocol::DecodeError;
//!
//! /// Splits the stream into newline terminated lines.
//! struct Lines;
//!
//! impl ProtocolDecoder for Lines {
//!     type Item = Bytes;
//!     type Error = DecodeError;
//!
//!     fn decode(&mut self, src: &mut Cumulation, out: &mut Vec<Bytes>) -> Result<(), DecodeError> {
//!         if let Some(end) = src.find_byte(b'\n', 0) {
//!             out.push(src.copy_to_bytes(end + 1));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut decoder = ByteToMessage::new(Lines, Cumulator::Composite);
//! let mut out = Vec::new();
//! decoder.feed(Bytes::from_static(b"one\ntw"), &mut out).unwrap();
//! decoder.feed(Bytes::from_static(b"o\n"), &mut out).unwrap();
//! assert_eq!(out, vec![Bytes::from_static(b"one\n"), Bytes::from_static(b"two\n")]);
//! ```

use std::any::type_name;
use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::{error, trace};

use crate::codec::{Cumulation, Cumulator};
use crate::protocol::CodecError;

/// One protocol-specific decode step.
///
/// A step reads what it can from `src` and appends any decoded items to `out`. Returning
/// without reading and without producing means "need more input". Producing items
/// without reading anything is a bug in the decoder and aborts decoding.
pub trait ProtocolDecoder {
    type Item;
    type Error: Into<CodecError>;

    fn decode(&mut self, src: &mut Cumulation, out: &mut Vec<Self::Item>) -> Result<(), Self::Error>;

    /// Called once when the stream ends, after the last regular decode round.
    fn decode_last(&mut self, src: &mut Cumulation, out: &mut Vec<Self::Item>) -> Result<(), Self::Error> {
        if src.has_remaining() { self.decode(src, out) } else { Ok(()) }
    }
}

/// Accumulates fragments and runs a [`ProtocolDecoder`] over them.
///
/// Besides the push API ([`feed`](Self::feed), [`finish`](Self::finish)) it implements
/// [`Decoder`], so it can sit under `FramedRead` directly.
#[derive(Debug)]
pub struct ByteToMessage<D: ProtocolDecoder> {
    decoder: D,
    cumulation: Cumulation,
    single_decode: bool,
    pending: VecDeque<D::Item>,
    finished: bool,
}

impl<D: ProtocolDecoder> ByteToMessage<D> {
    pub fn new(decoder: D, cumulator: Cumulator) -> Self {
        Self { decoder, cumulation: Cumulation::new(cumulator), single_decode: false, pending: VecDeque::new(), finished: false }
    }

    /// Stops after each producing step instead of decoding everything buffered.
    ///
    /// Useful when the caller has to act between two items, for example to hand the
    /// stream over to another protocol right after an upgrade response.
    #[must_use]
    pub fn with_single_decode(mut self, single_decode: bool) -> Self {
        self.single_decode = single_decode;
        self
    }

    pub fn set_single_decode(&mut self, single_decode: bool) {
        self.single_decode = single_decode;
    }

    pub fn is_single_decode(&self) -> bool {
        self.single_decode
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut D {
        &mut self.decoder
    }

    /// Number of bytes received but not yet consumed by the decoder.
    pub fn buffered(&self) -> usize {
        self.cumulation.remaining()
    }

    /// Hands one transport fragment to the decoder.
    pub fn feed(&mut self, fragment: Bytes, out: &mut Vec<D::Item>) -> Result<(), CodecError> {
        trace!(fragment_size = fragment.len(), buffered = self.cumulation.remaining(), "received fragment");
        self.finished = false;
        self.cumulation.push(fragment);
        self.call_decode(out)
    }

    /// Resumes decoding of bytes that are already buffered, used in single-decode mode.
    pub fn decode_buffered(&mut self, out: &mut Vec<D::Item>) -> Result<(), CodecError> {
        self.call_decode(out)
    }

    /// Signals the end of the stream.
    ///
    /// Decodes what is left, lets the protocol react to the end of input, and returns any
    /// bytes the protocol did not consume. The buffer is empty afterwards.
    pub fn finish(&mut self, out: &mut Vec<D::Item>) -> Result<Option<Bytes>, CodecError> {
        self.finished = true;
        self.call_decode(out)?;
        self.decoder.decode_last(&mut self.cumulation, out).map_err(Into::into)?;

        let leftover = self.cumulation.take_all();
        self.cumulation.clear();
        if leftover.is_empty() {
            Ok(None)
        } else {
            trace!(leftover_size = leftover.len(), "stream finished with unread bytes");
            Ok(Some(leftover))
        }
    }

    /// Takes the decoder out, together with every byte it has not read yet.
    pub fn remove(mut self) -> (D, Bytes) {
        let leftover = self.cumulation.take_all();
        (self.decoder, leftover)
    }

    fn call_decode(&mut self, out: &mut Vec<D::Item>) -> Result<(), CodecError> {
        while self.cumulation.has_remaining() {
            let produced_before = out.len();
            let remaining_before = self.cumulation.remaining();

            self.decoder.decode(&mut self.cumulation, out).map_err(Into::into)?;

            if out.len() == produced_before {
                if remaining_before == self.cumulation.remaining() {
                    // nothing read and nothing produced: wait for more input
                    break;
                }
                continue;
            }

            if remaining_before == self.cumulation.remaining() {
                let decoder = type_name::<D>();
                error!(decoder, "decode step produced output without reading any input");
                return Err(CodecError::no_progress(decoder));
            }

            if self.single_decode {
                break;
            }
        }
        Ok(())
    }
}

impl<D> Decoder for ByteToMessage<D>
where
    D: ProtocolDecoder,
    D::Item: From<Bytes>,
{
    type Item = D::Item;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.pending.is_empty() {
            let mut out = Vec::new();
            if src.is_empty() {
                if self.cumulation.has_remaining() {
                    self.decode_buffered(&mut out)?;
                }
            } else {
                let fragment = src.split().freeze();
                self.feed(fragment, &mut out)?;
            }
            self.pending.extend(out);
        }
        Ok(self.pending.pop_front())
    }

    /// Unread bytes left at the end of the stream are delivered as one last item.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }

        if !self.finished {
            let mut out = Vec::new();
            if let Some(leftover) = self.finish(&mut out)? {
                out.push(D::Item::from(leftover));
            }
            self.pending.extend(out);
        }
        Ok(self.pending.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DecodeError;

    /// Emits fixed size records.
    #[derive(Debug)]
    struct Records(usize);

    impl ProtocolDecoder for Records {
        type Item = Bytes;
        type Error = DecodeError;

        fn decode(&mut self, src: &mut Cumulation, out: &mut Vec<Bytes>) -> Result<(), DecodeError> {
            if src.remaining() >= self.0 {
                out.push(src.copy_to_bytes(self.0));
            }
            Ok(())
        }
    }

    /// Produces an item on every call without reading.
    #[derive(Debug)]
    struct Stuck;

    impl ProtocolDecoder for Stuck {
        type Item = Bytes;
        type Error = DecodeError;

        fn decode(&mut self, _src: &mut Cumulation, out: &mut Vec<Bytes>) -> Result<(), DecodeError> {
            out.push(Bytes::new());
            Ok(())
        }
    }

    /// Reads one byte per call without producing anything until a `!` shows up.
    #[derive(Debug)]
    struct Skipper;

    impl ProtocolDecoder for Skipper {
        type Item = Bytes;
        type Error = DecodeError;

        fn decode(&mut self, src: &mut Cumulation, out: &mut Vec<Bytes>) -> Result<(), DecodeError> {
            if src.get_u8() == b'!' {
                out.push(Bytes::from_static(b"!"));
            }
            Ok(())
        }
    }

    /// Never reads and never produces.
    #[derive(Debug)]
    struct Idle;

    impl ProtocolDecoder for Idle {
        type Item = Bytes;
        type Error = DecodeError;

        fn decode(&mut self, _src: &mut Cumulation, _out: &mut Vec<Bytes>) -> Result<(), DecodeError> {
            Ok(())
        }
    }

    #[test]
    fn records_across_fragments() {
        for cumulator in [Cumulator::Merge, Cumulator::Composite] {
            let mut decoder = ByteToMessage::new(Records(3), cumulator);
            let mut out = Vec::new();

            decoder.feed(Bytes::from_static(b"ab"), &mut out).unwrap();
            assert!(out.is_empty());
            decoder.feed(Bytes::from_static(b"cdefg"), &mut out).unwrap();
            assert_eq!(out, vec![Bytes::from_static(b"abc"), Bytes::from_static(b"def")]);
            assert_eq!(decoder.buffered(), 1);

            let leftover = decoder.finish(&mut out).unwrap();
            assert_eq!(leftover, Some(Bytes::from_static(b"g")));
            assert_eq!(decoder.buffered(), 0);
        }
    }

    #[test]
    fn output_without_input_is_fatal() {
        let mut decoder = ByteToMessage::new(Stuck, Cumulator::Merge);
        let mut out = Vec::new();

        let result = decoder.feed(Bytes::from_static(b"x"), &mut out);
        assert!(matches!(result, Err(CodecError::NoProgress { .. })));
    }

    #[test]
    fn reading_without_output_keeps_looping() {
        let mut decoder = ByteToMessage::new(Skipper, Cumulator::Merge);
        let mut out = Vec::new();

        decoder.feed(Bytes::from_static(b"abc!de!"), &mut out).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn no_progress_halts_loop() {
        let mut decoder = ByteToMessage::new(Idle, Cumulator::Merge);
        let mut out = Vec::new();

        decoder.feed(Bytes::from_static(b"pending"), &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(decoder.buffered(), 7);
    }

    #[test]
    fn single_decode_stops_after_each_item() {
        let mut decoder = ByteToMessage::new(Records(2), Cumulator::Merge).with_single_decode(true);
        let mut out = Vec::new();

        decoder.feed(Bytes::from_static(b"aabbcc"), &mut out).unwrap();
        assert_eq!(out, vec![Bytes::from_static(b"aa")]);

        decoder.decode_buffered(&mut out).unwrap();
        decoder.decode_buffered(&mut out).unwrap();
        decoder.decode_buffered(&mut out).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn remove_returns_unread_bytes() {
        let mut decoder = ByteToMessage::new(Records(4), Cumulator::Composite);
        let mut out = Vec::new();
        decoder.feed(Bytes::from_static(b"abcdef"), &mut out).unwrap();
        decoder.feed(Bytes::from_static(b"gh"), &mut out).unwrap();
        decoder.feed(Bytes::from_static(b"i"), &mut out).unwrap();

        let (records, leftover) = decoder.remove();
        assert_eq!(records.0, 4);
        assert_eq!(out, vec![Bytes::from_static(b"abcd"), Bytes::from_static(b"efgh")]);
        assert_eq!(leftover, Bytes::from_static(b"i"));
    }

    #[test]
    fn tokio_decoder_drains_pending_items() {
        let mut decoder = ByteToMessage::new(Records(2), Cumulator::Merge);
        let mut src = BytesMut::from(&b"aabbc"[..]);

        assert_eq!(decoder.decode(&mut src).unwrap(), Some(Bytes::from_static(b"aa")));
        assert!(src.is_empty());
        assert_eq!(decoder.decode(&mut src).unwrap(), Some(Bytes::from_static(b"bb")));
        assert_eq!(decoder.decode(&mut src).unwrap(), None);

        assert_eq!(decoder.decode_eof(&mut src).unwrap(), Some(Bytes::from_static(b"c")));
        assert_eq!(decoder.decode_eof(&mut src).unwrap(), None);
    }
}
