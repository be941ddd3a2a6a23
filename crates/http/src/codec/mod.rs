//! Streaming HTTP/1.1 codec.
//!
//! This module turns transport fragments into HTTP events and back. Every stage is
//! synchronous and never blocks; the transport decides when bytes arrive and when
//! encoded bytes are flushed.
//!
//! # Architecture
//!
//! - Incremental decoding:
//!   - [`Cumulation`]: unread bytes, merged ([`Cumulator::Merge`]) or chained
//!     ([`Cumulator::Composite`])
//!   - [`ByteToMessage`]: drives a [`ProtocolDecoder`] until no progress is possible
//!
//! - Messages:
//!   - [`HttpDecoder`]: the HTTP/1.1 state machine, see [`State`]
//!   - [`HttpEncoder`]: serializes the same events
//!   - [`HttpObjectAggregator`]: coalesces events into bounded [`FullMessage`]s
//!
//! - Connection codecs implementing `tokio_util`'s `Decoder` and `Encoder`:
//!   - [`HttpServerCodec`]: requests in, responses out
//!   - [`HttpClientCodec`]: requests out, responses in
//!
//! [`FullMessage`]: crate::protocol::FullMessage
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_http_codec::codec::HttpServerCodec;
//! use micro_http_codec::protocol::HttpEvent;
//! use tokio_util::codec::Decoder;
//!
//! let mut codec = HttpServerCodec::default();
//! let mut buffer = BytesMut::from(&b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello"[..]);
//!
//! let head = codec.decode(&mut buffer).unwrap().unwrap();
//! assert!(matches!(head, HttpEvent::Head(_)));
//! let last = codec.decode(&mut buffer).unwrap().unwrap();
//! assert_eq!(last.content().map(|bytes| &bytes[..]), Some(&b"hello"[..]));
//! ```

mod aggregator;
mod byte_to_message;
mod client_codec;
mod config;
mod cumulation;
mod decoder;
mod encoder;
mod server_codec;

pub use aggregator::{Aggregated, HttpObjectAggregator, Reply};
pub use byte_to_message::{ByteToMessage, ProtocolDecoder};
pub use client_codec::HttpClientCodec;
pub use config::{
    AggregatorConfig, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MAX_HEADER_SIZE, DEFAULT_MAX_INITIAL_LINE_LENGTH, DecoderConfig,
};
pub use cumulation::{Cumulation, Cumulator};
pub use decoder::{Direction, HttpDecoder, State};
pub use encoder::HttpEncoder;
pub use server_codec::HttpServerCodec;
