//! A streaming HTTP/1.1 codec
//!
//! This crate parses and serializes HTTP/1.1 messages that arrive in arbitrarily
//! fragmented pieces, without blocking and without assuming that transport reads line up
//! with message boundaries. It plugs into tokio through `tokio_util::codec`, but the core
//! is plain synchronous state machines that work with any transport.
//!
//! # Features
//!
//! - Incremental decoding over merged or zero-copy chained buffers
//! - Request and response decoding, including chunked transfer coding and trailers
//! - Close-delimited response bodies, `HEAD` and `CONNECT` aware framing
//! - Protocol upgrade hand-off
//! - Encoding with chunked or length-delimited framing
//! - Bounded message aggregation with `Expect: 100-continue` handling
//! - An ordered, multi-valued header map with pluggable name comparison
//!
//! # Example
//!
//! ```no_run
//! use futures::{SinkExt, StreamExt};
//! use http::StatusCode;
//! use micro_http_codec::codec::{Aggregated, HttpObjectAggregator, HttpServerCodec};
//! use micro_http_codec::protocol::FullMessage;
//! use tokio::net::TcpListener;
//! use tokio_util::codec::Framed;
//! use tracing::{error, info};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     loop {
//!         let (stream, _remote_addr) = listener.accept().await.unwrap();
//!         tokio::spawn(async move {
//!             let mut framed = Framed::new(stream, HttpServerCodec::default());
//!             let mut aggregator = HttpObjectAggregator::default();
//!
//!             while let Some(event) = framed.next().await {
//!                 let event = match event {
//!                     Ok(event) => event,
//!                     Err(e) => {
//!                         error!(cause = %e, "decode error, connection shutdown");
//!                         return;
//!                     }
//!                 };
//!                 match aggregator.aggregate(event) {
//!                     Ok(Some(Aggregated::Message(request))) => {
//!                         info!(start_line = %request.head().start_line(), "received request");
//!                         let response = FullMessage::response(StatusCode::OK, request.content().clone());
//!                         if framed.send(response).await.is_err() {
//!                             return;
//!                         }
//!                     }
//!                     Ok(Some(Aggregated::Reply(reply))) => {
//!                         let close = reply.is_close();
//!                         if framed.send(reply.into_response()).await.is_err() || close {
//!                             return;
//!                         }
//!                     }
//!                     Ok(None) => {}
//!                     Err(e) => {
//!                         error!(cause = %e, "aggregation error, connection shutdown");
//!                         return;
//!                     }
//!                 }
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`headers`]: the header multimap shared by every stage
//! - [`protocol`]: start lines, events, whole messages, errors and header helpers
//! - [`codec`]: incremental decoding, the HTTP/1.1 decoder and encoder, the aggregator
//!   and the connection codecs
//!
//! # Error Handling
//!
//! Malformed input never aborts a stream. The decoder attaches a
//! [`protocol::DecodeError`] to the event it was working on and discards input until it
//! is reset, so the application decides whether to answer or to close. Only contract
//! violations, oversized responses and I/O failures surface as [`protocol::CodecError`].
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - No TLS, no compression, no connection pooling

pub mod codec;
pub mod headers;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
