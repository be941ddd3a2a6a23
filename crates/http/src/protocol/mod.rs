//! Protocol types shared by every codec stage.
//!
//! This module holds the vocabulary that flows through the pipeline; it does not parse
//! or serialize anything itself.
//!
//! # Components
//!
//! - **Start lines** ([`StartLine`]): a [`RequestLine`] or a [`StatusLine`]
//!
//! - **Events** ([`HttpEvent`]): what the decoder emits and the encoder consumes
//!   - [`HttpHead`]: start line plus headers
//!   - `Content`: a piece of body bytes
//!   - [`LastContent`]: the final piece of body plus trailers
//!
//! - **Aggregated messages** ([`FullMessage`]): head, whole body and trailers
//!
//! - **Decode outcome** ([`DecoderResult`]): attached to heads and last contents so that
//!   framing failures travel with the data
//!
//! - **Errors** ([`DecodeError`], [`CodecError`])
//!
//! - **Helpers** ([`util`]): keep-alive, content length, chunked framing and expectation
//!   rules on top of the header map

mod error;
pub use error::CodecError;
pub use error::DecodeError;

mod start_line;
pub use start_line::RequestLine;
pub use start_line::StartLine;
pub use start_line::StatusLine;
pub use start_line::version_str;

mod message;
pub use message::DecoderResult;
pub use message::HttpEvent;
pub use message::HttpHead;
pub use message::LastContent;

mod full;
pub use full::FullMessage;

pub mod util;
