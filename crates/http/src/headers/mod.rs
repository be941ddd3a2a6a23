//! Header storage shared by the decoder, the encoder and the aggregator.
//!
//! [`Headers`] is an ordered multimap generic over how names and values are compared
//! ([`HashingStrategy`]) and how typed values are read and written ([`ValueConverter`]).
//! The two instantiations used throughout the crate are:
//!
//! - [`HttpHeaders`]: ASCII case-insensitive names, the HTTP/1.1 default
//! - [`CaseSensitiveHeaders`]: byte-exact names
//!
//! # Example
//!
//! ```
//! use micro_http_codec::headers::HttpHeaders;
//!
//! let mut headers = HttpHeaders::new();
//! headers.add("X-Foo", "1").add("x-foo", "2");
//!
//! assert_eq!(headers.get("X-FOO"), Some("1"));
//! assert_eq!(headers.get_all("x-foo"), vec!["1", "2"]);
//! ```

mod converter;
pub use converter::ConvertError;
pub use converter::TextConverter;
pub use converter::ValueConverter;

mod strategy;
pub use strategy::AsciiCaseInsensitive;
pub use strategy::CaseSensitive;
pub use strategy::HashingStrategy;

mod multimap;
pub use multimap::CaseSensitiveHeaders;
pub use multimap::Headers;
pub use multimap::HttpHeaders;
pub use multimap::Iter;
