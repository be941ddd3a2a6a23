//! Limits and switches for the decoder and the aggregator.

/// Default limit for the request or status line.
pub const DEFAULT_MAX_INITIAL_LINE_LENGTH: usize = 4096;

/// Default limit for the whole header block, and separately for the trailer block.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 8 * 1024;

/// Default upper bound for the bytes carried by one content event.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 8 * 1024;

/// Settings of one [`HttpDecoder`](super::HttpDecoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Longest accepted initial line (and chunk size line), terminator excluded.
    pub max_initial_line_length: usize,
    /// Largest accepted header block, and trailer block.
    pub max_header_size: usize,
    /// Largest content event the decoder emits. Zero is read as one.
    pub max_chunk_size: usize,
    /// When off, a chunked message is a decoding error.
    pub chunked_supported: bool,
    /// When off, chunked content is only emitted once a whole chunk (up to
    /// `max_chunk_size`) is buffered.
    pub allow_partial_chunks: bool,
    /// Checks header names and values while decoding.
    pub validate_headers: bool,
    /// Accepts repeated `Content-Length` values as long as they agree.
    pub allow_duplicate_content_lengths: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_initial_line_length: DEFAULT_MAX_INITIAL_LINE_LENGTH,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            chunked_supported: true,
            allow_partial_chunks: true,
            validate_headers: true,
            allow_duplicate_content_lengths: false,
        }
    }
}

impl DecoderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// `max_chunk_size`, at least one byte so that content always makes progress.
    pub(crate) fn chunk_limit(self) -> usize {
        self.max_chunk_size.max(1)
    }

    #[must_use]
    pub fn with_max_initial_line_length(mut self, max: usize) -> Self {
        self.max_initial_line_length = max;
        self
    }

    #[must_use]
    pub fn with_max_header_size(mut self, max: usize) -> Self {
        self.max_header_size = max;
        self
    }

    /// Zero is bumped to one so content always makes progress.
    #[must_use]
    pub fn with_max_chunk_size(mut self, max: usize) -> Self {
        self.max_chunk_size = max.max(1);
        self
    }

    #[must_use]
    pub fn with_chunked_supported(mut self, supported: bool) -> Self {
        self.chunked_supported = supported;
        self
    }

    #[must_use]
    pub fn with_allow_partial_chunks(mut self, allow: bool) -> Self {
        self.allow_partial_chunks = allow;
        self
    }

    #[must_use]
    pub fn with_validate_headers(mut self, validate: bool) -> Self {
        self.validate_headers = validate;
        self
    }

    #[must_use]
    pub fn with_allow_duplicate_content_lengths(mut self, allow: bool) -> Self {
        self.allow_duplicate_content_lengths = allow;
        self
    }
}

/// Settings of one [`HttpObjectAggregator`](super::HttpObjectAggregator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Largest body the aggregator buffers.
    pub max_content_length: usize,
    /// Asks the caller to close the connection after rejecting an `Expect` header.
    pub close_on_expectation_failed: bool,
}

impl AggregatorConfig {
    pub fn new(max_content_length: usize) -> Self {
        Self { max_content_length, close_on_expectation_failed: false }
    }

    #[must_use]
    pub fn with_close_on_expectation_failed(mut self, close: bool) -> Self {
        self.close_on_expectation_failed = close;
        self
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self::new(1024 * 1024)
    }
}
