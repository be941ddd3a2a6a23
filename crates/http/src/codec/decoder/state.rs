/// States of the [`HttpDecoder`](super::HttpDecoder).
///
/// ```text
/// SkipControlChars -> ReadInitialLine -> ReadHeaders -+-> (empty body)           -> SkipControlChars
///                                                     +-> ReadFixedLengthContent  -> SkipControlChars
///                                                     +-> ReadVariableLengthContent (until end of input)
///                                                     +-> ReadChunkSize <-> ReadChunkedContent -> ReadChunkDelimiter
///                                                              |
///                                                              +-> ReadChunkFooter -> SkipControlChars
/// ```
///
/// Any framing error leads to `BadMessage`; a finished protocol switch leads to
/// `Upgraded`. Both are left only through a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Skipping control characters and whitespace before a message.
    SkipControlChars,
    ReadInitialLine,
    ReadHeaders,
    /// Body delimited by the end of the stream.
    ReadVariableLengthContent,
    ReadFixedLengthContent { remaining: u64 },
    ReadChunkSize,
    ReadChunkedContent { remaining: u64 },
    /// The line terminator after a chunk's data.
    ReadChunkDelimiter,
    /// Trailer fields after the last chunk.
    ReadChunkFooter,
    /// Discarding everything until reset.
    BadMessage,
    /// Passing bytes through untouched.
    Upgraded,
}

impl State {
    /// Whether the decoder is reading body bytes or chunk framing.
    pub fn is_reading_content(self) -> bool {
        matches!(
            self,
            State::ReadVariableLengthContent
                | State::ReadFixedLengthContent { .. }
                | State::ReadChunkSize
                | State::ReadChunkedContent { .. }
                | State::ReadChunkDelimiter
                | State::ReadChunkFooter
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_states() {
        assert!(State::ReadFixedLengthContent { remaining: 1 }.is_reading_content());
        assert!(State::ReadChunkFooter.is_reading_content());
        assert!(State::ReadVariableLengthContent.is_reading_content());

        for state in [State::SkipControlChars, State::ReadInitialLine, State::ReadHeaders, State::BadMessage, State::Upgraded] {
            assert!(!state.is_reading_content(), "{state:?}");
        }
    }
}
