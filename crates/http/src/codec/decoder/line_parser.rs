//! Line and field parsing on top of a [`Cumulation`].
//!
//! Lines end with LF; a CR right before the LF is stripped, a bare LF is accepted.

use bytes::{Buf, Bytes};
use http::header;
use tracing::trace;

use crate::codec::Cumulation;
use crate::ensure;
use crate::headers::HttpHeaders;
use crate::protocol::{DecodeError, util};

/// Which limit a [`LineParser`] enforces, and how it reports a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineLimit {
    InitialLine(usize),
    HeaderBlock(usize),
}

impl LineLimit {
    fn max(self) -> usize {
        match self {
            LineLimit::InitialLine(max) | LineLimit::HeaderBlock(max) => max,
        }
    }

    fn exceeded(self) -> DecodeError {
        match self {
            LineLimit::InitialLine(max) => DecodeError::TooLongInitialLine { max },
            LineLimit::HeaderBlock(max) => DecodeError::TooLongHeader { max },
        }
    }
}

/// Reads one line at a time while counting the bytes read so far against a limit.
///
/// The count survives across lines until [`reset`](Self::reset), so the same parser
/// bounds a whole header block as well as a single line.
#[derive(Debug)]
pub(crate) struct LineParser {
    limit: LineLimit,
    size: usize,
    // bytes of the current line already searched for the LF
    scanned: usize,
}

impl LineParser {
    pub(crate) fn new(limit: LineLimit) -> Self {
        Self { limit, size: 0, scanned: 0 }
    }

    pub(crate) fn reset(&mut self) {
        self.size = 0;
        self.scanned = 0;
    }

    /// The next line without its terminator, or `Ok(None)` until the LF arrives.
    pub(crate) fn parse(&mut self, src: &mut Cumulation) -> Result<Option<Bytes>, DecodeError> {
        let Some(lf) = src.find_byte(b'\n', self.scanned.min(src.remaining())) else {
            self.scanned = src.remaining();
            // a trailing CR may be the first half of the terminator
            let mut pending = src.remaining();
            if pending > 0 && src.byte_at(pending - 1) == Some(b'\r') {
                pending -= 1;
            }
            ensure!(self.size + pending <= self.limit.max(), self.limit.exceeded());
            return Ok(None);
        };

        let line_len = if lf > 0 && src.byte_at(lf - 1) == Some(b'\r') { lf - 1 } else { lf };
        ensure!(self.size + line_len <= self.limit.max(), self.limit.exceeded());
        self.size += line_len;
        self.scanned = 0;

        let line = src.copy_to_bytes(line_len);
        src.advance(lf + 1 - line_len);
        Ok(Some(line))
    }
}

/// How field lines are checked while they are committed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldRules {
    /// Names must be tokens, values must be free of control bytes.
    pub(crate) validate: bool,
    /// Whitespace between name and colon is tolerated (response direction).
    pub(crate) lenient_name: bool,
    /// The fields are trailers, so framing fields are prohibited.
    pub(crate) trailers: bool,
}

/// Reads a block of `name: value` lines up to the blank line, across any number of
/// decode calls.
#[derive(Debug)]
pub(crate) struct FieldReader {
    parser: LineParser,
    pending: Option<(String, String)>,
}

impl FieldReader {
    pub(crate) fn new(max_size: usize) -> Self {
        Self { parser: LineParser::new(LineLimit::HeaderBlock(max_size)), pending: None }
    }

    pub(crate) fn reset(&mut self) {
        self.parser.reset();
        self.pending = None;
    }

    /// Adds complete fields to `fields`; returns `Ok(true)` once the blank line is read.
    pub(crate) fn read(&mut self, src: &mut Cumulation, fields: &mut HttpHeaders, rules: FieldRules) -> Result<bool, DecodeError> {
        while let Some(line) = self.parser.parse(src)? {
            if line.is_empty() {
                self.commit(fields, rules)?;
                self.reset();
                return Ok(true);
            }

            let text = line_to_string(&line);
            if text.starts_with([' ', '\t']) {
                if let Some((_, value)) = self.pending.as_mut() {
                    // obsolete line folding
                    let folded = text.trim_matches([' ', '\t']);
                    if !folded.is_empty() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(folded);
                    }
                    continue;
                }
            }

            self.commit(fields, rules)?;
            let (name, value) = split_field(&text, rules.lenient_name)?;
            self.pending = Some((name.to_string(), value.to_string()));
        }
        Ok(false)
    }

    fn commit(&mut self, fields: &mut HttpHeaders, rules: FieldRules) -> Result<(), DecodeError> {
        let Some((name, value)) = self.pending.take() else {
            return Ok(());
        };

        if rules.validate {
            util::validate_name(&name)?;
            util::validate_value(&value)?;
        }
        if rules.trailers && is_prohibited_trailer(&name) {
            return Err(DecodeError::invalid_trailer(name));
        }

        trace!(name = %name, value_size = value.len(), "decoded field");
        fields.add(name, value);
        Ok(())
    }
}

/// Splits `name: value`, trimming optional whitespace around the value.
pub(crate) fn split_field(line: &str, lenient_name: bool) -> Result<(&str, &str), DecodeError> {
    let Some(colon) = line.find(':') else {
        return Err(DecodeError::invalid_header("no colon found"));
    };

    let name = &line[..colon];
    let name = if lenient_name { name.trim_end_matches([' ', '\t']) } else { name };
    ensure!(!name.is_empty(), DecodeError::invalid_header("empty header name"));

    Ok((name, line[colon + 1..].trim_matches([' ', '\t'])))
}

/// Header bytes as text; bytes outside UTF-8 are taken as Latin-1.
pub(crate) fn line_to_string(line: &[u8]) -> String {
    match std::str::from_utf8(line) {
        Ok(text) => text.to_string(),
        Err(_) => line.iter().copied().map(char::from).collect(),
    }
}

fn is_prohibited_trailer(name: &str) -> bool {
    [header::CONTENT_LENGTH, header::TRANSFER_ENCODING, header::TRAILER].iter().any(|prohibited| name.eq_ignore_ascii_case(prohibited.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Cumulator;

    fn cumulation(fragments: &[&'static [u8]]) -> Cumulation {
        let mut cumulation = Cumulation::new(Cumulator::Composite);
        for fragment in fragments {
            cumulation.push(Bytes::from_static(fragment));
        }
        cumulation
    }

    const RULES: FieldRules = FieldRules { validate: true, lenient_name: false, trailers: false };

    #[test]
    fn crlf_and_bare_lf() {
        let mut src = cumulation(&[b"first\r\nsecond\nthird"]);
        let mut parser = LineParser::new(LineLimit::InitialLine(64));

        assert_eq!(parser.parse(&mut src).unwrap(), Some(Bytes::from_static(b"first")));
        parser.reset();
        assert_eq!(parser.parse(&mut src).unwrap(), Some(Bytes::from_static(b"second")));
        parser.reset();
        assert_eq!(parser.parse(&mut src).unwrap(), None);
        assert_eq!(src.remaining(), 5);
    }

    #[test]
    fn line_split_across_fragments() {
        let mut src = cumulation(&[b"GET / HT", b"TP/1.1\r", b"\nrest"]);
        let mut parser = LineParser::new(LineLimit::InitialLine(64));

        assert_eq!(parser.parse(&mut src).unwrap(), Some(Bytes::from_static(b"GET / HTTP/1.1")));
        assert_eq!(src.remaining(), 4);
    }

    #[test]
    fn resumes_search_after_scanned_bytes() {
        let mut src = cumulation(&[b"Host: exa"]);
        let mut parser = LineParser::new(LineLimit::HeaderBlock(64));

        assert_eq!(parser.parse(&mut src).unwrap(), None);
        assert_eq!(parser.scanned, 9);
        src.push(Bytes::from_static(b"mple.com\r"));
        assert_eq!(parser.parse(&mut src).unwrap(), None);
        assert_eq!(parser.scanned, 18);

        src.push(Bytes::from_static(b"\nAccept: */*\n"));
        assert_eq!(parser.parse(&mut src).unwrap(), Some(Bytes::from_static(b"Host: example.com")));
        assert_eq!(parser.scanned, 0);
        assert_eq!(parser.parse(&mut src).unwrap(), Some(Bytes::from_static(b"Accept: */*")));
        assert_eq!(src.remaining(), 0);
    }

    #[test]
    fn limit_counts_without_terminator() {
        let mut src = cumulation(&[b"12345\r"]);
        let mut parser = LineParser::new(LineLimit::InitialLine(5));
        // the trailing CR does not count while the LF is missing
        assert_eq!(parser.parse(&mut src).unwrap(), None);

        src.push(Bytes::from_static(b"\n"));
        assert_eq!(parser.parse(&mut src).unwrap(), Some(Bytes::from_static(b"12345")));

        let mut src = cumulation(&[b"123456"]);
        assert!(matches!(parser.parse(&mut src), Err(DecodeError::TooLongInitialLine { max: 5 })));
    }

    #[test]
    fn header_block_limit_is_cumulative() {
        let mut src = cumulation(&[b"A: 1\r\nB: 2\r\n"]);
        let mut parser = LineParser::new(LineLimit::HeaderBlock(6));

        assert!(parser.parse(&mut src).unwrap().is_some());
        assert!(matches!(parser.parse(&mut src), Err(DecodeError::TooLongHeader { max: 6 })));
    }

    #[test]
    fn reads_and_folds_fields() {
        let mut src = cumulation(&[b"Host: a\r\nX-Long: one\r\n", b" two\r\n\tthree\r\nAccept:  */*  \r\n\r\nbody"]);
        let mut reader = FieldReader::new(1024);
        let mut fields = HttpHeaders::new();

        assert!(reader.read(&mut src, &mut fields, RULES).unwrap());
        assert_eq!(fields.get("host"), Some("a"));
        assert_eq!(fields.get("x-long"), Some("one two three"));
        assert_eq!(fields.get("accept"), Some("*/*"));
        assert_eq!(src.remaining(), 4);
    }

    #[test]
    fn waits_for_blank_line() {
        let mut src = cumulation(&[b"Host: a\r\nAcc"]);
        let mut reader = FieldReader::new(1024);
        let mut fields = HttpHeaders::new();

        assert!(!reader.read(&mut src, &mut fields, RULES).unwrap());
        // the last complete field is held back in case a folded line follows
        assert!(fields.is_empty());

        src.push(Bytes::from_static(b"ept: x\r\n\r\n"));
        assert!(reader.read(&mut src, &mut fields, RULES).unwrap());
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn validation_and_trailer_rules() {
        let mut fields = HttpHeaders::new();

        let mut src = cumulation(&[b"Bad Name: x\r\n\r\n"]);
        assert!(FieldReader::new(1024).read(&mut src, &mut fields, RULES).is_err());

        let mut src = cumulation(&[b"Bad Name: x\r\n\r\n"]);
        let rules = FieldRules { validate: false, ..RULES };
        assert!(FieldReader::new(1024).read(&mut src, &mut fields, rules).unwrap());
        assert_eq!(fields.get("bad name"), Some("x"));

        let mut src = cumulation(&[b"Server : x\r\n\r\n"]);
        let rules = FieldRules { lenient_name: true, ..RULES };
        assert!(FieldReader::new(1024).read(&mut src, &mut fields, rules).unwrap());
        assert_eq!(fields.get("server"), Some("x"));

        let mut src = cumulation(&[b"Content-Length: 3\r\n\r\n"]);
        let rules = FieldRules { trailers: true, ..RULES };
        let result = FieldReader::new(1024).read(&mut src, &mut fields, rules);
        assert!(matches!(result, Err(DecodeError::InvalidTrailer { .. })));
    }

    #[test]
    fn split_field_errors() {
        assert!(split_field("no colon", false).is_err());
        assert!(split_field(": empty", false).is_err());
        assert_eq!(split_field("A:", false).unwrap(), ("A", ""));
    }

    #[test]
    fn latin1_fallback() {
        assert_eq!(line_to_string(b"caf\xe9"), "caf\u{e9}");
        assert_eq!(line_to_string("café".as_bytes()), "café");
    }
}
