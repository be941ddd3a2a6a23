//! Request and status lines.

use std::fmt;

use http::{Method, StatusCode, Version};

use crate::protocol::DecodeError;

/// `METHOD SP target SP HTTP-version`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    method: Method,
    target: String,
    version: Version,
}

/// `HTTP-version SP status-code SP reason-phrase`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    version: Version,
    status: StatusCode,
    reason: String,
}

/// The first line of an HTTP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request(RequestLine),
    Response(StatusLine),
}

impl RequestLine {
    pub fn new(method: Method, target: impl Into<String>, version: Version) -> Self {
        Self { method, target: target.into(), version }
    }

    /// Builds a request line from the three tokens of the wire form.
    pub fn parse(method: &str, target: &str, version: &str) -> Result<Self, DecodeError> {
        let method = Method::from_bytes(method.as_bytes()).map_err(|_| DecodeError::invalid_method(method))?;
        Ok(Self { method, target: target.to_string(), version: parse_version(version)? })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = target.into();
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

impl StatusLine {
    /// A status line carrying the canonical reason phrase of `status`.
    pub fn new(version: Version, status: StatusCode) -> Self {
        Self::with_reason(version, status, status.canonical_reason().unwrap_or(""))
    }

    pub fn with_reason(version: Version, status: StatusCode, reason: impl Into<String>) -> Self {
        Self { version, status, reason: reason.into() }
    }

    /// Builds a status line from the wire tokens; the reason phrase may be empty.
    pub fn parse(version: &str, status: &str, reason: &str) -> Result<Self, DecodeError> {
        let version = parse_version(version)?;
        let code = status.parse::<u16>().map_err(|_| DecodeError::invalid_status(status))?;
        let status = StatusCode::from_u16(code).map_err(|_| DecodeError::invalid_status(code))?;
        Ok(Self { version, status, reason: reason.to_string() })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Replaces the status and its reason phrase with the canonical one.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
        self.reason = status.canonical_reason().unwrap_or("").to_string();
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = reason.into();
    }
}

impl StartLine {
    pub fn version(&self) -> Version {
        match self {
            StartLine::Request(line) => line.version,
            StartLine::Response(line) => line.version,
        }
    }

    pub fn set_version(&mut self, version: Version) {
        match self {
            StartLine::Request(line) => line.version = version,
            StartLine::Response(line) => line.version = version,
        }
    }

    #[inline]
    pub fn is_request(&self) -> bool {
        matches!(self, StartLine::Request(_))
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        matches!(self, StartLine::Response(_))
    }

    pub fn method(&self) -> Option<&Method> {
        match self {
            StartLine::Request(line) => Some(&line.method),
            StartLine::Response(_) => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            StartLine::Request(_) => None,
            StartLine::Response(line) => Some(line.status),
        }
    }

    pub fn as_request(&self) -> Option<&RequestLine> {
        match self {
            StartLine::Request(line) => Some(line),
            StartLine::Response(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&StatusLine> {
        match self {
            StartLine::Request(_) => None,
            StartLine::Response(line) => Some(line),
        }
    }

    pub fn as_request_mut(&mut self) -> Option<&mut RequestLine> {
        match self {
            StartLine::Request(line) => Some(line),
            StartLine::Response(_) => None,
        }
    }

    pub fn as_response_mut(&mut self) -> Option<&mut StatusLine> {
        match self {
            StartLine::Request(_) => None,
            StartLine::Response(line) => Some(line),
        }
    }
}

impl From<RequestLine> for StartLine {
    fn from(line: RequestLine) -> Self {
        StartLine::Request(line)
    }
}

impl From<StatusLine> for StartLine {
    fn from(line: StatusLine) -> Self {
        StartLine::Response(line)
    }
}

/// Formats the line exactly as it goes on the wire, without the line terminator.
impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartLine::Request(line) => write!(f, "{} {} {}", line.method, line.target, version_str(line.version)),
            StartLine::Response(line) => {
                write!(f, "{} {} {}", version_str(line.version), line.status.as_str(), line.reason)
            }
        }
    }
}

/// The protocol token for `version`, as written in start lines.
pub fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

fn parse_version(text: &str) -> Result<Version, DecodeError> {
    if text.eq_ignore_ascii_case("HTTP/1.1") {
        Ok(Version::HTTP_11)
    } else if text.eq_ignore_ascii_case("HTTP/1.0") {
        Ok(Version::HTTP_10)
    } else {
        Err(DecodeError::invalid_version(text))
    }
}
