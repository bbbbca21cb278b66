//! First-line grammar: request lines, status lines, versions.

use std::fmt;

/// An HTTP protocol version, as found in a first line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    /// Parse a `HTTP/<major>.<minor>` token.
    ///
    /// Any digits are accepted here; rejecting unsupported majors is the
    /// flow's job, since it needs the parsed value to pick a 505 over a
    /// 400.
    pub fn parse(token: &str) -> Option<Version> {
        let rest = token.strip_prefix("HTTP/")?;
        let (major, minor) = rest.split_once('.')?;

        if major.is_empty() || minor.is_empty() {
            return None;
        }

        Some(Version {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// The first line of a request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub resource: String,
    pub version: Version,
}

impl RequestLine {
    pub fn new(method: &str, resource: &str) -> Self {
        RequestLine {
            method: method.to_string(),
            resource: resource.to_string(),
            version: Version { major: 1, minor: 1 },
        }
    }

    /// Parse a `METHOD SP resource SP HTTP/x.y` line, trailing CR allowed.
    pub fn parse(line: &str) -> Option<RequestLine> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        let mut parts = line.split(' ').filter(|p| !p.is_empty());
        let method = parts.next()?;
        let resource = parts.next()?;
        let version = Version::parse(parts.next()?)?;

        if parts.next().is_some() || !is_token(method) {
            return None;
        }

        Some(RequestLine {
            method: method.to_string(),
            resource: resource.to_string(),
            version,
        })
    }

    /// Serialized form. Outbound requests are always `HTTP/1.1`.
    pub fn assemble(&self) -> String {
        format!("{} {} HTTP/1.1\r\n", self.method, self.resource)
    }
}

/// The first line of a reply.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: Version,
    pub code: u16,
    pub reason: String,
}

impl StatusLine {
    /// Status line for an outbound reply, with the canonical reason
    /// phrase for the code.
    pub fn new(code: u16) -> Self {
        let reason = http::StatusCode::from_u16(code)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown");

        StatusLine {
            version: Version { major: 1, minor: 1 },
            code,
            reason: reason.to_string(),
        }
    }

    /// Parse a `HTTP/x.y code reason` line, trailing CR allowed. The
    /// reason phrase may be empty.
    pub fn parse(line: &str) -> Option<StatusLine> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        let (version, rest) = match line.split_once(' ') {
            Some(s) => s,
            None => return None,
        };
        let version = Version::parse(version)?;

        let (code, reason) = match rest.split_once(' ') {
            Some((c, r)) => (c, r),
            None => (rest, ""),
        };

        if code.len() != 3 {
            return None;
        }
        let code: u16 = code.parse().ok()?;
        if code < 100 {
            return None;
        }

        Some(StatusLine {
            version,
            code,
            reason: reason.to_string(),
        })
    }

    /// Serialized form. Outbound replies are always `HTTP/1.1`.
    pub fn assemble(&self) -> String {
        format!("HTTP/1.1 {} {}\r\n", self.code, self.reason)
    }
}
