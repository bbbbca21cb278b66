//! Framing limits and header-derived framing facts.

use crate::headers::Headers;

/// Size limits enforced by the flow.
///
/// The protocol itself does not bound first lines, header lines or
/// declared body lengths, so the flow does: a first line at or over
/// `max_line_length` is answered with a 400, an oversized header line
/// errors the connection, and a `Content-Length` over
/// `max_content_length` is answered with a 413.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Longest accepted header or first line, in bytes.
    pub max_line_length: usize,
    /// Largest accepted declared body length, in bytes.
    pub max_content_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_line_length: 8 * 1024,
            max_content_length: 16 * 1024 * 1024,
        }
    }
}

/// Whether headers declare a chunked body.
///
/// https://tools.ietf.org/html/rfc2616#section-4.4
///
/// If a Transfer-Encoding header field is present and has any value other
/// than "identity", then the transfer-length is defined by use of the
/// "chunked" transfer-coding. This crate does not decode chunked bodies;
/// the flow rejects such messages up front.
pub(crate) fn is_chunked(headers: &Headers) -> bool {
    headers
        .get("transfer-encoding")
        .map(|h| !h.contains("identity"))
        .unwrap_or(false)
}

/// The declared `Content-Length`, or 0 when absent or malformed.
pub(crate) fn content_length(headers: &Headers) -> usize {
    headers.get_as("content-length").unwrap_or(0)
}
