//! Canned error replies.
//!
//! Used by the flow for protocol-level rejections (400, 413, 501, 505)
//! and available to processors for their own refusals. Replies go
//! through [`SessionData::reply`], so the close-on-error latch and the
//! reply counter apply as usual.

use std::collections::BTreeSet;

use crate::grammar::StatusLine;
use crate::headers::Headers;
use crate::session::SessionData;

/// Queue a plain-text error reply for the given status code.
pub fn reply(session: &mut SessionData, status: u16) {
    reply_with(session, status, &Headers::new());
}

/// Queue a plain-text error reply with extra headers.
pub fn reply_with(session: &mut SessionData, status: u16, header: &Headers) {
    let line = StatusLine::new(status);
    let body = format!("{} {}\r\n", line.code, line.reason);

    let mut head = Headers::new();
    head.set("Content-Type", "text/plain");
    head.merge(header);

    debug!("canned error reply: {}", status);

    session.reply(status, body.as_bytes(), &head);
}

/// Queue a 405 carrying the `Allow` header.
///
/// Pairs with [`SessionData::trigger_405`], which decides whether the
/// allowed set justifies a 405 over a 404 in the first place.
pub fn method_not_allowed(session: &mut SessionData, allow: &BTreeSet<String>) {
    let methods: Vec<&str> = allow.iter().map(|m| m.as_str()).collect();

    let mut header = Headers::new();
    header.set("Allow", methods.join(","));

    reply_with(session, 405, &header);
}
