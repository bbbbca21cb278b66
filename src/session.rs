//! Transport-agnostic session state.
//!
//! Everything a connection accumulates between reads lives here, away
//! from the I/O driving in [`crate::flow`]. All helpers are pure over
//! this state, which is what makes the state machine testable without a
//! socket.

use std::collections::{BTreeSet, VecDeque};

use crate::buf::InputBuffer;
use crate::grammar::{RequestLine, StatusLine};
use crate::headers::{HeaderParser, Headers};
use crate::limit::content_length;
use crate::negotiate::negotiate;

/// Progress of a session through one message exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Awaiting the first line of an inbound request (server role).
    Request,
    /// Awaiting the first line of an inbound status reply (client role).
    Status,
    /// Awaiting header lines or the terminating blank line.
    Header,
    /// Awaiting body bytes, up to the declared content length.
    Content,
    /// The processor has the completed message; no parsing in progress.
    Processing,
    /// A parse or protocol error occurred.
    Error,
    /// The connection was recycled and all resources released.
    Shutdown,
}

/// Header names whose negotiated value is sent back under another name.
fn outbound_twin(name: &str) -> Option<&'static str> {
    if name.eq_ignore_ascii_case("accept") {
        Some("Content-Type")
    } else {
        None
    }
}

/// Methods that do not justify a 405 on their own.
///
/// Nearly everything ignores OPTIONS, and TRACE is commonly disabled, so
/// a resource that only ever declared these is better served by a 404.
fn is_non_405_method(method: &str) -> bool {
    method == "OPTIONS" || method == "TRACE"
}

/// All mutable per-connection state.
///
/// Owned by the enclosing session object and handed to
/// [`crate::Flow`] and [`crate::Processor`] hooks by reference; neither
/// of those ever holds on to it.
#[derive(Debug)]
pub struct SessionData {
    /// Current progress; see the transition rules on [`crate::Flow`].
    pub status: Status,
    /// Parsed first line of the last inbound request, if valid.
    pub inbound_request: Option<RequestLine>,
    /// Parsed first line of the last inbound reply, if valid.
    pub inbound_status: Option<StatusLine>,
    /// Inbound header parser. Reset for every message.
    pub inbound: HeaderParser,
    /// Headers automatically included in every generated reply.
    pub outbound: Headers,
    /// Outcomes of the last [`SessionData::negotiate`] call, under the
    /// inbound header names.
    pub negotiated: Headers,
    /// Accumulated message body.
    pub content: Vec<u8>,
    /// Declared body length of the message being parsed.
    pub content_length: usize,
    /// Requests sent over this session. Only ever grows.
    pub requests: usize,
    /// Replies sent over this session. Only ever grows.
    pub replies: usize,
    /// Transport errors observed. Only ever grows.
    pub errors: usize,
    /// Serialized messages awaiting their turn on the wire.
    pub outbound_queue: VecDeque<Vec<u8>>,
    /// Close the connection once the queue has drained.
    pub close_after_send: bool,
    /// Whether a write is currently in flight. At most one ever is.
    pub write_pending: bool,
    /// Whether the session has been recycled and may be reused.
    pub free: bool,
    /// The message being answered is a HEAD request, so replies carry no
    /// body. Their Content-Length is still set; the RFC allows that and
    /// it is the more useful behavior.
    pub is_head: bool,
    /// Bytes read off the transport, not yet claimed by the parser.
    pub input: InputBuffer,

    /// Headers merged into every outbound request.
    client_headers: Headers,
}

impl Default for SessionData {
    fn default() -> Self {
        let mut client_headers = Headers::new();
        client_headers.set(
            "User-Agent",
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
        );

        SessionData {
            status: Status::Request,
            inbound_request: None,
            inbound_status: None,
            inbound: HeaderParser::new(),
            outbound: Headers::new(),
            negotiated: Headers::new(),
            content: Vec::new(),
            content_length: 0,
            requests: 0,
            replies: 0,
            errors: 0,
            outbound_queue: VecDeque::new(),
            close_after_send: false,
            write_pending: false,
            free: false,
            is_head: false,
            input: InputBuffer::new(),
            client_headers,
        }
    }
}

impl SessionData {
    pub fn new() -> Self {
        SessionData::default()
    }

    /// A session whose outbound requests carry the given default headers
    /// instead of the crate's `User-Agent`.
    pub fn with_client_headers(client_headers: Headers) -> Self {
        SessionData {
            client_headers,
            ..SessionData::default()
        }
    }

    /// Total number of queries this session has answered or sent.
    pub fn queries(&self) -> usize {
        self.replies + self.requests
    }

    /// How many body bytes are still expected for the current message.
    pub fn remaining_bytes(&self) -> usize {
        self.content_length.saturating_sub(self.content.len())
    }

    /// Generate a complete reply message.
    ///
    /// Informational replies and replies to HEAD requests carry no body,
    /// though HEAD replies still declare the Content-Length. Error
    /// statuses (400 and up) get `Connection: close`. Computed headers
    /// win over the caller's, which win over the session's `outbound`
    /// set.
    ///
    /// Replies are always `HTTP/1.1`, regardless of the inbound version.
    pub fn generate_reply(&self, status: u16, body: &[u8], header: &Headers) -> Vec<u8> {
        // informational responses have no message body.
        let allow_body = status >= 200 && !self.is_head;
        // we automatically close connections when an error code is sent.
        let allow_keep_alive = status < 400;

        let mut head = Headers::new();

        // The Content-Length is set for HEAD requests, even though those
        // do not actually get a body.
        if allow_body || self.is_head {
            head.set("Content-Length", body.len().to_string());
        }
        if !allow_keep_alive {
            head.set("Connection", "close");
        }

        head.merge(header);
        head.merge(&self.outbound);

        let mut reply = StatusLine::new(status).assemble().into_bytes();
        head.write_to(&mut reply);
        reply.extend_from_slice(b"\r\n");

        if allow_body {
            reply.extend_from_slice(body);
        }

        reply
    }

    /// Queue a reply for sending.
    ///
    /// Statuses of 400 and up latch `close_after_send`, so the connection
    /// goes away once the queue has drained.
    pub fn reply(&mut self, status: u16, body: &[u8], header: &Headers) {
        trace!("queue reply: {} ({} byte body)", status, body.len());

        let msg = self.generate_reply(status, body, header);
        self.outbound_queue.push_back(msg);

        self.close_after_send = self.close_after_send || status >= 400;

        self.replies += 1;
    }

    /// Queue a request for sending.
    ///
    /// Merges in the session's default client headers, and declares the
    /// body length if a body is given and the caller did not. Only makes
    /// sense in the client role, but nothing prevents other uses.
    pub fn request(
        &mut self,
        method: &str,
        resource: &str,
        header: &Headers,
        body: &[u8],
    ) -> Result<(), crate::Error> {
        if method.contains(char::is_whitespace) || resource.contains(char::is_whitespace) {
            return Err(crate::Error::User(format!(
                "Malformed request target: {} {}",
                method, resource
            )));
        }

        let mut head = header.clone();
        if !body.is_empty() && !head.contains("Content-Length") {
            head.set("Content-Length", body.len().to_string());
        }
        head.merge(&self.client_headers);

        let mut msg = RequestLine::new(method, resource).assemble().into_bytes();
        head.write_to(&mut msg);
        msg.extend_from_slice(b"\r\n");
        msg.extend_from_slice(body);

        trace!("queue request: {} {}", method, resource);

        self.outbound_queue.push_back(msg);

        self.is_head = method == "HEAD";

        self.requests += 1;

        Ok(())
    }

    /// Extract data from `input` as the current state needs it.
    ///
    /// While parsing first lines or headers this consumes one line, with
    /// the terminating LF stripped. While parsing content it consumes as
    /// much of the remaining body as is buffered. Anything else gets
    /// nothing.
    pub fn buffer(&mut self) -> Vec<u8> {
        match self.status {
            Status::Request | Status::Status | Status::Header => self.input.take_line(),
            Status::Content => {
                let max = self.remaining_bytes().min(self.input.len());
                self.input.take(max)
            }
            _ => Vec::new(),
        }
    }

    /// Derive the declared body length from the inbound headers.
    ///
    /// Meant to be called from [`crate::Processor::after_headers`];
    /// returns the status to continue with.
    pub fn expect_content(&mut self) -> Status {
        self.content_length = content_length(&self.inbound.headers);

        if self.content_length > 0 {
            Status::Content
        } else {
            Status::Processing
        }
    }

    /// Negotiate header values against the inbound headers.
    ///
    /// For every `(inbound name, capability list)` pair this records the
    /// negotiated value in `negotiated`, appends the inbound name to the
    /// outbound `Vary`, and, where the inbound name has an outbound twin
    /// (`Accept` is answered by `Content-Type`), sets that twin in
    /// `outbound`.
    ///
    /// Returns false if any negotiation came up empty.
    pub fn negotiate(&mut self, negotiations: &Headers) -> bool {
        let mut bad_negotiation = false;

        self.negotiated = Headers::new();

        for (name, capabilities) in negotiations.iter() {
            let client_value = self.inbound.headers.get(name).unwrap_or("");
            let value = negotiate(client_value, capabilities);

            // mark the header as having influenced the reply.
            self.outbound.append("Vary", name);

            self.negotiated.set(name, value.clone());

            if let Some(twin) = outbound_twin(name) {
                self.outbound.set(twin, value.clone());
            }

            bad_negotiation = bad_negotiation || value.is_empty();
        }

        !bad_negotiation
    }

    /// Decide whether a 405 fits better than a 404.
    ///
    /// True iff the allowed methods contain anything beyond the ones
    /// every resource is expected to ignore.
    pub fn trigger_405(methods: &BTreeSet<String>) -> bool {
        methods.iter().any(|m| !is_non_405_method(m))
    }

    /// Re-arm a recycled session for a fresh connection.
    ///
    /// Parse state, queues and flags are cleared; the activity counters
    /// keep their values for the lifetime of the session object.
    pub fn reuse(&mut self, status: Status) {
        assert!(self.free, "reuse of a session that was not recycled");

        self.status = status;
        self.inbound_request = None;
        self.inbound_status = None;
        self.inbound.reset();
        self.outbound = Headers::new();
        self.negotiated = Headers::new();
        self.content.clear();
        self.content_length = 0;
        self.outbound_queue.clear();
        self.close_after_send = false;
        self.write_pending = false;
        self.is_head = false;
        self.input.clear();
        self.free = false;
    }
}
