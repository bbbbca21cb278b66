//! The per-connection I/O state machine.
//!
//! [`Flow`] owns the transport handles and a [`Processor`], and drives
//! one session through the read, parse, dispatch and write cycle. It is
//! poll-based: [`Flow::poll_drive`] makes as much progress as the
//! transport allows, and everything between two suspension points runs
//! to completion before control is given back.
//!
//! Server-role state transitions:
//!
//! ```text
//! Request --line ok--> Header --blank line--> (Processor::after_headers)
//!                                               --> Content    (body expected)
//!                                               --> Processing (no body)
//! Content --bytes complete--> Processing --handle/after_processing-->
//!                             Request | Shutdown
//! any --parse/transport error--> Error --> [reply 400/505] --> recycle
//! ```
//!
//! The client role is symmetric, with `Status` in place of `Request`.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::ready;

use crate::grammar::{RequestLine, StatusLine, Version};
use crate::limit::{is_chunked, Limits};
use crate::processor::Processor;
use crate::reject;
use crate::session::{SessionData, Status};
use crate::transport::{Handles, Transport};
use crate::{AsyncRead, AsyncWrite};

/// Size of the chunks read off the transport.
const READ_CHUNK_SIZE: usize = 16_384;

/// The read the flow is waiting on, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadOp {
    Idle,
    /// Fill the input buffer up to a full line.
    Line,
    /// Fill the input buffer up to the remaining body length.
    Content,
}

/// An outbound message detached from the queue, partially written.
#[derive(Debug)]
struct WriteBuf {
    buf: Vec<u8>,
    pos: usize,
}

impl WriteBuf {
    fn new(buf: Vec<u8>) -> Self {
        WriteBuf { buf, pos: 0 }
    }

    fn remaining(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    fn is_done(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn advance(&mut self, amount: usize) {
        self.pos += amount;
        assert!(self.pos <= self.buf.len());
    }
}

/// HTTP I/O control flow.
///
/// Owns the transport handles and the processor for the lifetime of the
/// connection. The [`SessionData`] is owned by the caller and passed
/// into every operation, so tearing down a flow never destroys the
/// session.
pub struct Flow<P, T> {
    processor: P,
    io: Handles<T>,
    limits: Limits,
    read_op: ReadOp,
    to_write: Option<WriteBuf>,
}

impl<P, T> Flow<P, T>
where
    P: Processor,
    T: Transport,
{
    pub fn new(processor: P, io: Handles<T>) -> Self {
        Flow::with_limits(processor, io, Limits::default())
    }

    pub fn with_limits(processor: P, io: Handles<T>, limits: Limits) -> Self {
        Flow {
            processor,
            io,
            limits,
            read_op: ReadOp::Idle,
            to_write: None,
        }
    }

    /// Start processing.
    ///
    /// Gives the processor its `start` hook, then issues the first read
    /// and drains anything the hook queued.
    pub fn start(&mut self, session: &mut SessionData) {
        self.processor.start(session);
        self.handle_start(session);
    }

    /// Put the next queued message on the wire.
    ///
    /// Does nothing while a write is in flight; `write_pending` is the
    /// only write-concurrency gate. The message is detached from the
    /// queue before the write is issued, so later calls observe the new
    /// queue head. With nothing left to send, a latched
    /// `close_after_send` or a `Shutdown` status recycles the
    /// connection.
    pub fn send(&mut self, session: &mut SessionData) {
        if session.free || session.write_pending {
            return;
        }

        if let Some(msg) = session.outbound_queue.pop_front() {
            trace!("send: {} bytes", msg.len());
            session.write_pending = true;
            self.to_write = Some(WriteBuf::new(msg));
        } else if session.close_after_send || session.status == Status::Shutdown {
            self.recycle(session);
        }
    }

    /// Ask for input up to the next line ending.
    ///
    /// The read is performed by the next [`Flow::poll_drive`].
    pub fn read_line(&mut self) {
        self.read_op = ReadOp::Line;
    }

    /// Ask for the remainder of the message body.
    ///
    /// The read is performed by the next [`Flow::poll_drive`].
    pub fn read_remaining_content(&mut self) {
        self.read_op = ReadOp::Content;
    }

    /// Tear the connection down and mark the session reusable.
    ///
    /// Idempotent. Closes each distinct transport handle exactly once,
    /// counts teardown failures, clears all pending I/O and consumes any
    /// unparsed input.
    pub fn recycle(&mut self, session: &mut SessionData) {
        if session.free {
            return;
        }

        trace!("recycle");

        self.processor.recycle(session);

        session.status = Status::Shutdown;

        session.close_after_send = false;
        session.outbound_queue.clear();

        // no completion will ever observe these again.
        session.write_pending = false;
        self.to_write = None;
        self.read_op = ReadOp::Idle;

        if self.io.teardown() {
            // already giving up on this connection; count it and move on.
            session.errors += 1;
        }

        session.input.clear();

        session.free = true;
    }

    /// Drive the connection as far as the transport allows.
    ///
    /// Ready once the session has been recycled. Errors never surface
    /// here; they mutate the session status and end in a recycle, with
    /// `session.errors` keeping score.
    pub fn poll_drive(&mut self, cx: &mut Context<'_>, session: &mut SessionData) -> Poll<()> {
        loop {
            if session.free {
                return Poll::Ready(());
            }

            let mut progress = false;

            if self.to_write.is_some() {
                if let Poll::Ready(res) = self.poll_write(cx) {
                    self.to_write = None;
                    self.handle_write(session, res);
                    progress = true;
                }
            }

            if session.free {
                return Poll::Ready(());
            }

            let read = match self.read_op {
                ReadOp::Idle => Poll::Pending,
                ReadOp::Line => self.poll_fill_line(cx, session),
                ReadOp::Content => self.poll_fill_content(cx, session),
            };
            if let Poll::Ready(res) = read {
                self.read_op = ReadOp::Idle;
                self.handle_read(session, res);
                progress = true;
            }

            if session.free {
                return Poll::Ready(());
            }

            if !progress {
                if self.to_write.is_none() && self.read_op == ReadOp::Idle {
                    // nothing in flight and nothing to wait for; the
                    // processor returned a status the flow cannot
                    // advance from.
                    warn!("session quiesced in {:?}, recycling", session.status);
                    self.recycle(session);
                    return Poll::Ready(());
                }
                return Poll::Pending;
            }
        }
    }

    /// Decide what to do after initial setup.
    ///
    /// This does what `start` does after the processor hook. It is also
    /// needed after processing an individual message.
    fn handle_start(&mut self, session: &mut SessionData) {
        if session.status == Status::Request || session.status == Status::Status {
            self.read_line();
        }
        self.send(session);
    }

    /// The parse driver, run on every completed read.
    fn handle_read(&mut self, session: &mut SessionData, res: io::Result<()>) {
        if session.status == Status::Shutdown {
            // late completion after a recycle.
            return;
        }
        if let Err(e) = res {
            debug!("read error: {}", e);
            session.errors += 1;
            session.status = Status::Error;
        }

        let was_request = session.status == Status::Request;
        let was_start = was_request || session.status == Status::Status;
        let mut version = Version::default();

        match session.status {
            Status::Request => {
                let line = session.buffer();
                let parsed = if line.len() >= self.limits.max_line_length {
                    debug!("request line over {} bytes", self.limits.max_line_length);
                    None
                } else {
                    RequestLine::parse(&String::from_utf8_lossy(&line))
                };

                if let Some(r) = &parsed {
                    trace!("request line: {} {} {}", r.method, r.resource, r.version);
                    version = r.version;
                }

                session.status = if parsed.is_some() {
                    Status::Header
                } else {
                    Status::Error
                };
                session.inbound_request = parsed;
            }

            Status::Status => {
                let line = session.buffer();
                let parsed = if line.len() >= self.limits.max_line_length {
                    debug!("status line over {} bytes", self.limits.max_line_length);
                    None
                } else {
                    StatusLine::parse(&String::from_utf8_lossy(&line))
                };

                if let Some(s) = &parsed {
                    trace!("status line: {} {}", s.code, s.reason);
                    version = s.version;
                }

                session.status = if parsed.is_some() {
                    Status::Header
                } else {
                    Status::Error
                };
                session.inbound_status = parsed;
            }

            Status::Header => {
                let line = session.buffer();
                if line.len() >= self.limits.max_line_length {
                    debug!("header line over {} bytes", self.limits.max_line_length);
                    session.status = Status::Error;
                } else {
                    session.inbound.absorb(&line);
                    if session.inbound.complete {
                        // done parsing headers, switch over to streaming
                        // in the body.
                        self.dispatch_headers(session);
                    }
                }
            }

            _ => {}
        }

        if was_start && session.status != Status::Error && version.major >= 2 {
            // reject anything with a major version over 1.x.
            session.status = Status::Error;
        }

        if was_start && session.status == Status::Header {
            // the first line is parsed; the header map starts fresh.
            session.inbound.reset();
        } else if was_request && session.status == Status::Error {
            // an edge from reading a request line into an error; tell
            // the other end. 505 if the framing itself is beyond us,
            // 400 for everything else.
            reject::reply(session, if version.major >= 2 { 505 } else { 400 });
            self.send(session);
            session.status = Status::Processing;
        }

        if session.status == Status::Header {
            self.read_line();
        } else if session.status == Status::Content {
            let chunk = session.buffer();
            session.content.extend_from_slice(&chunk);

            if session.remaining_bytes() == 0 {
                session.status = Status::Processing;

                // processing the message takes place here.
                self.processor.handle(session);

                session.status = self.processor.after_processing(session);
                self.handle_start(session);
            } else {
                self.read_remaining_content();
            }
        }

        if session.status == Status::Error {
            self.recycle(session);
        }
    }

    /// Completed inbound headers: consult the processor and set up the
    /// body phase.
    fn dispatch_headers(&mut self, session: &mut SessionData) {
        let server_role = session.inbound_request.is_some();

        if is_chunked(&session.inbound.headers) {
            // chunked framing is not decoded here.
            if server_role {
                reject::reply(session, 501);
                session.status = Status::Processing;
            } else {
                warn!("chunked reply cannot be framed, dropping connection");
                session.status = Status::Error;
            }
        } else {
            let mut next = self.processor.after_headers(session);
            if next == Status::Processing {
                // no body phase; the content dispatch completes the
                // message with a zero-length body.
                session.content_length = 0;
                next = Status::Content;
            }
            session.status = next;

            if session.status == Status::Content
                && session.content_length > self.limits.max_content_length
            {
                debug!(
                    "declared body of {} bytes over the cap",
                    session.content_length
                );
                reject::reply(session, 413);
                session.status = Status::Processing;
            }
        }

        // the processor may have queued an error or a preliminary reply.
        self.send(session);
        session.content.clear();
    }

    /// The write driver, run when the in-flight message has drained.
    fn handle_write(&mut self, session: &mut SessionData, res: io::Result<()>) {
        session.write_pending = false;

        match res {
            Ok(()) => {
                if session.status == Status::Processing {
                    session.status = self.processor.after_processing(session);
                }
                self.send(session);
            }
            Err(e) => {
                debug!("write error: {}", e);
                session.errors += 1;
                self.recycle(session);
            }
        }
    }

    /// Write the detached message out, then flush.
    fn poll_write(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let buf = self.to_write.as_mut().expect("poll_write without a message");
        let io = self.io.output_mut();

        while !buf.is_done() {
            let amount = ready!(Pin::new(&mut *io).poll_write(cx, buf.remaining()))?;

            if amount == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "Transport closed mid-message",
                ))
                .into();
            }

            trace!("wrote {} bytes", amount);
            buf.advance(amount);
        }

        ready!(Pin::new(&mut *io).poll_flush(cx))?;

        Ok(()).into()
    }

    /// Fill the input buffer until a full line is available.
    ///
    /// Completes early once the line length cap is hit; the parse layer
    /// rejects what is there.
    fn poll_fill_line(
        &mut self,
        cx: &mut Context<'_>,
        session: &mut SessionData,
    ) -> Poll<io::Result<()>> {
        loop {
            if session.input.contains_line() || session.input.len() >= self.limits.max_line_length
            {
                return Ok(()).into();
            }

            ready!(self.poll_read_some(cx, session))?;
        }
    }

    /// Fill the input buffer until the remaining body length is
    /// available.
    fn poll_fill_content(
        &mut self,
        cx: &mut Context<'_>,
        session: &mut SessionData,
    ) -> Poll<io::Result<()>> {
        loop {
            if session.input.len() >= session.remaining_bytes() {
                return Ok(()).into();
            }

            ready!(self.poll_read_some(cx, session))?;
        }
    }

    fn poll_read_some(
        &mut self,
        cx: &mut Context<'_>,
        session: &mut SessionData,
    ) -> Poll<io::Result<()>> {
        let mut chunk = [0_u8; READ_CHUNK_SIZE];

        let amount = ready!(Pin::new(self.io.input_mut()).poll_read(cx, &mut chunk))?;

        if amount == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Connection closed by peer",
            ))
            .into();
        }

        trace!("read {} bytes", amount);
        session.input.extend(&chunk[..amount]);

        Ok(()).into()
    }
}

impl<P, T> fmt::Debug for Flow<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Flow read_op: {:?}, write in flight: {}",
            self.read_op,
            self.to_write.is_some()
        )
    }
}

/// A session and its flow, driven as a future.
///
/// Resolves once the connection has been recycled. The session can be
/// taken back afterwards to be reused for a new connection.
pub struct Connection<P, T> {
    session: SessionData,
    flow: Flow<P, T>,
    started: bool,
}

impl<P, T> Connection<P, T>
where
    P: Processor,
    T: Transport,
{
    pub fn new(processor: P, io: Handles<T>) -> Self {
        Connection::with_limits(processor, io, Limits::default())
    }

    pub fn with_limits(processor: P, io: Handles<T>, limits: Limits) -> Self {
        Connection {
            session: SessionData::new(),
            flow: Flow::with_limits(processor, io, limits),
            started: false,
        }
    }

    /// Run an existing (typically recycled and re-armed) session over
    /// this connection.
    pub fn with_session(processor: P, io: Handles<T>, session: SessionData) -> Self {
        Connection {
            session,
            flow: Flow::new(processor, io),
            started: false,
        }
    }

    pub fn session(&self) -> &SessionData {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionData {
        &mut self.session
    }

    /// Take the session back, e.g. to reuse it after shutdown.
    pub fn into_session(self) -> SessionData {
        self.session
    }
}

impl<P, T> Future for Connection<P, T>
where
    P: Processor + Unpin,
    T: Transport,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();

        if !this.started {
            this.started = true;
            this.flow.start(&mut this.session);
        }

        this.flow.poll_drive(cx, &mut this.session)
    }
}

impl<P, T> fmt::Debug for Connection<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection {:?}", self.session.status)
    }
}
