//! The pluggable message processor.

use crate::session::{SessionData, Status};

/// Hooks through which a [`crate::Flow`] hands a session to user code.
///
/// Implementations provide the server behavior (routing, answering) or
/// the client behavior (issuing requests, consuming replies). Hooks only
/// ever mutate the session; the flow observes the resulting state when
/// each hook returns.
pub trait Processor {
    /// Called once when the connection starts.
    ///
    /// A server implementation may seed `outbound` headers here. A client
    /// implementation queues its first request and moves the session to
    /// [`Status::Status`] so the flow awaits the reply line.
    fn start(&mut self, _session: &mut SessionData) {}

    /// Called when the inbound headers are fully parsed.
    ///
    /// Returns the status to continue with: [`Status::Content`] when a
    /// body is expected, [`Status::Processing`] when not (see
    /// [`SessionData::expect_content`]), or [`Status::Error`] to refuse
    /// the message. A refusing implementation may queue its own reply,
    /// but the connection is recycled right after, so delivery is best
    /// effort.
    ///
    /// Server implementations are expected to set `is_head` here, so the
    /// reply generator can suppress the body.
    ///
    /// May queue a preliminary reply, such as a `100 Continue`.
    fn after_headers(&mut self, session: &mut SessionData) -> Status;

    /// Called when a complete inbound message is available.
    ///
    /// A server implementation must queue at least one reply via
    /// [`SessionData::reply`]. A client implementation consumes the
    /// response found in `inbound_status`, `inbound` and `content`.
    fn handle(&mut self, session: &mut SessionData);

    /// Called after [`Processor::handle`] and after each completed write
    /// while the session is in [`Status::Processing`].
    ///
    /// Returns [`Status::Request`] or [`Status::Status`] to keep the
    /// connection going, or [`Status::Shutdown`] to close it once the
    /// outbound queue has drained.
    fn after_processing(&mut self, session: &mut SessionData) -> Status;

    /// Called from [`crate::Flow::recycle`]. Release anything held for
    /// this session.
    fn recycle(&mut self, _session: &mut SessionData) {}
}
