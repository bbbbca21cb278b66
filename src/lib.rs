//! Session flow control for asynchronous HTTP/1.1 connections.
//!
//! This crate contains the per-connection core of an HTTP/1.1 endpoint: a
//! [`SessionData`] object holding all mutable connection state, and a
//! [`Flow`] state machine that drives the read, parse, dispatch and write
//! cycle over any [`Transport`]. Requests (or, in the client role, status
//! replies) are handed to a user-supplied [`Processor`], which queues
//! outbound messages back onto the session.
//!
//! The crate is executor-agnostic. [`Flow::poll_drive`] makes as much
//! progress as the transport allows on each poll; [`Connection`] wraps a
//! session and a flow into an actual `Future` for the common case.
//!
//! Message framing is `Content-Length` only. Chunked transfer encoding is
//! answered with `501 Not Implemented`, and any HTTP version with a major
//! number of 2 or more with `505 HTTP Version Not Supported`.

#[macro_use]
extern crate log;

mod buf;
mod grammar;
mod negotiate;

pub mod error;
pub mod flow;
pub mod headers;
pub mod limit;
pub mod processor;
pub mod reject;
pub mod session;
pub mod transport;

pub(crate) use futures_io::{AsyncRead, AsyncWrite};

pub use buf::InputBuffer;
pub use error::Error;
pub use flow::{Connection, Flow};
pub use grammar::{RequestLine, StatusLine, Version};
pub use headers::{HeaderParser, Headers};
pub use limit::Limits;
pub use processor::Processor;
pub use session::{SessionData, Status};
pub use transport::{Descriptor, Handles, Socket, Transport};
