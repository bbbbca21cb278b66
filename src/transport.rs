//! Transport abstraction the flow drives.
//!
//! The flow needs plain async reads and writes plus a synchronous
//! teardown path: a best-effort full shutdown where the handle supports
//! one, then a close. Socket-like handles support shutdown; stream
//! descriptors (stdio pairs and the like) only close.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::task::noop_waker;

use crate::{AsyncRead, AsyncWrite};

/// An async byte stream the flow can also tear down.
pub trait Transport: AsyncRead + AsyncWrite + Unpin {
    /// Whether the handle supports a transport-level shutdown.
    fn supports_shutdown(&self) -> bool;

    /// Initiate a full shutdown of both directions.
    fn shutdown_both(&mut self) -> io::Result<()>;

    /// Close the handle, releasing the descriptor. Idempotent.
    fn close(&mut self) -> io::Result<()>;
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "Transport is closed")
}

/// Socket-like transport: shutdown is meaningful.
///
/// Wraps any async stream. Teardown initiates the stream's close
/// protocol with a single poll (a synchronous teardown gets no more) and
/// releases the handle by dropping it.
#[derive(Debug)]
pub struct Socket<S> {
    inner: Option<S>,
}

impl<S> Socket<S> {
    pub fn new(inner: S) -> Self {
        Socket { inner: Some(inner) }
    }
}

/// Descriptor-like transport: no shutdown, close only.
#[derive(Debug)]
pub struct Descriptor<S> {
    inner: Option<S>,
}

impl<S> Descriptor<S> {
    pub fn new(inner: S) -> Self {
        Descriptor { inner: Some(inner) }
    }
}

macro_rules! delegate_stream {
    ($type:ident) => {
        impl<S> AsyncRead for $type<S>
        where
            S: AsyncRead + AsyncWrite + Unpin,
        {
            fn poll_read(
                self: Pin<&mut Self>,
                cx: &mut Context<'_>,
                buf: &mut [u8],
            ) -> Poll<io::Result<usize>> {
                match self.get_mut().inner.as_mut() {
                    Some(s) => Pin::new(s).poll_read(cx, buf),
                    None => Err(closed()).into(),
                }
            }
        }

        impl<S> AsyncWrite for $type<S>
        where
            S: AsyncRead + AsyncWrite + Unpin,
        {
            fn poll_write(
                self: Pin<&mut Self>,
                cx: &mut Context<'_>,
                buf: &[u8],
            ) -> Poll<io::Result<usize>> {
                match self.get_mut().inner.as_mut() {
                    Some(s) => Pin::new(s).poll_write(cx, buf),
                    None => Err(closed()).into(),
                }
            }

            fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
                match self.get_mut().inner.as_mut() {
                    Some(s) => Pin::new(s).poll_flush(cx),
                    None => Err(closed()).into(),
                }
            }

            fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
                match self.get_mut().inner.as_mut() {
                    Some(s) => Pin::new(s).poll_close(cx),
                    None => Ok(()).into(),
                }
            }
        }
    };
}

delegate_stream!(Socket);
delegate_stream!(Descriptor);

impl<S> Transport for Socket<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn supports_shutdown(&self) -> bool {
        true
    }

    fn shutdown_both(&mut self) -> io::Result<()> {
        let s = match self.inner.as_mut() {
            Some(s) => s,
            None => return Ok(()),
        };

        // one poll is all a synchronous teardown gets; whatever is left
        // of the close protocol finishes when the handle drops.
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        match Pin::new(s).poll_close(&mut cx) {
            Poll::Ready(r) => r,
            Poll::Pending => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.inner = None;
        Ok(())
    }
}

impl<S> Transport for Descriptor<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn supports_shutdown(&self) -> bool {
        false
    }

    fn shutdown_both(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.inner = None;
        Ok(())
    }
}

/// The transport handles of one connection.
///
/// Whether input and output are the same underlying handle is decided
/// here, at construction, so teardown never closes a descriptor twice.
#[derive(Debug)]
pub enum Handles<T> {
    /// One handle serving both directions (TCP, UNIX sockets).
    Shared(T),
    /// Distinct input and output handles (stdio pairs).
    Split {
        /// Read from, never written to.
        input: T,
        /// Written to, never read from.
        output: T,
    },
}

impl<T: Transport> Handles<T> {
    /// Whether input and output alias the same handle.
    pub fn same_handle(&self) -> bool {
        match self {
            Handles::Shared(_) => true,
            Handles::Split { .. } => false,
        }
    }

    pub(crate) fn input_mut(&mut self) -> &mut T {
        match self {
            Handles::Shared(t) => t,
            Handles::Split { input, .. } => input,
        }
    }

    pub(crate) fn output_mut(&mut self) -> &mut T {
        match self {
            Handles::Shared(t) => t,
            Handles::Split { output, .. } => output,
        }
    }

    /// Shut down and close every distinct handle exactly once.
    ///
    /// Returns whether any teardown step failed.
    pub(crate) fn teardown(&mut self) -> bool {
        fn one<T: Transport>(t: &mut T) -> bool {
            let mut failed = false;
            if t.supports_shutdown() {
                failed |= t.shutdown_both().is_err();
            }
            failed |= t.close().is_err();
            failed
        }

        match self {
            Handles::Shared(t) => one(t),
            Handles::Split { input, output } => {
                // two real handles, each torn down on its own.
                let a = one(input);
                let b = one(output);
                a || b
            }
        }
    }
}
