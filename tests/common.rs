//! Shared test harness: a scripted in-memory transport, a deterministic
//! poll driver and closure-driven processors.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Once;
use std::task::{Context, Poll};

use futures_io::{AsyncRead, AsyncWrite};
use futures_util::task::noop_waker;

use h1_flow::{Flow, Headers, Processor, SessionData, Status, Transport};

pub fn setup_logger() {
    static START: Once = Once::new();
    START.call_once(|| {
        let test_log = std::env::var("TEST_LOG")
            .map(|x| x != "0" && x.to_lowercase() != "false")
            .unwrap_or(false);
        let level = if test_log {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Info
        };
        pretty_env_logger::formatted_builder()
            .filter_level(log::LevelFilter::Warn)
            .filter_module("h1_flow", level)
            .target(env_logger::Target::Stdout)
            .init();
    });
}

#[derive(Default)]
pub struct PipeState {
    reads: VecDeque<Vec<u8>>,
    eof: bool,
    written: Vec<u8>,
    read_error: Option<io::ErrorKind>,
    write_error: Option<io::ErrorKind>,
    /// Cap on bytes accepted per poll_write; 0 means unlimited.
    max_write: usize,
    shutdowns: usize,
    closes: usize,
}

/// A scripted transport endpoint.
///
/// Clones share state, so a test keeps one handle for scripting and
/// inspection while the flow owns another. Reads yield the pushed chunks
/// one at a time and are Pending once the script runs dry; writes land
/// in `written`.
#[derive(Clone, Default)]
pub struct Pipe(Rc<RefCell<PipeState>>);

impl Pipe {
    pub fn new() -> Self {
        Pipe::default()
    }

    /// Queue a chunk for the reader.
    pub fn push(&self, bytes: &[u8]) {
        self.0.borrow_mut().reads.push_back(bytes.to_vec());
    }

    /// After the scripted chunks, reads report a closed peer.
    pub fn set_eof(&self) {
        self.0.borrow_mut().eof = true;
    }

    pub fn set_read_error(&self, kind: io::ErrorKind) {
        self.0.borrow_mut().read_error = Some(kind);
    }

    pub fn set_write_error(&self, kind: io::ErrorKind) {
        self.0.borrow_mut().write_error = Some(kind);
    }

    /// Force partial writes of at most `max` bytes each.
    pub fn set_max_write(&self, max: usize) {
        self.0.borrow_mut().max_write = max;
    }

    pub fn written(&self) -> Vec<u8> {
        self.0.borrow().written.clone()
    }

    pub fn written_str(&self) -> String {
        String::from_utf8(self.written()).unwrap()
    }

    pub fn shutdowns(&self) -> usize {
        self.0.borrow().shutdowns
    }

    pub fn closes(&self) -> usize {
        self.0.borrow().closes
    }
}

impl AsyncRead for Pipe {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.0.borrow_mut();

        if let Some(kind) = state.read_error.take() {
            return Err(io::Error::new(kind, "scripted read error")).into();
        }

        match state.reads.pop_front() {
            Some(mut chunk) => {
                let max = buf.len().min(chunk.len());
                buf[..max].copy_from_slice(&chunk[..max]);
                if max < chunk.len() {
                    let rest = chunk.split_off(max);
                    state.reads.push_front(rest);
                }
                Ok(max).into()
            }
            None if state.eof => Ok(0).into(),
            None => Poll::Pending,
        }
    }
}

impl AsyncWrite for Pipe {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.0.borrow_mut();

        if let Some(kind) = state.write_error.take() {
            return Err(io::Error::new(kind, "scripted write error")).into();
        }

        let max = if state.max_write == 0 {
            buf.len()
        } else {
            buf.len().min(state.max_write)
        };
        state.written.extend_from_slice(&buf[..max]);

        Ok(max).into()
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Ok(()).into()
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Ok(()).into()
    }
}

impl Transport for Pipe {
    fn supports_shutdown(&self) -> bool {
        true
    }

    fn shutdown_both(&mut self) -> io::Result<()> {
        self.0.borrow_mut().shutdowns += 1;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.0.borrow_mut().closes += 1;
        Ok(())
    }
}

/// Poll the flow with a no-op waker until it makes no more progress.
///
/// Returns whether the connection finished (the session was recycled).
pub fn drive<P: Processor, T: Transport>(flow: &mut Flow<P, T>, session: &mut SessionData) -> bool {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);

    flow.poll_drive(&mut cx, session).is_ready()
}

/// Server processor delegating completed messages to a closure.
pub struct TestServer<F> {
    on_handle: F,
}

impl<F> Processor for TestServer<F>
where
    F: FnMut(&mut SessionData),
{
    fn after_headers(&mut self, session: &mut SessionData) -> Status {
        session.is_head = session
            .inbound_request
            .as_ref()
            .map(|r| r.method == "HEAD")
            .unwrap_or(false);

        session.expect_content()
    }

    fn handle(&mut self, session: &mut SessionData) {
        (self.on_handle)(session)
    }

    fn after_processing(&mut self, _session: &mut SessionData) -> Status {
        Status::Request
    }
}

pub fn server<F: FnMut(&mut SessionData)>(on_handle: F) -> TestServer<F> {
    TestServer { on_handle }
}

/// Client processor that sends scripted requests and records what comes
/// back.
#[derive(Default)]
pub struct TestClient {
    requests: VecDeque<(String, String, Vec<u8>)>,
    responses: Rc<RefCell<Vec<(u16, Vec<u8>)>>>,
}

impl TestClient {
    pub fn new(requests: &[(&str, &str, &[u8])]) -> Self {
        TestClient {
            requests: requests
                .iter()
                .map(|(m, r, b)| (m.to_string(), r.to_string(), b.to_vec()))
                .collect(),
            responses: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Shared view on the recorded responses; stays valid after the
    /// processor has moved into a flow.
    pub fn responses(&self) -> Rc<RefCell<Vec<(u16, Vec<u8>)>>> {
        self.responses.clone()
    }

    fn send_next(&mut self, session: &mut SessionData) -> bool {
        match self.requests.pop_front() {
            Some((method, resource, body)) => {
                session
                    .request(&method, &resource, &Headers::new(), &body)
                    .unwrap();
                true
            }
            None => false,
        }
    }
}

impl Processor for TestClient {
    fn start(&mut self, session: &mut SessionData) {
        session.status = Status::Status;
        self.send_next(session);
    }

    fn after_headers(&mut self, session: &mut SessionData) -> Status {
        session.expect_content()
    }

    fn handle(&mut self, session: &mut SessionData) {
        let code = session
            .inbound_status
            .as_ref()
            .map(|s| s.code)
            .unwrap_or(0);

        self.responses
            .borrow_mut()
            .push((code, session.content.clone()));
    }

    fn after_processing(&mut self, session: &mut SessionData) -> Status {
        if self.send_next(session) {
            Status::Status
        } else {
            Status::Shutdown
        }
    }
}
