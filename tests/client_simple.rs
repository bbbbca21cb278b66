use h1_flow::{Flow, Handles, Headers, SessionData, Status};

mod common;
use common::{drive, server, Pipe, TestClient};

#[test]
fn request_200_ok() {
    common::setup_logger();

    let pipe = Pipe::new();
    pipe.push(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");

    let client = TestClient::new(&[("GET", "/path", b"")]);
    let responses = client.responses();

    let mut session = SessionData::new();
    let mut flow = Flow::new(client, Handles::Shared(pipe.clone()));

    flow.start(&mut session);
    let finished = drive(&mut flow, &mut session);

    assert_eq!(
        pipe.written_str(),
        format!(
            "GET /path HTTP/1.1\r\nUser-Agent: h1-flow/{}\r\n\r\n",
            env!("CARGO_PKG_VERSION")
        )
    );
    assert_eq!(*responses.borrow(), vec![(200, b"ok".to_vec())]);

    // a client with nothing left to send shuts the connection down.
    assert!(finished);
    assert!(session.free);
    assert_eq!(session.status, Status::Shutdown);
    assert_eq!(session.requests, 1);
    assert_eq!(session.replies, 0);
    assert_eq!(session.errors, 0);
    assert_eq!(pipe.closes(), 1);
}

#[test]
fn request_body_declares_length() {
    common::setup_logger();

    let pipe = Pipe::new();
    pipe.push(b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n");

    let client = TestClient::new(&[("POST", "/x", b"hello")]);
    let responses = client.responses();

    let mut session = SessionData::new();
    let mut flow = Flow::new(client, Handles::Shared(pipe.clone()));

    flow.start(&mut session);
    drive(&mut flow, &mut session);

    let written = pipe.written_str();
    assert!(written.starts_with("POST /x HTTP/1.1\r\nContent-Length: 5\r\n"));
    assert!(written.ends_with("\r\n\r\nhello"));
    assert_eq!(*responses.borrow(), vec![(201, Vec::new())]);
}

#[test]
fn sequential_requests_on_one_connection() {
    common::setup_logger();

    let pipe = Pipe::new();
    pipe.push(b"HTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\na");
    pipe.push(b"HTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\nb");

    let client = TestClient::new(&[("GET", "/1", b""), ("GET", "/2", b"")]);
    let responses = client.responses();

    let mut session = SessionData::new();
    let mut flow = Flow::new(client, Handles::Shared(pipe.clone()));

    flow.start(&mut session);
    let finished = drive(&mut flow, &mut session);

    let written = pipe.written_str();
    assert!(written.contains("GET /1 HTTP/1.1\r\n"));
    assert!(written.contains("GET /2 HTTP/1.1\r\n"));
    assert!(written.find("/1").unwrap() < written.find("/2").unwrap());

    assert_eq!(
        *responses.borrow(),
        vec![(200, b"a".to_vec()), (200, b"b".to_vec())]
    );
    assert!(finished);
    assert_eq!(session.requests, 2);
    assert_eq!(session.queries(), 2);
}

#[test]
fn malformed_status_line_recycles() {
    common::setup_logger();

    let pipe = Pipe::new();
    pipe.push(b"NOT HTTP\r\n");

    let client = TestClient::new(&[("GET", "/", b"")]);
    let responses = client.responses();

    let mut session = SessionData::new();
    let mut flow = Flow::new(client, Handles::Shared(pipe.clone()));

    flow.start(&mut session);
    let finished = drive(&mut flow, &mut session);

    // a client does not reply to garbage, it just hangs up.
    assert!(finished);
    assert!(session.free);
    assert_eq!(session.replies, 0);
    assert!(responses.borrow().is_empty());
    assert!(session.inbound_status.is_none());
}

/// The round-trip law: a request serialized by one session parses back
/// into the same method, target and body on the server side.
#[test]
fn serialized_request_parses_back() {
    common::setup_logger();

    let mut sender = SessionData::new();
    let extra = Headers::from(&[("X-Trace", "7")][..]);
    sender.request("POST", "/echo", &extra, b"payload").unwrap();
    let wire = sender.outbound_queue.pop_front().unwrap();

    let pipe = Pipe::new();
    pipe.push(&wire);

    let mut session = SessionData::new();
    let mut flow = Flow::new(
        server(|s: &mut SessionData| {
            let req = s.inbound_request.as_ref().unwrap();
            assert_eq!(req.method, "POST");
            assert_eq!(req.resource, "/echo");
            assert_eq!(s.inbound.headers.get("x-trace"), Some("7"));
            assert_eq!(s.content, b"payload");
            s.reply(200, b"", &Headers::new());
        }),
        Handles::Shared(pipe.clone()),
    );

    flow.start(&mut session);
    drive(&mut flow, &mut session);

    assert_eq!(session.replies, 1);
}
