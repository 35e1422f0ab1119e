//! CoLa2 session lifecycle against scripted and loopback devices.

mod common;

use common::{answer, device_frame, session_accept, split_frames};
use drishti_io::protocol::{Cola2Header, CommandBuilder, CommandType, SessionHandler};
use drishti_io::transport::{MockTransport, TcpTransport};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

const SESSION_ID: u32 = 0xABCD_0001;

#[test]
fn test_full_session_lifecycle() {
    let link = MockTransport::new();
    link.inject_read(&session_accept(SESSION_ID));
    link.inject_read(&answer(SESSION_ID, 2, b"RA DeviceIdent \x00\x05Vis-S"));
    link.inject_read(&answer(SESSION_ID, 3, b"CA"));

    let mut handler = SessionHandler::new(link.clone());
    assert!(handler.open_session(50));
    assert_eq!(handler.session_id(), SESSION_ID);

    let response = handler
        .send(&CommandBuilder::read_variable("DeviceIdent").build())
        .unwrap();
    assert_eq!(response.command_type(), CommandType::ReadAnswer);
    assert_eq!(response.name(), Some("DeviceIdent"));
    assert_eq!(response.parameters(), b"\x00\x05Vis-S");

    handler.close_session();
    assert!(!handler.session().is_open());
    assert_eq!(handler.session_id(), 0);
    drop(handler);

    let frames = split_frames(&link.get_written());
    assert_eq!(frames.len(), 3, "closed session must not be closed again on drop");

    let open = Cola2Header::decode(&frames[0]).unwrap();
    assert_eq!((open.session_id, open.request_id), (0, 1));
    assert_eq!(&frames[0][16..], b"Ox\x32\x00\x02Ex");

    let read = Cola2Header::decode(&frames[1]).unwrap();
    assert_eq!((read.session_id, read.request_id), (SESSION_ID, 2));
    assert_eq!(&frames[1][16..], b"RN DeviceIdent");

    let close = Cola2Header::decode(&frames[2]).unwrap();
    assert_eq!((close.session_id, close.request_id), (SESSION_ID, 3));
    assert_eq!(&frames[2][16..], b"Cx");
}

#[test]
fn test_rejected_open_leaves_no_session() {
    let link = MockTransport::new();
    link.inject_read(&device_frame(b"O"));

    let mut handler = SessionHandler::new(link);
    assert!(!handler.open_session(50));
    assert_eq!(handler.session_id(), 0);
    assert!(!handler.session().is_open());
}

#[test]
fn test_device_fault_is_not_a_link_error() {
    let link = MockTransport::new();
    link.inject_read(&session_accept(SESSION_ID));
    link.inject_read(&answer(SESSION_ID, 2, b"FA\x00\x07"));

    let mut handler = SessionHandler::new(link);
    assert!(handler.open_session(10));

    let response = handler
        .send(&CommandBuilder::method("SetAccessMode").parameter_u8(3).build())
        .unwrap();
    assert_eq!(response.command_type(), CommandType::Error);
    assert_eq!(response.error_code(), Some(7));
}

#[test]
fn test_silent_device_is_a_link_error() {
    let link = MockTransport::new();
    link.inject_read(&session_accept(SESSION_ID));

    let mut handler = SessionHandler::new(link);
    assert!(handler.open_session(10));

    let err = handler
        .send(&CommandBuilder::read_variable("DeviceIdent").build())
        .unwrap_err();
    assert!(err.is_network());
}

fn read_request(stream: &mut TcpStream) -> Vec<u8> {
    let mut prefix = [0u8; 8];
    stream.read_exact(&mut prefix).unwrap();
    let length = u32::from_be_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]) as usize;
    let mut rest = vec![0u8; length];
    stream.read_exact(&mut rest).unwrap();
    [prefix.to_vec(), rest].concat()
}

#[test]
fn test_session_over_tcp_loopback() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let device = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let mut requests = Vec::new();
        requests.push(read_request(&mut stream));
        stream.write_all(&session_accept(0x1234)).unwrap();

        requests.push(read_request(&mut stream));
        stream
            .write_all(&answer(0x1234, 2, b"AN SetAccessMode \x01"))
            .unwrap();

        requests.push(read_request(&mut stream));
        stream.write_all(&answer(0x1234, 3, b"CA")).unwrap();
        requests
    });

    let transport = TcpTransport::connect(&address, Duration::from_secs(2)).unwrap();
    let mut handler = SessionHandler::new(transport).with_client_id("Drishti");
    assert!(handler.open_session(5));
    assert_eq!(handler.session_id(), 0x1234);

    let response = handler
        .send(
            &CommandBuilder::method("SetAccessMode")
                .parameter_u8(3)
                .parameter_u32(0x1234_5678)
                .build(),
        )
        .unwrap();
    assert_eq!(response.command_type(), CommandType::MethodAnswer);
    assert_eq!(response.parameters(), b"\x01");

    handler.close_session();

    let requests = device.join().unwrap();
    assert_eq!(&requests[0][16..], b"Ox\x05\x00\x07Drishti");
    assert_eq!(
        &requests[1][16..],
        b"MN SetAccessMode \x03\x12\x34\x56\x78"
    );
    assert_eq!(&requests[2][16..], b"Cx");
}
