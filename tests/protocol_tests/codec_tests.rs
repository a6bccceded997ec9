//! Codec Tests
//!
//! Tests for command and response encoding/decoding.

use std::io::Cursor;

use kvlog::protocol::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, Command, Response, Status, HEADER_SIZE,
    MAX_PAYLOAD_SIZE,
};
use kvlog::KvError;

// =============================================================================
// Command Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_put_wire_layout() {
    let cmd = Command::Put {
        key: "k".to_string(),
        value: "vv".to_string(),
    };

    let encoded = encode_command(&cmd);

    assert_eq!(
        encoded,
        vec![0x02, 0, 0, 0, 7, 0, 0, 0, 1, b'k', b'v', b'v']
    );
}

#[test]
fn test_decode_commands() {
    let commands = vec![
        Command::Get { key: "hello".to_string() },
        Command::Put { key: "mykey".to_string(), value: "my\tvalue".to_string() },
        Command::Put { key: "empty".to_string(), value: String::new() },
        Command::Delete { key: "todelete".to_string() },
        Command::Ping,
    ];

    for cmd in commands {
        assert_eq!(decode_command(&encode_command(&cmd)).unwrap(), cmd);
    }
}

#[test]
fn test_decode_unknown_command() {
    let bytes = [0x7f, 0, 0, 0, 0];
    assert!(matches!(decode_command(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_decode_incomplete_header() {
    let bytes = [0x01, 0, 0];
    assert!(matches!(decode_command(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_decode_incomplete_payload() {
    let mut bytes = encode_command(&Command::Get { key: "abcdef".to_string() });
    bytes.truncate(bytes.len() - 2);
    assert!(matches!(decode_command(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_decode_key_length_overruns_payload() {
    // GET with key_len 10 but only 2 key bytes
    let bytes = [0x01, 0, 0, 0, 6, 0, 0, 0, 10, b'a', b'b'];
    assert!(matches!(decode_command(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_decode_ping_with_payload() {
    let bytes = [0x04, 0, 0, 0, 1, 0];
    assert!(matches!(decode_command(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_decode_non_utf8_key() {
    let bytes = [0x01, 0, 0, 0, 6, 0, 0, 0, 2, 0xff, 0xfe];
    assert!(matches!(decode_command(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_decode_oversized_payload() {
    let len = (MAX_PAYLOAD_SIZE + 1).to_be_bytes();
    let bytes = [0x01, len[0], len[1], len[2], len[3]];
    assert!(matches!(decode_command(&bytes), Err(KvError::Protocol(_))));
}

// =============================================================================
// Response Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_decode_responses() {
    let responses = vec![
        Response::ok(Some("value".to_string())),
        Response::ok(None),
        Response::not_found(),
        Response::error("boom"),
        Response::unavailable("transaction log has halted"),
    ];

    for response in responses {
        assert_eq!(decode_response(&encode_response(&response)).unwrap(), response);
    }
}

#[test]
fn test_empty_response_is_header_only() {
    assert_eq!(encode_response(&Response::not_found()).len(), HEADER_SIZE);
}

#[test]
fn test_decode_unknown_status() {
    let bytes = [0x09, 0, 0, 0, 0];
    assert!(matches!(decode_response(&bytes), Err(KvError::Protocol(_))));
}

#[test]
fn test_unavailable_status_code() {
    let encoded = encode_response(&Response::unavailable("halted"));
    assert_eq!(encoded[0], 0x03);
    assert_eq!(Status::try_from(0x03), Ok(Status::Unavailable));
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_commands_back_to_back() {
    let mut buffer = Vec::new();
    write_command(&mut buffer, &Command::Put { key: "a".to_string(), value: "1".to_string() }).unwrap();
    write_command(&mut buffer, &Command::Ping).unwrap();
    write_command(&mut buffer, &Command::Delete { key: "a".to_string() }).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert!(matches!(read_command(&mut cursor).unwrap(), Command::Put { .. }));
    assert_eq!(read_command(&mut cursor).unwrap(), Command::Ping);
    assert_eq!(read_command(&mut cursor).unwrap(), Command::Delete { key: "a".to_string() });

    // Clean end of stream surfaces as an EOF I/O error
    match read_command(&mut cursor) {
        Err(KvError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("expected EOF, got {:?}", other),
    }
}

#[test]
fn test_stream_response() {
    let mut buffer = Vec::new();
    write_response(&mut buffer, &Response::ok(Some("v".to_string()))).unwrap();

    let response = read_response(&mut Cursor::new(buffer)).unwrap();

    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.payload.as_deref(), Some("v"));
}
