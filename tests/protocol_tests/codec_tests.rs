//! Codec Tests
//!
//! Tests for query decoding and response encoding/decoding.

use std::io::Cursor;

use tidekv::protocol::{
    decode_command, decode_response, encode_command, encode_response, read_response,
    write_command, write_response, Command, CommandType, Response, Status,
};
use tidekv::wal::Entry;
use tidekv::TideError;

fn protocol_message(result: tidekv::Result<Command>) -> String {
    match result {
        Err(TideError::Protocol(message)) => message,
        other => panic!("expected protocol error, got {:?}", other),
    }
}

// =============================================================================
// Command Decoding Tests
// =============================================================================

#[test]
fn test_decode_get() {
    assert_eq!(
        decode_command("GET hello\n").unwrap(),
        Command::Get { key: "hello".to_string() }
    );
}

#[test]
fn test_decode_set() {
    assert_eq!(
        decode_command("SET mykey myvalue").unwrap(),
        Command::Set {
            key: "mykey".to_string(),
            value: "myvalue".to_string(),
        }
    );
}

#[test]
fn test_decode_del_with_crlf() {
    assert_eq!(
        decode_command("DEL gone\r\n").unwrap(),
        Command::Del { key: "gone".to_string() }
    );
}

#[test]
fn test_decode_unknown_command() {
    assert_eq!(protocol_message(decode_command("PUT a b")), "invalid command");
    assert_eq!(protocol_message(decode_command("get a")), "invalid command");
    assert_eq!(protocol_message(decode_command("")), "invalid command");
}

#[test]
fn test_decode_wrong_arity() {
    assert_eq!(protocol_message(decode_command("SET onlykey")), "invalid arguments");
    assert_eq!(protocol_message(decode_command("GET")), "invalid arguments");
    assert_eq!(protocol_message(decode_command("DEL a b")), "invalid arguments");
}

#[test]
fn test_encoded_command_decodes_back() {
    let command = Command::Set {
        key: "k".to_string(),
        value: "v".to_string(),
    };
    assert_eq!(encode_command(&command), "SET k v\n");
    assert_eq!(decode_command(&encode_command(&command)).unwrap(), command);
}

#[test]
fn test_command_metadata() {
    assert_eq!(CommandType::from_keyword("SET"), Some(CommandType::Set));
    assert_eq!(CommandType::Set.arity(), 2);
    assert_eq!(CommandType::Get.arity(), 1);
    assert_eq!(CommandType::Del.keyword(), "DEL");
}

#[test]
fn test_command_to_entry() {
    let set = Command::Set {
        key: "k".to_string(),
        value: "v".to_string(),
    };
    assert_eq!(set.to_entry(), Some(Entry::set("k", "v")));
    assert_eq!(Command::Del { key: "k".to_string() }.to_entry(), Some(Entry::del("k")));
    assert_eq!(Command::Get { key: "k".to_string() }.to_entry(), None);
}

// =============================================================================
// Response Tests
// =============================================================================

#[test]
fn test_encode_responses() {
    assert_eq!(encode_response(&Response::ok(None)), "[ok]\n");
    assert_eq!(encode_response(&Response::ok(Some("v".to_string()))), "[ok] v\n");
    assert_eq!(encode_response(&Response::not_found()), "[error] not found\n");
    assert_eq!(
        encode_response(&Response::error("invalid command")),
        "[error] invalid command\n"
    );
}

#[test]
fn test_decode_responses() {
    assert_eq!(decode_response("[ok]\n").unwrap(), Response::ok(None));
    assert_eq!(
        decode_response("[ok] value\n").unwrap(),
        Response::ok(Some("value".to_string()))
    );
    assert_eq!(decode_response("[error] not found").unwrap().status, Status::NotFound);

    let error = decode_response("[error] invalid arguments\n").unwrap();
    assert_eq!(error.status, Status::Error);
    assert_eq!(error.payload.as_deref(), Some("invalid arguments"));
}

#[test]
fn test_response_from_outcome() {
    assert_eq!(Response::from_outcome(Ok(None)), Response::ok(None));
    assert_eq!(
        Response::from_outcome(Ok(Some("v".to_string()))),
        Response::ok(Some("v".to_string()))
    );
    assert_eq!(Response::from_outcome(Err(TideError::KeyNotFound)), Response::not_found());
    assert_eq!(
        Response::from_outcome(Err(TideError::Protocol("invalid command".to_string()))),
        Response::error("invalid command")
    );

    let replica = Response::from_outcome(Err(TideError::ReadOnlyReplica));
    assert_eq!(replica.status, Status::Error);
    assert!(replica.payload.unwrap().contains("read-only"));
}

#[test]
fn test_decode_malformed_response() {
    assert!(decode_response("hello").is_err());
}

// =============================================================================
// Stream Tests
// =============================================================================

#[test]
fn test_stream_helpers() {
    let mut wire = Vec::new();
    write_command(&mut wire, &Command::Get { key: "k".to_string() }).unwrap();
    assert_eq!(wire, b"GET k\n");

    let mut wire = Vec::new();
    write_response(&mut wire, &Response::ok(Some("1".to_string()))).unwrap();
    write_response(&mut wire, &Response::not_found()).unwrap();

    let mut reader = Cursor::new(wire);
    assert_eq!(read_response(&mut reader).unwrap(), Response::ok(Some("1".to_string())));
    assert_eq!(read_response(&mut reader).unwrap(), Response::not_found());
    assert!(matches!(read_response(&mut reader), Err(TideError::Io(_))));
}
