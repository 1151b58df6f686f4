//! Tests for replication framing

use std::io::Cursor;

use tidekv::replication::message::{read_frame, write_frame, LEN_PREFIX_SIZE};
use tidekv::replication::{SegmentRequest, SegmentResponse};
use tidekv::TideError;

#[test]
fn test_frames_are_length_prefixed() {
    let mut wire = Vec::new();
    write_frame(&mut wire, &SegmentRequest { last_name: "wal-1.log".to_string() }).unwrap();

    let len = u32::from_le_bytes(wire[..LEN_PREFIX_SIZE].try_into().unwrap()) as usize;
    assert_eq!(wire.len(), LEN_PREFIX_SIZE + len);
}

#[test]
fn test_frames_read_back_in_sequence() {
    let first = SegmentResponse {
        name: "wal-1.log".to_string(),
        data: Some(vec![1, 2, 3]),
    };
    let second = SegmentResponse::unchanged("wal-1.log");

    let mut wire = Vec::new();
    write_frame(&mut wire, &first).unwrap();
    write_frame(&mut wire, &second).unwrap();

    let mut reader = Cursor::new(wire);
    assert_eq!(read_frame::<_, SegmentResponse>(&mut reader, 1024).unwrap(), first);
    assert_eq!(read_frame::<_, SegmentResponse>(&mut reader, 1024).unwrap(), second);
}

#[test]
fn test_empty_data_differs_from_no_data() {
    let empty = SegmentResponse {
        name: "wal-1.log".to_string(),
        data: Some(Vec::new()),
    };

    let mut wire = Vec::new();
    write_frame(&mut wire, &empty).unwrap();
    let decoded: SegmentResponse = read_frame(&mut Cursor::new(wire), 1024).unwrap();

    assert_eq!(decoded.data, Some(Vec::new()));
}

#[test]
fn test_oversized_frame_rejected() {
    let mut wire = Vec::new();
    write_frame(
        &mut wire,
        &SegmentResponse {
            name: "wal-1.log".to_string(),
            data: Some(vec![0; 4096]),
        },
    )
    .unwrap();

    let result: tidekv::Result<SegmentResponse> = read_frame(&mut Cursor::new(wire), 1024);
    assert!(matches!(result, Err(TideError::Protocol(_))));
}

#[test]
fn test_truncated_frame_is_io_error() {
    let mut wire = Vec::new();
    write_frame(&mut wire, &SegmentRequest { last_name: "wal-1.log".to_string() }).unwrap();
    wire.truncate(wire.len() - 2);

    let result: tidekv::Result<SegmentRequest> = read_frame(&mut Cursor::new(wire), 1024);
    assert!(matches!(result, Err(TideError::Io(_))));
}
