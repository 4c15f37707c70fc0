// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn message_frame_round_trips() {
    let frame = Frame::message(1000, 5, Message::CommandGreet { timestamp: 42 });
    let mut buf = Vec::new();
    write_frame(&mut buf, &frame).await.unwrap();

    let mut cursor = std::io::Cursor::new(buf);
    let decoded = read_frame(&mut cursor).await.unwrap().unwrap();
    assert_eq!(decoded, frame);
}

#[tokio::test]
async fn replay_request_has_no_json_payload() {
    let frame = Frame::replay_request(1000, 12);
    let mut buf = Vec::new();
    write_frame(&mut buf, &frame).await.unwrap();

    // the length prefix counts only the JSON payload, so it reads 0
    assert_eq!(&buf[..4], &0u32.to_be_bytes());
    // length prefix (4, value 0) + 8-byte header, nothing else
    assert_eq!(buf.len(), 4 + HEADER_LEN);

    let mut cursor = std::io::Cursor::new(buf);
    let decoded = read_frame(&mut cursor).await.unwrap().unwrap();
    assert_eq!(decoded, Frame::ReplayRequest { session_ts: 1000, seq_num: 12 });
}

#[tokio::test]
async fn clean_eof_at_frame_boundary_yields_none() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    let decoded = read_frame(&mut cursor).await.unwrap();
    assert!(decoded.is_none());
}

#[tokio::test]
async fn truncated_header_is_an_error() {
    let mut buf = Vec::new();
    buf.extend_from_slice(&0u32.to_be_bytes()); // no payload, but only 4 of the 8 header bytes follow
    buf.extend_from_slice(&[0u8; 4]);
    let mut cursor = std::io::Cursor::new(buf);
    assert!(matches!(read_frame(&mut cursor).await, Err(ProtocolError::Truncated)));
}

#[tokio::test]
async fn truncated_payload_is_an_error() {
    let mut buf = Vec::new();
    buf.extend_from_slice(&10u32.to_be_bytes()); // claims a 10-byte payload
    buf.extend_from_slice(&[0u8; HEADER_LEN]);
    buf.extend_from_slice(&[0u8; 3]); // but only 3 bytes follow
    let mut cursor = std::io::Cursor::new(buf);
    assert!(matches!(read_frame(&mut cursor).await, Err(ProtocolError::Truncated)));
}
