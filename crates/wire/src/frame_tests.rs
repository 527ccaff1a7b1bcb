// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Framing tests: length prefix, MAC validation, size limits.

use super::*;

#[tokio::test]
async fn read_write_round_trips_without_secret() {
    let payload = b"hello cluster";
    let mut buffer = Vec::new();
    write_frame(&mut buffer, payload, None).await.unwrap();

    assert_eq!(buffer.len(), 4 + payload.len());
    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, payload.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read = read_frame(&mut cursor, None).await.unwrap();
    assert_eq!(read, payload);
}

#[tokio::test]
async fn read_write_round_trips_with_secret() {
    let payload = b"authenticated";
    let mut buffer = Vec::new();
    write_frame(&mut buffer, payload, Some("s3cret")).await.unwrap();

    // MAC rides between the prefix and the payload.
    assert_eq!(buffer.len(), 4 + MAC_LEN + payload.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read = read_frame(&mut cursor, Some("s3cret")).await.unwrap();
    assert_eq!(read, payload);
}

#[tokio::test]
async fn wrong_secret_is_rejected() {
    let mut buffer = Vec::new();
    write_frame(&mut buffer, b"payload", Some("right")).await.unwrap();

    let mut cursor = std::io::Cursor::new(buffer);
    let err = read_frame(&mut cursor, Some("wrong")).await.unwrap_err();
    assert_eq!(err, WireError::MacMismatch);
}

#[tokio::test]
async fn tampered_payload_is_rejected() {
    let mut buffer = Vec::new();
    write_frame(&mut buffer, b"payload", Some("secret")).await.unwrap();
    let last = buffer.len() - 1;
    buffer[last] ^= 0x01;

    let mut cursor = std::io::Cursor::new(buffer);
    let err = read_frame(&mut cursor, Some("secret")).await.unwrap_err();
    assert_eq!(err, WireError::MacMismatch);
}

#[tokio::test]
async fn oversized_frames_are_refused_before_allocation() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&(u32::MAX).to_be_bytes());
    let mut cursor = std::io::Cursor::new(buffer);
    let err = read_frame(&mut cursor, None).await.unwrap_err();
    assert!(matches!(err, WireError::FrameTooLarge { .. }));
}

#[tokio::test]
async fn truncated_stream_surfaces_io_error() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&8u32.to_be_bytes());
    buffer.extend_from_slice(b"abc");
    let mut cursor = std::io::Cursor::new(buffer);
    assert!(matches!(
        read_frame(&mut cursor, None).await,
        Err(WireError::Io { .. })
    ));
}

#[test]
fn decode_rejects_future_versions() {
    let payload =
        br#"{"v":2,"kind":"heartbeat","from":"a@h:1","body":{"process_count":0,"uptime_ms":0}}"#;
    assert_eq!(decode(payload).unwrap_err(), WireError::UnsupportedVersion { v: 2 });
}
