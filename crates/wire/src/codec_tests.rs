// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::message::{JsonRpcNotification, JsonRpcRequest};
use tokio::io::BufReader;

#[tokio::test]
async fn round_trip_over_a_buffer() {
    let msg: JsonRpcMessage =
        JsonRpcRequest::new(1, "tools/list", None).into();

    let mut buf = Vec::new();
    write_message(&mut buf, &msg).await.unwrap();
    assert!(buf.ends_with(b"\n"));

    let mut reader = BufReader::new(buf.as_slice());
    let back = read_message(&mut reader).await.unwrap().unwrap();
    assert_eq!(back, msg);
    assert!(read_message(&mut reader).await.unwrap().is_none());
}

#[tokio::test]
async fn blank_lines_are_skipped() {
    let msg: JsonRpcMessage =
        JsonRpcNotification::new("notifications/initialized", None).into();
    let mut buf = b"\n\n".to_vec();
    write_message(&mut buf, &msg).await.unwrap();

    let mut reader = BufReader::new(buf.as_slice());
    let back = read_message(&mut reader).await.unwrap().unwrap();
    assert_eq!(back, msg);
}

#[tokio::test]
async fn eof_returns_none() {
    let mut reader = BufReader::new(&b""[..]);
    assert!(read_message(&mut reader).await.unwrap().is_none());
}

#[tokio::test]
async fn garbage_is_a_decode_error() {
    let mut reader = BufReader::new(&b"not json\n"[..]);
    assert!(matches!(
        read_message(&mut reader).await,
        Err(ProtocolError::Decode(_))
    ));
}

#[test]
fn encode_decode_agree() {
    let msg: JsonRpcMessage = JsonRpcRequest::new("r1", "ping", None).into();
    let line = encode(&msg).unwrap();
    assert!(!line.contains('\n'));
    assert_eq!(decode(&line).unwrap(), msg);
}
