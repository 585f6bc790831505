//! Protocol Module Tests
//!
//! ## Test Scopes
//! - **Codec**: Round trips, size enforcement, truncation detection.
//! - **Streams**: Exact reads over async duplex pipes and blocking cursors.
//! - **Envelope**: Tagged `Message` validation and wire shape.

#[cfg(test)]
mod tests {
    use crate::protocol::codec::{HEADER_SIZE, MAX_MESSAGE_SIZE, decode, decode_message, encode};
    use crate::protocol::error::ProtocolError;
    use crate::protocol::stream::{
        read_message, read_message_blocking, read_value, write_message, write_message_blocking,
    };
    use crate::protocol::types::{Message, TaskData, TaskKind, TaskRequest};
    use serde_json::{Value, json};
    use std::io::Cursor;
    use tokio::io::AsyncWriteExt;

    fn images_data(urls: &[&str]) -> TaskData {
        let mut data = TaskData::new();
        data.insert("image_urls".to_string(), json!(urls));
        data.insert("max_images".to_string(), json!(5));
        data
    }

    // ============================================================
    // CODEC: round trips
    // ============================================================

    #[test]
    fn test_round_trip_plain_envelope() {
        let envelope = json!({
            "type": "performance_request",
            "url": "http://example.com",
            "data": {"timeout": 10}
        });

        let frame = encode(&envelope).unwrap();
        let decoded: Value = decode(&frame).unwrap();

        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_round_trip_non_ascii_and_control_bytes() {
        let envelope = json!({
            "type": "success_response",
            "success": true,
            "result": {
                "title": "Señor Ñandú — 東京 🚀",
                "raw": "line\nbreak\u{0000}nul\ttab \"quoted\" \\ slash"
            }
        });

        let frame = encode(&envelope).unwrap();
        let decoded: Value = decode(&frame).unwrap();

        assert_eq!(decoded, envelope);
        // UTF-8 goes out as-is, not escaped
        let payload = std::str::from_utf8(&frame[HEADER_SIZE..]).unwrap();
        assert!(payload.contains("東京"));
    }

    #[test]
    fn test_header_is_big_endian_payload_length() {
        let frame = encode(&json!({"type": "ping"})).unwrap();
        let payload_len = frame.len() - HEADER_SIZE;

        assert_eq!(&frame[..HEADER_SIZE], &(payload_len as u32).to_be_bytes());
        assert_eq!(&frame[HEADER_SIZE..], br#"{"type":"ping"}"#);
    }

    #[test]
    fn test_round_trip_near_size_limit() {
        // {"blob":"<filler>"} is 11 bytes of JSON around the filler
        let filler = "x".repeat(MAX_MESSAGE_SIZE - 11);
        let envelope = json!({"blob": filler});

        let frame = encode(&envelope).unwrap();
        assert_eq!(frame.len(), HEADER_SIZE + MAX_MESSAGE_SIZE);

        let decoded: Value = decode(&frame).unwrap();
        assert_eq!(decoded, envelope);
    }

    // ============================================================
    // CODEC: size enforcement
    // ============================================================

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let filler = "x".repeat(MAX_MESSAGE_SIZE);
        let result = encode(&json!({"blob": filler}));

        match result {
            Err(ProtocolError::MessageTooLarge { size, max }) => {
                assert!(size > MAX_MESSAGE_SIZE);
                assert_eq!(max, MAX_MESSAGE_SIZE);
            }
            other => panic!("expected MessageTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_oversized_header_without_payload() {
        // Header only: the payload is never looked at
        let declared = (MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes();

        let result: Result<Value, _> = decode(&declared);

        assert!(matches!(
            result,
            Err(ProtocolError::MessageTooLarge { size, .. }) if size == MAX_MESSAGE_SIZE + 1
        ));
    }

    // ============================================================
    // CODEC: truncation and garbage
    // ============================================================

    #[test]
    fn test_decode_detects_truncated_frame() {
        let frame = encode(&json!({"type": "ping"})).unwrap();
        let truncated = &frame[..frame.len() - 3];

        let result: Result<Value, _> = decode(truncated);

        match result {
            Err(ProtocolError::IncompleteMessage { expected, received }) => {
                assert_eq!(expected, frame.len());
                assert_eq!(received, truncated.len());
            }
            other => panic!("expected IncompleteMessage, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_requires_full_header() {
        let result: Result<Value, _> = decode(&[0u8, 0]);

        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { expected: 4, received: 2 })
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        let mut frame = 5u32.to_be_bytes().to_vec();
        frame.extend_from_slice(b"{nope");

        let result: Result<Value, _> = decode(&frame);

        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let mut frame = 2u32.to_be_bytes().to_vec();
        frame.extend_from_slice(&[0xff, 0xfe]);

        let result: Result<Value, _> = decode(&frame);

        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    // ============================================================
    // ENVELOPE: tagged message validation
    // ============================================================

    #[test]
    fn test_request_wire_shape() {
        let message = Message::task_request(
            TaskKind::Images,
            "http://example.com",
            images_data(&["http://example.com/a.png"]),
        );

        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "images_request",
                "url": "http://example.com",
                "data": {"image_urls": ["http://example.com/a.png"], "max_images": 5}
            })
        );
    }

    #[test]
    fn test_response_wire_shapes_are_exclusive() {
        let ok = serde_json::to_value(Message::success(json!({"a": 1}))).unwrap();
        let err = serde_json::to_value(Message::failure("boom")).unwrap();

        assert_eq!(ok, json!({"type": "success_response", "success": true, "result": {"a": 1}}));
        assert_eq!(err, json!({"type": "error_response", "success": false, "error": "boom"}));
        assert!(ok.get("error").is_none());
        assert!(err.get("result").is_none());
    }

    #[test]
    fn test_success_flag_must_match_response_type() {
        let result = Message::from_value(json!({"type": "success_response", "success": false, "result": 1}));
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));

        let result = Message::from_value(json!({"type": "error_response", "success": true, "error": "x"}));
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));

        let result = Message::from_value(json!({"type": "error_response", "error": "x"}));
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_success_response_requires_result() {
        let result = Message::from_value(json!({"type": "success_response", "success": true}));
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));

        // An explicit null is still a result
        let parsed =
            Message::from_value(json!({"type": "success_response", "success": true, "result": null}))
                .unwrap();
        assert_eq!(parsed, Message::success(Value::Null));
    }

    #[test]
    fn test_ping_has_no_url() {
        let value = serde_json::to_value(Message::Ping).unwrap();
        assert_eq!(value, json!({"type": "ping"}));

        let parsed = Message::from_value(value).unwrap();
        assert_eq!(parsed, Message::Ping);
    }

    #[test]
    fn test_unknown_type_rejected_before_field_checks() {
        let result = Message::from_value(json!({"type": "unknown_kind", "url": 42}));

        match result {
            Err(ProtocolError::UnknownMessageType(kind)) => assert_eq!(kind, "unknown_kind"),
            other => panic!("expected UnknownMessageType, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_type_rejected() {
        assert!(matches!(
            Message::from_value(json!({"url": "http://example.com"})),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            Message::from_value(json!(["ping"])),
            Err(ProtocolError::MissingType)
        ));
    }

    #[test]
    fn test_request_without_url_is_malformed() {
        let result = Message::from_value(json!({"type": "screenshot_request", "data": {}}));

        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_request_data_defaults_to_empty() {
        let message =
            Message::from_value(json!({"type": "performance_request", "url": "http://a.test"}))
                .unwrap();

        let request = message.into_task_request().unwrap();
        assert_eq!(request.kind, TaskKind::Performance);
        assert_eq!(request.url, "http://a.test");
        assert!(request.data.is_empty());
    }

    #[test]
    fn test_into_task_request_round_trip() {
        let request = TaskRequest::new(TaskKind::Screenshot, "http://a.test", TaskData::new());
        let message: Message = request.clone().into();

        assert_eq!(message.type_name(), "screenshot_request");
        assert_eq!(message.into_task_request().unwrap(), request);
        assert_eq!(Message::Ping.into_task_request(), Err(Message::Ping));
    }

    #[test]
    fn test_decode_message_validates_envelope() {
        let frame = encode(&json!({"type": "shutdown"})).unwrap();
        assert_eq!(decode_message(&frame).unwrap(), Message::Shutdown);

        let frame = encode(&json!({"type": "bogus"})).unwrap();
        assert!(matches!(
            decode_message(&frame),
            Err(ProtocolError::UnknownMessageType(_))
        ));
    }

    #[test]
    fn test_task_kind_names() {
        for kind in TaskKind::ALL {
            assert_eq!(kind.request_type(), format!("{}_request", kind.as_str()));
        }
        assert_eq!(TaskKind::Images.to_string(), "images");
    }

    // ============================================================
    // STREAMS: async
    // ============================================================

    #[tokio::test]
    async fn test_async_write_then_read() {
        let (mut client, mut server) = tokio::io::duplex(64);

        let message = Message::task_request(TaskKind::Performance, "http://a.test", TaskData::new());
        let expected = message.clone();

        // Frame is larger than the pipe buffer, so write and read must interleave
        let writer = tokio::spawn(async move {
            write_message(&mut client, &message).await.unwrap();
            client
        });

        let received = read_message(&mut server).await.unwrap();
        writer.await.unwrap();

        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_async_read_reports_hangup_mid_payload() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let frame = encode(&json!({"type": "ping"})).unwrap();
        client.write_all(&frame[..HEADER_SIZE + 3]).await.unwrap();
        drop(client);

        let result = read_value(&mut server).await;

        match result {
            Err(ProtocolError::ConnectionClosed { expected, received }) => {
                assert_eq!(expected, frame.len() - HEADER_SIZE);
                assert_eq!(received, 3);
            }
            other => panic!("expected ConnectionClosed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_async_read_rejects_oversized_header() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        client
            .write_all(&(MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes())
            .await
            .unwrap();

        let result = read_value(&mut server).await;

        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_async_read_on_empty_stream() {
        let (client, mut server) = tokio::io::duplex(16);
        drop(client);

        let result = read_value(&mut server).await;

        assert!(matches!(
            result,
            Err(ProtocolError::ConnectionClosed { expected: 4, received: 0 })
        ));
    }

    // ============================================================
    // STREAMS: blocking
    // ============================================================

    #[test]
    fn test_blocking_write_then_read() {
        let mut buffer = Vec::new();
        write_message_blocking(&mut buffer, &Message::failure("bad")).unwrap();
        write_message_blocking(&mut buffer, &Message::Ping).unwrap();

        let mut cursor = Cursor::new(buffer);

        assert_eq!(read_message_blocking(&mut cursor).unwrap(), Message::failure("bad"));
        assert_eq!(read_message_blocking(&mut cursor).unwrap(), Message::Ping);
        assert!(matches!(
            read_message_blocking(&mut cursor),
            Err(ProtocolError::ConnectionClosed { received: 0, .. })
        ));
    }
}
