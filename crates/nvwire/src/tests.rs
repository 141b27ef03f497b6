use crate::*;

// ============================================================================
//  HELPERS
// ============================================================================

fn encode_rmpv(v: &rmpv::Value) -> Vec<u8> {
    let mut out = Vec::new();
    rmpv::encode::write_value(&mut out, v).unwrap();
    out
}

fn decode_rmpv(bytes: &[u8]) -> Value {
    let mut rd = bytes;
    Value::from(rmpv::decode::read_value(&mut rd).unwrap())
}

// ============================================================================
//  VALUE BRIDGE
// ============================================================================

#[test]
fn test_handle_extensions_become_handles() {
    let bytes = encode_rmpv(&rmpv::Value::Array(vec![
        rmpv::Value::Ext(0, vec![0x03]),
        rmpv::Value::Ext(1, vec![0xcd, 0x03, 0xe8]),
        rmpv::Value::Ext(2, vec![0xd2, 0, 0, 0, 1]),
    ]));

    let value = decode_rmpv(&bytes);
    assert_eq!(
        value,
        Value::Array(vec![
            Value::Handle(RemoteHandle::new(HandleKind::Buffer, 3)),
            Value::Handle(RemoteHandle::new(HandleKind::Window, 1000)),
            Value::Handle(RemoteHandle::new(HandleKind::Tabpage, 1)),
        ])
    );

    let (b, w): (Buffer, Window) = match value {
        Value::Array(mut items) => {
            items.truncate(2);
            Value::Array(items).into_typed().unwrap()
        }
        _ => unreachable!(),
    };
    assert_eq!(b, Buffer(3));
    assert_eq!(w, Window(1000));
}

#[test]
fn test_malformed_handle_fails_only_on_typed_access() {
    let bytes = encode_rmpv(&rmpv::Value::Ext(0, vec![0xc0]));
    let value = decode_rmpv(&bytes);
    assert_eq!(value, Value::Ext(0, vec![0xc0]));

    let err = Buffer::from_value(value).unwrap_err();
    assert_eq!(err, Error::MalformedExtension(vec![0xc0]));
}

#[test]
fn test_foreign_extension_is_kept() {
    let value = decode_rmpv(&encode_rmpv(&rmpv::Value::Ext(42, vec![1, 2, 3])));
    assert_eq!(value, Value::Ext(42, vec![1, 2, 3]));
    assert!(RemoteHandle::from_value(value).is_err());
}

#[test]
fn test_handle_value_of_other_kind_is_mismatch() {
    let value = Value::from(Tabpage(4));
    let err = Window::from_value(value).unwrap_err();
    assert_eq!(
        err,
        Error::TypeMismatch { expected: "Window".into(), found: "Tabpage".into() }
    );
}

#[test]
fn test_handles_encode_as_int32_ext() {
    let bytes = encode_rmpv(&rmpv::Value::from(Value::from(Buffer(3))));
    // fixext4 would be 0xd6; five bytes of payload uses ext8
    assert_eq!(bytes, vec![0xc7, 0x05, 0x00, 0xd2, 0x00, 0x00, 0x00, 0x03]);
}

#[test]
fn test_integer_widths() {
    assert_eq!(Value::from(u64::MAX), Value::UInt(u64::MAX));
    assert_eq!(Value::from(7u64), Value::Int(7));
    assert_eq!(i8::from_value(Value::Int(-5)).unwrap(), -5);
    assert!(u8::from_value(Value::Int(-1)).is_err());
    assert!(i32::from_value(Value::UInt(u64::MAX)).is_err());
    assert_eq!(u64::from_value(Value::UInt(u64::MAX)).unwrap(), u64::MAX);

    let big = decode_rmpv(&encode_rmpv(&rmpv::Value::from(u64::MAX)));
    assert_eq!(big, Value::UInt(u64::MAX));
}

#[test]
fn test_invalid_utf8_string_is_binary() {
    // str8 of two bytes that are not utf-8
    let value = decode_rmpv(&[0xd9, 0x02, 0xff, 0xfe]);
    assert_eq!(value, Value::Binary(vec![0xff, 0xfe]));
    assert!(String::from_value(value).is_err());
}

#[test]
fn test_typed_conversions() {
    let v = Value::from(vec!["a", "b"]);
    assert_eq!(Vec::<String>::from_value(v).unwrap(), vec!["a".to_string(), "b".to_string()]);

    assert_eq!(Option::<i64>::from_value(Value::Nil).unwrap(), None);
    assert_eq!(Option::<i64>::from_value(Value::Int(3)).unwrap(), Some(3));
    assert_eq!(f64::from_value(Value::Int(2)).unwrap(), 2.0);
    assert!(bool::from_value(Value::Int(1)).is_err());

    let (a, b): (i64, String) = Value::from((1i64, "x")).into_typed().unwrap();
    assert_eq!((a, b), (1, "x".to_string()));
    assert!(<(i64, i64)>::from_value(Value::from(vec![1i64, 2, 3])).is_err());

    let map = Value::map([("k", 1i64)]);
    assert_eq!(map.get("k"), Some(&Value::Int(1)));
    let m: std::collections::HashMap<String, i64> = map.into_typed().unwrap();
    assert_eq!(m["k"], 1);
}

#[test]
fn test_value_display() {
    let v = Value::Array(vec![
        Value::Nil,
        Value::from("s"),
        Value::from(Buffer(3)),
        Value::map([("a", true)]),
    ]);
    assert_eq!(v.to_string(), r#"[nil, "s", Buffer:3, {"a": true}]"#);
}

// ============================================================================
//  MESSAGES
// ============================================================================

#[test]
fn test_request_wire_shape() {
    let msg = Message::Request {
        msgid: 7,
        method: "nvim_get_current_buf".into(),
        params: vec![],
    };
    let bytes = msg.encode().unwrap();
    let expected = encode_rmpv(&rmpv::Value::Array(vec![
        rmpv::Value::from(0),
        rmpv::Value::from(7),
        rmpv::Value::from("nvim_get_current_buf"),
        rmpv::Value::Array(vec![]),
    ]));
    assert_eq!(bytes, expected);
    assert_eq!(Message::decode(&bytes).unwrap(), msg);
}

#[test]
fn test_response_with_handle_result() {
    let msg = Message::Response {
        msgid: 1,
        error: Value::Nil,
        result: Value::from(Window(1000)),
    };
    let decoded = Message::decode(&msg.encode().unwrap()).unwrap();
    match decoded {
        Message::Response { msgid, error, result } => {
            assert_eq!(msgid, 1);
            assert!(error.is_nil());
            assert_eq!(Window::from_value(result).unwrap(), Window(1000));
        }
        other => panic!("expected response, got {:?}", other),
    }
}

#[test]
fn test_notification_wire_shape() {
    let msg = Message::Notification {
        method: "redraw".into(),
        params: vec![Value::from(1i64)],
    };
    let decoded = Message::decode(&msg.encode().unwrap()).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn test_protocol_violations() {
    let cases = [
        rmpv::Value::from(1),
        rmpv::Value::Array(vec![rmpv::Value::from(9), rmpv::Value::from(1)]),
        rmpv::Value::Array(vec![rmpv::Value::from(0), rmpv::Value::from(1), rmpv::Value::from("m")]),
        rmpv::Value::Array(vec![
            rmpv::Value::from(0),
            rmpv::Value::from(-1),
            rmpv::Value::from("m"),
            rmpv::Value::Array(vec![]),
        ]),
        rmpv::Value::Array(vec![
            rmpv::Value::from(2),
            rmpv::Value::from("m"),
            rmpv::Value::from(3),
        ]),
    ];
    for case in &cases {
        match Message::decode(&encode_rmpv(case)) {
            Err(Error::ProtocolViolation(_)) => {}
            other => panic!("expected protocol violation for {}, got {:?}", case, other),
        }
    }
}

#[test]
fn test_decode_rejects_trailing_bytes() {
    let mut bytes = Message::Notification { method: "x".into(), params: vec![] }
        .encode()
        .unwrap();
    bytes.push(0xc0);
    assert!(matches!(Message::decode(&bytes), Err(Error::ProtocolViolation(_))));
}

#[test]
fn test_frame_len_on_partial_buffers() {
    let a = Message::Request { msgid: 1, method: "a".into(), params: vec![Value::from("xyz")] }
        .encode()
        .unwrap();
    let b = Message::Notification { method: "b".into(), params: vec![] }.encode().unwrap();

    let mut stream = a.clone();
    stream.extend_from_slice(&b);

    assert_eq!(frame_len(&[]).unwrap(), None);
    for cut in 1..a.len() {
        assert_eq!(frame_len(&stream[..cut]).unwrap(), None, "cut at {}", cut);
    }
    assert_eq!(frame_len(&stream).unwrap(), Some(a.len()));
    assert_eq!(frame_len(&stream[a.len()..]).unwrap(), Some(b.len()));
}


// ============================================================================
//  FRAME SCANNER
// ============================================================================

/// One value using every family of marker, including the 16-bit container forms.
fn assorted() -> rmpv::Value {
    let long_array = rmpv::Value::Array((0..20).map(rmpv::Value::from).collect());
    let long_map = rmpv::Value::Map(
        (0..20)
            .map(|i| (rmpv::Value::from(format!("k{}", i)), rmpv::Value::Nil))
            .collect(),
    );
    rmpv::Value::Array(vec![
        rmpv::Value::Nil,
        rmpv::Value::from(true),
        rmpv::Value::from(-3),
        rmpv::Value::from(200),
        rmpv::Value::from(70_000),
        rmpv::Value::from(u64::MAX),
        rmpv::Value::from(i64::MIN),
        rmpv::Value::F32(1.5),
        rmpv::Value::F64(2.5),
        rmpv::Value::from("short"),
        rmpv::Value::from("x".repeat(40)),
        rmpv::Value::from("y".repeat(300)),
        rmpv::Value::Binary(vec![7; 10]),
        rmpv::Value::Ext(0, vec![0x03]),
        rmpv::Value::Ext(1, vec![0xd2, 0, 0, 0, 1]),
        rmpv::Value::Ext(9, vec![1; 16]),
        rmpv::Value::Array(vec![]),
        rmpv::Value::Map(vec![]),
        rmpv::Value::Array(vec![rmpv::Value::Array(vec![rmpv::Value::from(1)])]),
        long_array,
        long_map,
    ])
}

#[test]
fn test_frame_len_covers_every_marker() {
    let bytes = encode_rmpv(&assorted());
    assert_eq!(frame_len(&bytes).unwrap(), Some(bytes.len()));
    for cut in 0..bytes.len() {
        assert_eq!(frame_len(&bytes[..cut]).unwrap(), None, "cut at {}", cut);
    }
}

#[test]
fn test_scanner_resumes_byte_by_byte() {
    let first = encode_rmpv(&assorted());
    let second = Message::Notification { method: "n".into(), params: vec![] }.encode().unwrap();
    let mut stream = first.clone();
    stream.extend_from_slice(&second);

    let mut scanner = FrameScanner::new();
    let mut found = None;
    for end in 0..=stream.len() {
        if let Some(n) = scanner.scan(&stream[..end]).unwrap() {
            found = Some((end, n));
            break;
        }
    }
    assert_eq!(found, Some((first.len(), first.len())));

    // starts over on the remainder
    assert_eq!(scanner.scan(&stream[first.len()..]).unwrap(), Some(second.len()));
}

#[test]
fn test_scanner_rejects_reserved_marker() {
    assert!(matches!(frame_len(&[0x92, 0x01, 0xc1]), Err(Error::Decode(_))));
}

#[test]
fn test_scanner_limits_nesting() {
    let mut deep = vec![0x91; frame::MAX_DEPTH + 1];
    deep.push(0x00);
    assert!(matches!(frame_len(&deep), Err(Error::Decode(_))));

    let mut ok = vec![0x91; frame::MAX_DEPTH];
    ok.push(0x00);
    assert_eq!(frame_len(&ok).unwrap(), Some(ok.len()));
}
