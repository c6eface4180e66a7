//! Wire protocol tests: framing behavior and arbitrary-value round-trips

use proptest::prelude::*;
use serde_json::{json, Value};

use fetchq::protocol::framing::{self, ProtocolError, MAX_FRAME_LEN};
use fetchq::protocol::{Request, Response};

#[tokio::test]
async fn test_typed_request_round_trip() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    let request = Request::submit_result(
        "worker-1",
        "task-9",
        Some(json!({"title": "Example", "links": 3, "images": 0})),
        None,
    );

    framing::write_message(&mut client, &request).await.unwrap();
    let decoded: Request = framing::read_message(&mut server).await.unwrap().unwrap();
    assert_eq!(decoded, request);
}

#[tokio::test]
async fn test_typed_response_round_trip() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    let response = Response::error("Task not found");
    framing::write_message(&mut client, &response).await.unwrap();

    let decoded: Response = framing::read_message(&mut server).await.unwrap().unwrap();
    assert_eq!(decoded, response);
}

#[tokio::test]
async fn test_request_per_frame_ordering() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    framing::write_message(&mut client, &Request::register("w"))
        .await
        .unwrap();
    framing::write_message(&mut client, &Request::heartbeat("w"))
        .await
        .unwrap();
    framing::write_message(&mut client, &Request::get_task("w"))
        .await
        .unwrap();

    let first: Request = framing::read_message(&mut server).await.unwrap().unwrap();
    let second: Request = framing::read_message(&mut server).await.unwrap().unwrap();
    let third: Request = framing::read_message(&mut server).await.unwrap().unwrap();

    assert_eq!(first, Request::register("w"));
    assert_eq!(second, Request::heartbeat("w"));
    assert_eq!(third, Request::get_task("w"));
}

#[tokio::test]
async fn test_partial_delivery_still_decodes() {
    // Feed the frame to the reader a few bytes at a time.
    let payload = serde_json::to_vec(&json!({"action": "register", "worker_id": "w1"})).unwrap();
    let mut wire = Vec::new();
    wire.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    wire.extend_from_slice(&payload);

    let (mut client, mut server) = tokio::io::duplex(4096);
    let writer = tokio::spawn(async move {
        for chunk in wire.chunks(3) {
            tokio::io::AsyncWriteExt::write_all(&mut client, chunk)
                .await
                .unwrap();
            tokio::io::AsyncWriteExt::flush(&mut client).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    });

    let decoded: Value = framing::read_message(&mut server).await.unwrap().unwrap();
    writer.await.unwrap();
    assert_eq!(decoded["action"], "register");
    assert_eq!(decoded["worker_id"], "w1");
}

#[tokio::test]
async fn test_broken_connection_mid_payload() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    tokio::io::AsyncWriteExt::write_all(&mut client, &100u32.to_be_bytes())
        .await
        .unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut client, b"only a little")
        .await
        .unwrap();
    drop(client);

    let err = framing::read_frame(&mut server).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionBroken));
}

#[tokio::test]
async fn test_hostile_length_prefix() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    tokio::io::AsyncWriteExt::write_all(&mut client, &u32::MAX.to_be_bytes())
        .await
        .unwrap();

    let err = framing::read_frame(&mut server).await.unwrap_err();
    match err {
        ProtocolError::FrameTooLarge(len) => assert!(len > MAX_FRAME_LEN),
        other => panic!("unexpected error: {other:?}"),
    }
}

// ============================================================================
// Property: encode-then-decode is identity for arbitrary nested values
// ============================================================================

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 _.:/-]{0,16}".prop_map(Value::String),
    ];

    leaf.prop_recursive(4, 32, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_round_trip_identity(value in arb_json()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let (mut client, mut server) = tokio::io::duplex(1 << 20);
            framing::write_message(&mut client, &value).await.unwrap();
            let decoded: Value = framing::read_message(&mut server).await.unwrap().unwrap();
            assert_eq!(decoded, value);
        });
    }
}
