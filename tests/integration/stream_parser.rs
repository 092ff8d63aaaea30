//! Token-stream decoding over real chunk sequences

use super::test_utils::{abc_catalog, split_every, sse_payload, Reply, ScriptedGateway};
use bytes::Bytes;
use copychain::error::ApiError;
use copychain::pipeline::StepOrchestrator;
use copychain::sse::{decode_stream, delta_stream, ByteStream, SseDecoder, StreamEvent};
use futures::{stream, StreamExt, TryStreamExt};

fn byte_stream(chunks: Vec<Vec<u8>>) -> ByteStream {
    stream::iter(chunks.into_iter().map(|c| Ok::<_, ApiError>(Bytes::from(c)))).boxed()
}

async fn deltas(chunks: Vec<Vec<u8>>) -> Vec<String> {
    delta_stream(byte_stream(chunks)).try_collect().await.unwrap()
}

#[tokio::test]
async fn byte_at_a_time_matches_single_chunk() {
    let payload = format!(
        ": keep-alive\n\n{}",
        sse_payload(&["Grüße ", "aus ", "Köln", " 🚲"])
    );
    let all_at_once = deltas(split_every(&payload, payload.len())).await;
    let byte_by_byte = deltas(split_every(&payload, 1)).await;
    assert_eq!(all_at_once, vec!["Grüße ", "aus ", "Köln", " 🚲"]);
    assert_eq!(byte_by_byte, all_at_once);
}

#[tokio::test]
async fn split_record_is_recovered() {
    let chunks = vec![
        b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel".to_vec(),
        b"\n".to_vec(),
        b"lo\"}}]}\n\n".to_vec(),
        b"data: [DONE]\n\n".to_vec(),
    ];
    assert_eq!(deltas(chunks).await, vec!["Hello"]);
}

#[tokio::test]
async fn uncompletable_record_is_dropped_and_stream_continues() {
    let payload = format!(
        "data: {{invalid json\n\ndata: also broken\n\n{}",
        sse_payload(&["still here"])
    );
    let mut decoder = SseDecoder::new();
    let mut events = decoder.feed(payload.as_bytes());
    events.extend(decoder.finish());
    assert_eq!(events, vec![StreamEvent::Delta("still here".to_string())]);
    assert!(decoder.dropped_records() >= 1);
}

#[tokio::test]
async fn records_after_done_are_ignored() {
    let payload = format!("{}{}", sse_payload(&["kept"]), super::test_utils::delta_record("late"));
    assert_eq!(deltas(split_every(&payload, 7)).await, vec!["kept"]);
}

#[tokio::test]
async fn residual_line_is_drained_at_end_of_body() {
    let chunks = vec![b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}".to_vec()];
    assert_eq!(deltas(chunks).await, vec!["tail"]);
}

#[tokio::test]
async fn transport_error_ends_the_sequence() {
    let body: ByteStream = stream::iter(vec![
        Ok(Bytes::from(super::test_utils::delta_record("before"))),
        Err(ApiError::Transport("connection reset".to_string())),
        Ok(Bytes::from(super::test_utils::delta_record("after"))),
    ])
    .boxed();
    let items: Vec<_> = decode_stream(body).collect().await;
    assert_eq!(items.len(), 2);
    assert!(matches!(items[0], Ok(StreamEvent::Delta(ref t)) if t == "before"));
    assert!(matches!(items[1], Err(ApiError::Transport(_))));
}

#[tokio::test]
async fn orchestrator_completes_despite_malformed_line() {
    let payload = format!(
        "data: {{invalid json\n\n{}",
        sse_payload(&["Bold ", "claims"])
    );
    let gateway = ScriptedGateway::new();
    gateway.push("a", Reply::Body(split_every(&payload, 3)));
    let orch = StepOrchestrator::new(abc_catalog(), gateway);
    orch.set_product_input("Desk lamp");

    let outcome = orch.generate_step(0, None).await;
    assert!(outcome.is_completed());
    assert_eq!(orch.result("a").as_deref(), Some("Bold claims"));
}
