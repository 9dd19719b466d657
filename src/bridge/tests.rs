use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use super::Bridge;
use super::protocol::{Assets, CompileRequest, WorkerReply, WorkerRequest};
use crate::error::CompileError;
use crate::testing::MockFactory;
use crate::worker::WorkerConfig;

/// Bridge wired to channels the test drives by hand.
fn manual_bridge() -> (
    Bridge,
    Receiver<WorkerRequest>,
    mpsc::UnboundedSender<WorkerReply>,
) {
    let (request_tx, request_rx) = crossbeam::channel::unbounded();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    (Bridge::connect(request_tx, reply_rx), request_rx, reply_tx)
}

fn next_compile(rx: &Receiver<WorkerRequest>) -> CompileRequest {
    match rx.recv_timeout(Duration::from_secs(1)).unwrap() {
        WorkerRequest::Compile(request) => request,
        other => panic!("expected compile request, got {other:?}"),
    }
}

#[tokio::test]
async fn test_out_of_order_replies_match_by_id() {
    let (bridge, requests, replies) = manual_bridge();

    let first = bridge.invoke("first".into(), Assets::new());
    let second = bridge.invoke("second".into(), Assets::new());

    let req_a = next_compile(&requests);
    let req_b = next_compile(&requests);
    assert_eq!(req_a.primary_source, "first");
    assert_eq!(req_b.primary_source, "second");
    assert_ne!(req_a.correlation_id, req_b.correlation_id);
    assert_eq!(bridge.pending_len(), 2);

    // Answer the second request first.
    replies
        .send(WorkerReply::success(req_b.correlation_id, b"B".to_vec(), vec![]))
        .unwrap();
    replies
        .send(WorkerReply::success(req_a.correlation_id, b"A".to_vec(), vec![]))
        .unwrap();

    let (a, b) = tokio::join!(first, second);
    assert_eq!(a.unwrap().artifact.as_deref(), Some(&b"A"[..]));
    assert_eq!(b.unwrap().artifact.as_deref(), Some(&b"B"[..]));
    assert_eq!(bridge.pending_len(), 0);
}

#[tokio::test]
async fn test_unmatched_reply_is_dropped() {
    let (bridge, requests, replies) = manual_bridge();

    let call = bridge.invoke("doc".into(), Assets::new());
    let request = next_compile(&requests);

    replies
        .send(WorkerReply::success(request.correlation_id + 100, vec![9], vec![]))
        .unwrap();
    replies
        .send(WorkerReply::failure(request.correlation_id, "boom", vec!["boom".into()]))
        .unwrap();

    let reply = call.await.unwrap();
    assert!(!reply.ok);
    assert_eq!(reply.message.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_duplicate_reply_resolves_once() {
    let (bridge, requests, replies) = manual_bridge();

    let call = bridge.invoke("doc".into(), Assets::new());
    let id = next_compile(&requests).correlation_id;

    replies.send(WorkerReply::success(id, vec![1], vec![])).unwrap();
    replies.send(WorkerReply::success(id, vec![2], vec![])).unwrap();

    assert_eq!(call.await.unwrap().artifact, Some(vec![1]));
    assert_eq!(bridge.pending_len(), 0);
}

#[tokio::test]
async fn test_dispose_rejects_pending() {
    let (bridge, requests, _replies) = manual_bridge();

    let first = bridge.invoke("a".into(), Assets::new());
    let second = bridge.invoke("b".into(), Assets::new());
    let _ = next_compile(&requests);

    bridge.dispose();
    assert!(bridge.is_disposed());
    assert_eq!(first.await, Err(CompileError::ClientDisposed));
    assert_eq!(second.await, Err(CompileError::ClientDisposed));

    let late = bridge.invoke("c".into(), Assets::new());
    assert_eq!(late.await, Err(CompileError::ClientDisposed));
}

#[tokio::test]
async fn test_worker_hangup_fails_pending() {
    let (bridge, requests, replies) = manual_bridge();

    let call = bridge.invoke("a".into(), Assets::new());
    let _ = next_compile(&requests);
    drop(replies);

    assert_eq!(call.await, Err(CompileError::WorkerGone));
}

#[tokio::test]
async fn test_spawned_worker_round_trip() {
    let factory = MockFactory::default();
    let constructions = factory.constructions();
    let bridge = Bridge::spawn(Arc::new(factory), WorkerConfig::default()).unwrap();

    let ok = bridge.invoke("= Hello\n\nThis is a test.".into(), Assets::new());
    let bad = bridge.invoke("*never closed".into(), Assets::new());

    let (ok, bad) = tokio::join!(ok, bad);
    let ok = ok.unwrap();
    assert!(ok.ok);
    assert!(!ok.artifact.unwrap().is_empty());

    let bad = bad.unwrap();
    assert!(!bad.ok);
    assert!(bad.artifact.is_none());
    assert!(!bad.diagnostics.is_empty());

    assert_eq!(constructions.get(), 1);
    bridge.dispose();
}

#[tokio::test]
async fn test_fatal_reply_marks_bridge_failed() {
    let (bridge, requests, replies) = manual_bridge();

    let ok = bridge.invoke("a".into(), Assets::new());
    let id = next_compile(&requests).correlation_id;
    replies.send(WorkerReply::failure(id, "boom", vec![])).unwrap();
    ok.await.unwrap();
    assert!(!bridge.is_failed());

    let fatal = bridge.invoke("b".into(), Assets::new());
    let id = next_compile(&requests).correlation_id;
    replies.send(WorkerReply::init_failed(id, "no fonts")).unwrap();
    assert!(fatal.await.unwrap().fatal);
    assert!(bridge.is_failed());
}
