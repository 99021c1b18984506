//! Tests for the Peer against a hand-driven worker end.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tetherwire::CallMessage;
use tetherwire::Envelope;
use tetherwire::Frame;
use tetherwire::ResultMessage;

use crate::*;
use crate::transport::DuplexTransport;
use crate::transport::Transport;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A peer on one end of a fresh channel, and the raw other end.
fn connected() -> (Peer, DuplexTransport) {
    init_tracing();
    let (controller_end, worker_end) = DuplexTransport::pair();
    (Peer::new("test-peer", Box::new(controller_end)), worker_end)
}

async fn next_call(worker_end: &DuplexTransport) -> (CallMessage, TransferSet) {
    let envelope = worker_end.recv().await.unwrap().expect("channel closed");
    let Envelope { frame, transfers } = envelope;
    (frame.into_call().unwrap(), TransferSet::from(transfers))
}

fn answer(worker_end: &DuplexTransport, result: ResultMessage) {
    worker_end.send(Envelope::new(Frame::Result(result))).unwrap();
}

// --- Correlation ---

#[tokio::test]
async fn call_message_carries_name_and_args() {
    let (peer, worker_end) = connected();
    let deferred = peer.invoke("add", args![1i64, 2i64]);

    let (call, transfers) = next_call(&worker_end).await;
    assert_eq!(call.name, "add");
    assert_eq!(call.args, args![1i64, 2i64]);
    assert_eq!(Some(call.id), deferred.id());
    assert!(transfers.is_empty());

    answer(&worker_end, ResultMessage::ok(call.id, Value::S64(3)));
    assert_eq!(deferred.await.unwrap(), Value::S64(3));
    assert_eq!(peer.outstanding(), 0);
}

#[tokio::test]
async fn scrambled_answers_reach_their_own_callers() {
    let (peer, worker_end) = connected();
    let deferreds: Vec<Deferred> = (0..32i64).map(|i| peer.invoke("times-ten", args![i])).collect();
    assert_eq!(peer.outstanding(), 32);

    let mut calls = Vec::new();
    for _ in 0..32 {
        calls.push(next_call(&worker_end).await.0);
    }
    calls.shuffle(&mut rand::thread_rng());
    for call in calls {
        let n = call.args[0].as_s64().unwrap();
        answer(&worker_end, ResultMessage::ok(call.id, Value::S64(n * 10)));
    }

    for (i, deferred) in deferreds.into_iter().enumerate() {
        assert_eq!(deferred.await.unwrap(), Value::S64(i as i64 * 10));
    }
}

#[tokio::test]
async fn error_flag_rejects_only_the_matching_call() {
    let (peer, worker_end) = connected();
    let good = peer.invoke("ok", args![]);
    let bad = peer.invoke("fail", args![]);

    let (first, _) = next_call(&worker_end).await;
    let (second, _) = next_call(&worker_end).await;
    answer(&worker_end, ResultMessage::err(second.id, Value::from("boom")));
    answer(&worker_end, ResultMessage::ok(first.id, Value::Bool(true)));

    assert_eq!(bad.await.unwrap_err(), Error::Remote(Value::from("boom")));
    assert_eq!(good.await.unwrap(), Value::Bool(true));
}

#[tokio::test]
async fn unknown_ids_are_dropped_and_pump_keeps_going() {
    let (peer, worker_end) = connected();
    let deferred = peer.invoke("f", args![]);
    let (call, _) = next_call(&worker_end).await;

    answer(&worker_end, ResultMessage::ok(CallId(call.id.0 + 1000), Value::from("stray")));
    answer(&worker_end, ResultMessage::ok(call.id, Value::from("mine")));

    assert_eq!(deferred.await.unwrap(), Value::from("mine"));
}

#[tokio::test]
async fn duplicate_answer_does_not_disturb_later_calls() {
    let (peer, worker_end) = connected();
    let first = peer.invoke("f", args![]);
    let (call, _) = next_call(&worker_end).await;
    answer(&worker_end, ResultMessage::ok(call.id, Value::S64(1)));
    answer(&worker_end, ResultMessage::ok(call.id, Value::S64(2)));
    assert_eq!(first.await.unwrap(), Value::S64(1));

    let second = peer.invoke("f", args![]);
    let (call, _) = next_call(&worker_end).await;
    answer(&worker_end, ResultMessage::ok(call.id, Value::S64(3)));
    assert_eq!(second.await.unwrap(), Value::S64(3));
}

// --- Transfers ---

#[tokio::test]
async fn staged_objects_travel_with_exactly_one_call() {
    let (peer, worker_end) = connected();
    let staged = TransferSet::new().with(vec![7u8; 64]);

    let with_buffer = peer.invoke_with("consume", args![], staged);
    let without = peer.invoke("plain", args![]);

    let (first, mut transfers) = next_call(&worker_end).await;
    assert_eq!(first.name, "consume");
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers.take::<Vec<u8>>(), Some(vec![7u8; 64]));

    let (second, transfers) = next_call(&worker_end).await;
    assert_eq!(second.name, "plain");
    assert!(transfers.is_empty());

    drop((with_buffer, without));
}

#[tokio::test]
async fn transfers_on_the_answer_reach_the_caller() {
    let (peer, worker_end) = connected();
    let deferred = peer.invoke("produce", args![]);
    let (call, _) = next_call(&worker_end).await;

    let result = Frame::Result(ResultMessage::ok(call.id, Value::Unit));
    let moved = TransferSet::new().with(String::from("handle")).drain_and_reset();
    worker_end.send(Envelope::with_transfers(result, moved)).unwrap();

    let mut settled = deferred.settled().await.unwrap();
    assert_eq!(settled.value, Value::Unit);
    assert_eq!(settled.transfers.take::<String>().as_deref(), Some("handle"));
}

// --- Teardown ---

#[tokio::test]
async fn worker_end_closing_rejects_outstanding_calls() {
    let (peer, worker_end) = connected();
    let deferreds: Vec<Deferred> = (0..3).map(|_| peer.invoke("slow", args![])).collect();

    worker_end.close();

    for deferred in deferreds {
        assert_eq!(deferred.await.unwrap_err(), Error::ChannelClosed);
    }
    assert_eq!(peer.outstanding(), 0);
}

#[tokio::test]
async fn closing_the_peer_rejects_outstanding_and_future_calls() {
    let (peer, _worker_end) = connected();
    let pending = peer.invoke("slow", args![]);

    peer.close();
    assert!(peer.is_closed());
    assert_eq!(pending.await.unwrap_err(), Error::ChannelClosed);

    let late = peer.invoke("late", args![]);
    assert_eq!(late.id(), None);
    assert_eq!(late.await.unwrap_err(), Error::ChannelClosed);
}

#[tokio::test]
async fn close_stops_the_worker_end_from_receiving() {
    let (peer, worker_end) = connected();
    peer.close();
    assert!(worker_end.recv().await.unwrap().is_none());
}

#[tokio::test]
async fn failed_send_rejects_with_the_transport_error() {
    let (peer, worker_end) = connected();
    // The pump has not run yet, so the peer still believes the channel is open.
    drop(worker_end);

    let deferred = peer.invoke("add", args![1i64, 2i64]);
    assert_eq!(peer.outstanding(), 0);

    let err = deferred.await.unwrap_err();
    assert!(
        matches!(&err, Error::Transport(transport::Error::ConnectionLost(_))),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn ids_wrap_around_on_a_long_lived_channel() {
    init_tracing();
    let (controller_end, worker_end) = DuplexTransport::pair();
    let ledger = ledger::Ledger::starting_at(u64::MAX);
    let peer = Peer::with_ledger("wrapping", Box::new(controller_end), ledger);

    let last = peer.invoke("f", args![]);
    let wrapped = peer.invoke("f", args![]);
    assert_eq!(last.id(), Some(CallId(u64::MAX)));
    assert_eq!(wrapped.id(), Some(CallId(0)));

    let (first, _) = next_call(&worker_end).await;
    let (second, _) = next_call(&worker_end).await;
    answer(&worker_end, ResultMessage::ok(second.id, Value::from("wrapped")));
    answer(&worker_end, ResultMessage::ok(first.id, Value::from("last")));

    assert_eq!(wrapped.await.unwrap(), Value::from("wrapped"));
    assert_eq!(last.await.unwrap(), Value::from("last"));
}

// --- Responder over a raw channel ---

fn math() -> FunctionTable {
    FunctionTable::new()
        .func("add", |args| {
            let a = args.first().and_then(Value::as_s64).ok_or(Value::from("expected s64"))?;
            let b = args.get(1).and_then(Value::as_s64).ok_or(Value::from("expected s64"))?;
            Ok(Value::S64(a + b))
        })
        .async_func("slow-echo", |args| async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(Value::List(args))
        })
}

fn served() -> Peer {
    init_tracing();
    let (controller_end, worker_end) = DuplexTransport::pair();
    tokio::spawn(responder::serve(Arc::new(worker_end), math()));
    Peer::new("served", Box::new(controller_end))
}

#[tokio::test]
async fn peer_is_callable_through_remote() {
    let peer = served();
    assert_eq!(peer.call("add", args![3i64, 4i64]).await.unwrap(), Value::S64(7));
    assert_eq!(Arc::new(peer).call("add", args![0i64, 1i64]).await.unwrap(), Value::S64(1));
}

#[tokio::test]
async fn serve_answers_calls() {
    let peer = served();
    assert_eq!(peer.invoke("add", args![1i64, 2i64]).await.unwrap(), Value::S64(3));
}

#[tokio::test]
async fn serve_survives_unknown_functions() {
    let peer = served();
    let err = peer.invoke("mul", args![2i64, 3i64]).await.unwrap_err();
    assert!(matches!(&err, Error::Remote(v) if v.to_string().contains("mul")));

    assert_eq!(peer.invoke("add", args![2i64, 3i64]).await.unwrap(), Value::S64(5));
}

#[tokio::test]
async fn slow_calls_do_not_block_fast_ones() {
    let peer = served();
    let slow = peer.invoke("slow-echo", args!["slow"]);
    let fast = peer.invoke("add", args![1i64, 1i64]);

    // The fast answer overtakes the slow one on the wire.
    assert_eq!(fast.await.unwrap(), Value::S64(2));
    assert_eq!(peer.outstanding(), 1);
    assert_eq!(slow.await.unwrap(), Value::List(args!["slow"]));
}

// --- Typed interfaces ---

crate::interface! {
    struct Math {
        fn add;
        fn slow_echo = "slow-echo";
    }
}

#[tokio::test]
async fn interface_forwards_by_name() {
    let math = Math::new(served());
    assert_eq!(Math::<Peer>::FUNCTIONS, &["add", "slow-echo"]);
    assert_eq!(math.add(args![20i64, 22i64]).await.unwrap(), Value::S64(42));
    assert_eq!(math.slow_echo(args![1i64]).await.unwrap(), Value::List(args![1i64]));
}
