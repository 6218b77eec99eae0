// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex as PlMutex;
use swarm_core::FakeClock;

/// Queue wired to an executor that records dispatch order and replies
/// with a canned result after an optional per-call delay.
fn test_queue(
    clock: FakeClock,
    wait: Duration,
) -> (AdmissionQueue<FakeClock>, Arc<PlMutex<Vec<(String, String)>>>, Arc<PlMutex<Vec<String>>>) {
    let calls: Arc<PlMutex<Vec<(String, String)>>> = Arc::new(PlMutex::new(Vec::new()));
    let scale_signals: Arc<PlMutex<Vec<String>>> = Arc::new(PlMutex::new(Vec::new()));

    let record = Arc::clone(&calls);
    let execute: ExecuteFn = Arc::new(move |instance, tool, _args| {
        record.lock().push((instance, tool.clone()));
        Box::pin(async move { Ok(CallToolResult::text(format!("{tool} done"))) })
    });
    let signals = Arc::clone(&scale_signals);
    let on_scale_up: ScaleUpFn = Arc::new(move |base| signals.lock().push(base));

    let queue = AdmissionQueue::new(clock, Duration::from_secs(60), wait, execute, on_scale_up);
    (queue, calls, scale_signals)
}

#[tokio::test]
async fn submit_dispatches_to_idle_instance() {
    let (queue, calls, _) = test_queue(FakeClock::new(), Duration::from_secs(5));
    queue.register_instance("w", "w");
    let rx = queue.submit("w", "hello", serde_json::json!({}));
    let result = rx.await.unwrap().unwrap();
    assert_eq!(result.first_text(), Some("hello done"));
    assert_eq!(calls.lock().as_slice(), &[("w".to_string(), "hello".to_string())]);
}

#[tokio::test]
async fn fifo_order_is_preserved_per_base() {
    let clock = FakeClock::new();
    let calls: Arc<PlMutex<Vec<String>>> = Arc::new(PlMutex::new(Vec::new()));
    let record = Arc::clone(&calls);
    // Slow executor so every call queues behind the first.
    let execute: ExecuteFn = Arc::new(move |_instance, tool, _args| {
        let record = Arc::clone(&record);
        Box::pin(async move {
            record.lock().push(tool.clone());
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(CallToolResult::text(tool))
        })
    });
    let on_scale_up: ScaleUpFn = Arc::new(|_| {});
    let queue = AdmissionQueue::new(
        clock,
        Duration::from_secs(60),
        Duration::from_secs(5),
        execute,
        on_scale_up,
    );
    queue.register_instance("w", "w");

    let receivers: Vec<_> =
        (0..4).map(|i| queue.submit("w", &format!("call-{i}"), serde_json::json!({}))).collect();
    for rx in receivers {
        rx.await.unwrap().unwrap();
    }
    assert_eq!(calls.lock().as_slice(), &["call-0", "call-1", "call-2", "call-3"]);
}

#[tokio::test]
async fn multiple_idle_instances_saturate_in_one_pass() {
    let (queue, calls, _) = test_queue(FakeClock::new(), Duration::from_secs(5));
    // Two calls queued before any instance exists.
    let rx1 = queue.submit("w", "a", serde_json::json!({}));
    let rx2 = queue.submit("w", "b", serde_json::json!({}));
    assert_eq!(queue.depth("w"), 2);

    queue.register_instance("w", "w");
    queue.register_instance("w", "w#1");
    rx1.await.unwrap().unwrap();
    rx2.await.unwrap().unwrap();

    let dispatched = calls.lock().clone();
    assert_eq!(dispatched.len(), 2);
    // First call to the first-registered instance, second to the next.
    assert_eq!(dispatched[0].1, "a");
}

#[tokio::test]
async fn ttl_expiry_rejects_with_timeout() {
    let clock = FakeClock::new();
    let (queue, _, _) = test_queue(clock.clone(), Duration::from_secs(5));
    // No instances registered: the call waits in queue.
    let rx = queue.submit("w", "stale", serde_json::json!({}));

    clock.advance(Duration::from_secs(61));
    queue.on_tick();

    match rx.await.unwrap() {
        Err(SwarmError::Timeout(msg)) => assert!(msg.contains("expired")),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(queue.depth("w"), 0);
}

#[tokio::test]
async fn drain_rejects_everything_with_server_stopped() {
    let (queue, _, _) = test_queue(FakeClock::new(), Duration::from_secs(5));
    let rx1 = queue.submit("w", "a", serde_json::json!({}));
    let rx2 = queue.submit("w", "b", serde_json::json!({}));

    queue.drain("w");

    for rx in [rx1, rx2] {
        match rx.await.unwrap() {
            Err(SwarmError::Cancelled(msg)) => assert_eq!(msg, "server stopped"),
            other => panic!("expected cancelled, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn scale_up_fires_once_per_pending_interval() {
    let clock = FakeClock::new();
    let (queue, _, signals) = test_queue(clock.clone(), Duration::from_secs(5));
    let _rx = queue.submit("w", "a", serde_json::json!({}));

    // Below the wait threshold: no signal.
    clock.advance(Duration::from_secs(2));
    queue.on_tick();
    assert!(signals.lock().is_empty());

    // Past the threshold with every (zero) instance busy: one signal.
    clock.advance(Duration::from_secs(4));
    queue.on_tick();
    queue.on_tick();
    assert_eq!(signals.lock().as_slice(), &["w".to_string()]);

    // After the supervisor resolves, the next tick may signal again.
    queue.clear_scale_pending("w");
    queue.on_tick();
    assert_eq!(signals.lock().len(), 2);
}

#[tokio::test]
async fn scale_up_not_signalled_while_an_instance_is_idle() {
    let clock = FakeClock::new();
    let (queue, _, signals) = test_queue(clock.clone(), Duration::from_secs(5));
    queue.register_instance("w", "w");

    // The registered instance is idle, so queued work drains instead.
    let rx = queue.submit("w", "a", serde_json::json!({}));
    rx.await.unwrap().unwrap();

    clock.advance(Duration::from_secs(10));
    queue.on_tick();
    assert!(signals.lock().is_empty());
}

#[tokio::test]
async fn unregister_removes_from_rotation() {
    let (queue, calls, _) = test_queue(FakeClock::new(), Duration::from_secs(5));
    queue.register_instance("w", "w");
    queue.register_instance("w", "w#1");
    queue.unregister_instance("w", "w");

    let rx = queue.submit("w", "a", serde_json::json!({}));
    rx.await.unwrap().unwrap();
    assert_eq!(calls.lock().as_slice(), &[("w#1".to_string(), "a".to_string())]);
}
