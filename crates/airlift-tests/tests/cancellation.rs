//! Cooperative cancellation, pause gating and deadline tests
//!
//! The clock-sensitive tests run on a paused tokio runtime, so the grace
//! window and per-resource deadlines elapse deterministically instead of
//! slowing the suite down.

use airlift_engine::{
    Config, DeviceSignature, ErrorKind, PlatformFamily, TransferEngine, TransferError,
    TransferEvent, TransferPhase, TransferRequest,
};
use airlift_tests::{init_tracing, AttemptScript, ControlCall, EventLog, ScriptedTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn engine_for(transport: Arc<ScriptedTransport>) -> TransferEngine {
    TransferEngine::builder()
        .transport(transport)
        .host(DeviceSignature::new("Acme", "Widget 9"))
        .family(PlatformFamily::Android)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_cancel_lands_within_the_grace_window() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::scripted([AttemptScript::Silent]));
    let engine = Arc::new(engine_for(Arc::clone(&transport)));
    let log = EventLog::attach(&engine);

    let transfer = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.download("/fw/app.bin").await }
    });
    tokio::task::yield_now().await;

    let requested_at = Instant::now();
    engine.cancel(Some("user abort"));

    let error = transfer.await.unwrap().unwrap_err();
    let waited = requested_at.elapsed();

    // The transport never acknowledged, so the engine lands the session
    // itself once the grace window runs out
    assert!(matches!(
        error,
        TransferError::Cancelled { reason: Some(ref r) } if r == "user abort"
    ));
    assert!(waited >= Duration::from_millis(2_500), "waited {waited:?}");
    assert!(waited < Duration::from_millis(2_600), "waited {waited:?}");

    assert!(log.any_matching(|e| matches!(
        e,
        TransferEvent::StateChanged { new: TransferPhase::Cancelled, .. }
    )));
    assert!(log.any_matching(|e| matches!(
        e,
        TransferEvent::Cancelled { reason: Some(r) } if r == "user abort"
    )));
    assert!(transport
        .controls()
        .contains(&ControlCall::Cancel("user abort".to_string())));
}

#[tokio::test(start_paused = true)]
async fn test_acknowledged_cancel_skips_the_grace_window() {
    init_tracing();
    let transport =
        Arc::new(ScriptedTransport::scripted([AttemptScript::Silent]).acknowledging_cancels());
    let engine = Arc::new(engine_for(Arc::clone(&transport)));
    let log = EventLog::attach(&engine);

    let transfer = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.download("/fw/app.bin").await }
    });
    tokio::task::yield_now().await;

    let requested_at = Instant::now();
    engine.cancel(Some("operator stop"));

    let error = transfer.await.unwrap().unwrap_err();
    let waited = requested_at.elapsed();

    assert!(matches!(
        error,
        TransferError::Cancelled { reason: Some(ref r) } if r == "operator stop"
    ));
    assert!(waited < Duration::from_millis(2_500), "waited {waited:?}");
    assert_eq!(
        log.count_matching(|e| matches!(e, TransferEvent::Cancelled { .. })),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_without_a_reason() {
    init_tracing();
    let transport =
        Arc::new(ScriptedTransport::scripted([AttemptScript::Silent]).acknowledging_cancels());
    let engine = Arc::new(engine_for(Arc::clone(&transport)));

    let transfer = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.download("/fw/app.bin").await }
    });
    tokio::task::yield_now().await;

    engine.cancel(None);

    let error = transfer.await.unwrap().unwrap_err();
    assert!(matches!(error, TransferError::Cancelled { reason: None }));
    assert!(transport
        .controls()
        .contains(&ControlCall::Cancel(String::new())));
}

#[tokio::test]
async fn test_pause_gates_the_next_attempt() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::scripted([
        AttemptScript::recoverable(),
        AttemptScript::complete(Some(vec![3])),
    ]));
    let mut config = Config::default();
    config.transfer.sleep_between_retries_ms = 0;
    let engine = Arc::new(
        TransferEngine::builder()
            .transport(transport.clone())
            .config(config)
            .host(DeviceSignature::new("Acme", "Widget 9"))
            .family(PlatformFamily::Android)
            .build()
            .unwrap(),
    );

    // Latch the pause from inside the first failure's event delivery, so
    // the request is guaranteed to be pending at the next checkpoint
    let latch = Arc::clone(&engine);
    engine.on_event(move |event| {
        if matches!(event, TransferEvent::FatalError { .. }) {
            latch.try_pause();
        }
    });
    let log = EventLog::attach(&engine);

    let transfer = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.download("/fw/app.bin").await }
    });
    tokio::task::yield_now().await;

    // The retry is parked on the gate, not at the transport
    assert!(engine.is_paused());
    assert_eq!(transport.transfer_count(), 1);
    assert!(log.any_matching(|e| matches!(
        e,
        TransferEvent::StateChanged {
            old: TransferPhase::Idle,
            new: TransferPhase::Paused,
            ..
        }
    )));
    assert!(transport.controls().contains(&ControlCall::Pause));

    assert!(engine.try_resume());
    let bytes = transfer.await.unwrap().unwrap();

    assert_eq!(bytes, vec![3]);
    assert_eq!(transport.transfer_count(), 2);
    assert!(transport.controls().contains(&ControlCall::Resume));

    let seen = log.snapshot();
    let paused_at = seen
        .iter()
        .position(|e| matches!(e, TransferEvent::Paused { .. }))
        .unwrap();
    let resumed_at = seen
        .iter()
        .position(|e| matches!(e, TransferEvent::Resumed { .. }))
        .unwrap();
    assert!(paused_at < resumed_at);
    assert!(seen.iter().any(|e| matches!(
        e,
        TransferEvent::StateChanged {
            old: TransferPhase::Paused,
            new: TransferPhase::Idle,
            ..
        }
    )));
}

#[tokio::test]
async fn test_pause_is_refused_when_nothing_runs() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::new());
    let engine = engine_for(Arc::clone(&transport));

    assert!(!engine.try_pause());
    assert!(!engine.try_resume());
    assert!(transport.controls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_expiry_times_the_transfer_out() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::scripted([AttemptScript::Silent]));
    let engine = Arc::new(engine_for(Arc::clone(&transport)));
    let log = EventLog::attach(&engine);

    let started_at = Instant::now();
    let request = TransferRequest::download("/fw/app.bin").with_timeout(Duration::from_secs(5));
    let error = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.transfer(request).await })
            .await
            .unwrap()
            .unwrap_err()
    };

    assert!(matches!(error, TransferError::TimedOut { seconds: 5, .. }));
    assert!(started_at.elapsed() >= Duration::from_secs(5));

    assert!(log.any_matching(|e| matches!(
        e,
        TransferEvent::StateChanged { new: TransferPhase::Error, .. }
    )));
    // A timeout is not a remote failure and not a cancellation
    assert_eq!(
        log.count_matching(|e| matches!(e, TransferEvent::FatalError { .. })),
        0
    );
    assert_eq!(
        log.count_matching(|e| matches!(e, TransferEvent::Cancelled { .. })),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_grace_window_beats_a_later_deadline() {
    init_tracing();
    let transport = Arc::new(ScriptedTransport::scripted([AttemptScript::Silent]));
    let engine = Arc::new(engine_for(Arc::clone(&transport)));

    let request = TransferRequest::download("/fw/app.bin").with_timeout(Duration::from_secs(30));
    let transfer = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.transfer(request).await }
    });
    tokio::task::yield_now().await;

    let requested_at = Instant::now();
    engine.cancel(Some("shutdown"));

    let error = transfer.await.unwrap().unwrap_err();

    // The grace window elapses long before the 30s deadline would
    assert_eq!(error.kind(), ErrorKind::Cancelled);
    assert!(requested_at.elapsed() < Duration::from_secs(30));
}
