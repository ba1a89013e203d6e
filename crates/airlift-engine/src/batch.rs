//! Sequential batch scheduling
//!
//! A batch runs its resources strictly one after another over the shared
//! link. Admission is all-or-nothing: every request is checked before the
//! first transport call, and a single bad request rejects the whole batch
//! with every problem listed. Once running, per-resource outcomes are
//! isolated; only a cancellation halts the remaining entries.

use crate::coordinator::Coordinator;
use crate::events::EventBus;
use crate::path;
use crate::retry::{run_session, SessionPlan};
use crate::session::{BatchReport, TransferOutcome, TransferRequest};
use airlift_config::Config;
use airlift_transport::Transport;
use airlift_types::{Direction, PlatformFamily, Result, TransferError};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time;
use tracing::debug;

/// Shared engine state a batch run borrows
pub(crate) struct BatchContext<'a> {
    pub transport: &'a dyn Transport,
    pub events: &'a EventBus,
    pub coordinator: &'a Coordinator,
    pub config: &'a Config,
    pub failsafe_from_start: bool,
    pub family: PlatformFamily,
}

/// Run a batch of requests sequentially and report per-resource outcomes
///
/// An empty batch resolves immediately without touching the transport or
/// emitting a single event. Cancellation aborts the whole run with
/// `TransferError::Cancelled`; any other per-resource failure is recorded in
/// the report and the remaining entries still run.
pub(crate) async fn run_batch(
    ctx: BatchContext<'_>,
    requests: Vec<TransferRequest>,
) -> Result<BatchReport> {
    if requests.is_empty() {
        return Ok(BatchReport::begin().finish());
    }

    let canonical = admit(&requests)?;
    let (order, mut by_path) = deduplicate(requests, canonical);

    let pacing = ctx.config.transfer.sleep_between_transfers();
    let grace_window = ctx.config.cancellation.grace_window();
    let mut report = BatchReport::begin();
    let mut first = true;

    for resource in order {
        let Some(request) = by_path.remove(&resource) else {
            continue;
        };

        if !first && pacing > Duration::ZERO {
            time::sleep(pacing).await;
        }
        first = false;

        let plan = SessionPlan::resolve(
            request,
            resource.clone(),
            ctx.config,
            ctx.failsafe_from_start,
            ctx.family,
        );
        let run = run_session(
            ctx.transport,
            ctx.events,
            ctx.coordinator,
            grace_window,
            plan,
        )
        .await;

        match run.outcome {
            Ok(payload) => report.record(
                resource,
                TransferOutcome::Succeeded {
                    payload,
                    attempts: run.attempts,
                },
            ),
            Err(error @ TransferError::Cancelled { .. }) => return Err(error),
            Err(error) => report.record(
                resource,
                TransferOutcome::Failed {
                    error,
                    attempts: run.attempts,
                },
            ),
        }
    }

    Ok(report.finish())
}

// Checks every request before anything runs, collecting all problems into
// one rejection instead of stopping at the first.
fn admit(requests: &[TransferRequest]) -> Result<Vec<String>> {
    let mut canonical = Vec::with_capacity(requests.len());
    let mut problems: Vec<String> = Vec::new();

    for request in requests {
        match path::normalize(&request.resource) {
            Ok(path) => canonical.push(path),
            Err(TransferError::InvalidArgument { message }) => {
                problems.push(message);
                canonical.push(String::new());
            }
            Err(error) => {
                problems.push(error.to_string());
                canonical.push(String::new());
            }
        }
        if request.direction == Direction::Upload && request.payload.is_none() {
            problems.push(format!(
                "upload for '{}' carries no payload",
                request.resource.trim()
            ));
        }
        if let Err(message) = request.params.validate() {
            problems.push(format!(
                "invalid negotiation parameters for '{}': {message}",
                request.resource.trim()
            ));
        }
    }

    if problems.is_empty() {
        Ok(canonical)
    } else {
        Err(TransferError::invalid_argument(format!(
            "batch rejected, {} problem(s): {}",
            problems.len(),
            problems.join("; ")
        )))
    }
}

// Collapses requests that normalize to the same canonical path into one
// session each, preserving first-appearance order. An upload supersedes an
// earlier entry for the same path because it carries the data to deliver;
// a repeated download changes nothing.
fn deduplicate(
    requests: Vec<TransferRequest>,
    canonical: Vec<String>,
) -> (Vec<String>, HashMap<String, TransferRequest>) {
    let mut order: Vec<String> = Vec::new();
    let mut by_path: HashMap<String, TransferRequest> = HashMap::new();

    for (request, path) in requests.into_iter().zip(canonical) {
        match by_path.entry(path) {
            Entry::Occupied(mut slot) => {
                if request.direction == Direction::Upload {
                    slot.insert(request);
                } else {
                    debug!(resource = %slot.key(), "duplicate batch entry collapsed");
                }
            }
            Entry::Vacant(slot) => {
                order.push(slot.key().clone());
                slot.insert(request);
            }
        }
    }

    (order, by_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TransferEvent;
    use airlift_transport::{NotificationSink, Verdict};
    use airlift_types::{ErrorKind, NegotiationParams, RemoteErrorCode, TransferPhase};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    enum Script {
        Complete(Option<Vec<u8>>),
        Fail(&'static str, RemoteErrorCode),
    }

    #[derive(Default)]
    struct RoutedLink {
        scripts: Mutex<HashMap<String, VecDeque<Script>>>,
        calls: Mutex<Vec<(Direction, String)>>,
        sink: Mutex<Option<NotificationSink>>,
    }

    impl RoutedLink {
        fn script<S: Into<String>>(self, resource: S, script: Script) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .entry(resource.into())
                .or_default()
                .push_back(script);
            self
        }

        fn calls(&self) -> Vec<(Direction, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Transport for RoutedLink {
        fn attach(&self, sink: NotificationSink) {
            *self.sink.lock().unwrap() = Some(sink);
        }

        fn begin_transfer(
            &self,
            direction: Direction,
            resource: &str,
            _payload: Option<&[u8]>,
            _params: &NegotiationParams,
        ) -> std::result::Result<Verdict, TransferError> {
            self.calls
                .lock()
                .unwrap()
                .push((direction, resource.to_string()));
            let script = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(resource)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Script::Fail("unscripted resource", RemoteErrorCode::None));
            let sink = self.sink.lock().unwrap().take().unwrap();

            sink.state_changed(resource, TransferPhase::Idle, TransferPhase::Transferring);
            match script {
                Script::Complete(payload) => {
                    sink.state_changed(
                        resource,
                        TransferPhase::Transferring,
                        TransferPhase::Complete,
                    );
                    sink.completed(resource, payload);
                }
                Script::Fail(message, code) => {
                    sink.state_changed(resource, TransferPhase::Transferring, TransferPhase::Error);
                    sink.fatal_error(resource, message, code);
                }
            }
            Ok(Verdict::Success)
        }

        fn cancel(&self, _reason: &str) {}
        fn pause(&self) {}
        fn resume(&self) {}
        fn disconnect(&self) {}
    }

    fn recording_bus() -> (EventBus, Arc<Mutex<Vec<TransferEvent>>>) {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        (bus, seen)
    }

    fn context<'a>(
        transport: &'a RoutedLink,
        events: &'a EventBus,
        coordinator: &'a Coordinator,
        config: &'a Config,
    ) -> BatchContext<'a> {
        BatchContext {
            transport,
            events,
            coordinator,
            config,
            failsafe_from_start: false,
            family: PlatformFamily::Android,
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_remaining_entries() {
        let link = RoutedLink::default()
            .script("/a.bin", Script::Complete(Some(vec![1])))
            .script("/b.bin", Script::Fail("NO ENTRY (5)", RemoteErrorCode::NotFound))
            .script("/c.bin", Script::Complete(Some(vec![3])))
            .script("/d.bin", Script::Fail("NO ENTRY (5)", RemoteErrorCode::NotFound))
            .script("/e.bin", Script::Complete(Some(vec![5])));
        let (bus, _seen) = recording_bus();
        let coordinator = Coordinator::new();
        let config = Config::default();

        let requests = vec![
            TransferRequest::download("/a.bin"),
            TransferRequest::download("/b.bin"),
            TransferRequest::download("/c.bin"),
            TransferRequest::download("/d.bin"),
            TransferRequest::download("/e.bin"),
        ];
        let report = run_batch(context(&link, &bus, &coordinator, &config), requests)
            .await
            .unwrap();

        assert_eq!(report.len(), 5);
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.failed(), 2);
        assert_eq!(
            report.get("/b.bin").and_then(TransferOutcome::error).map(TransferError::kind),
            Some(ErrorKind::ResourceNotFound)
        );
        assert_eq!(report.get("/c.bin").and_then(TransferOutcome::payload), Some(&[3u8][..]));

        // Strictly sequential, in submission order
        let called: Vec<String> = link.calls().into_iter().map(|(_, r)| r).collect();
        assert_eq!(called, vec!["/a.bin", "/b.bin", "/c.bin", "/d.bin", "/e.bin"]);
    }

    #[tokio::test]
    async fn test_duplicate_spellings_collapse_to_one_session() {
        let link = RoutedLink::default().script("/fw/app.bin", Script::Complete(None));
        let (bus, _seen) = recording_bus();
        let coordinator = Coordinator::new();
        let config = Config::default();

        let requests = vec![
            TransferRequest::download("fw/app.bin"),
            TransferRequest::download("/fw/app.bin"),
            TransferRequest::download("  /fw/app.bin  "),
        ];
        let report = run_batch(context(&link, &bus, &coordinator, &config), requests)
            .await
            .unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(link.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_supersedes_a_download_for_the_same_path() {
        let link = RoutedLink::default().script("/fw/app.bin", Script::Complete(None));
        let (bus, _seen) = recording_bus();
        let coordinator = Coordinator::new();
        let config = Config::default();

        let requests = vec![
            TransferRequest::download("/fw/app.bin"),
            TransferRequest::upload("/fw/app.bin", vec![1, 2, 3]),
        ];
        let report = run_batch(context(&link, &bus, &coordinator, &config), requests)
            .await
            .unwrap();

        assert_eq!(report.len(), 1);
        assert_eq!(
            link.calls(),
            vec![(Direction::Upload, "/fw/app.bin".to_string())]
        );
    }

    #[tokio::test]
    async fn test_empty_batch_resolves_without_events_or_calls() {
        let link = RoutedLink::default();
        let (bus, seen) = recording_bus();
        let coordinator = Coordinator::new();
        let config = Config::default();

        let report = run_batch(context(&link, &bus, &coordinator, &config), Vec::new())
            .await
            .unwrap();

        assert!(report.is_empty());
        assert!(report.finished_at().is_some());
        assert!(link.calls().is_empty());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_bad_request_rejects_the_whole_batch() {
        let link = RoutedLink::default().script("/good.bin", Script::Complete(None));
        let (bus, seen) = recording_bus();
        let coordinator = Coordinator::new();
        let config = Config::default();

        let requests = vec![
            TransferRequest::download("/good.bin"),
            TransferRequest::download("bad/dir/"),
            TransferRequest::download("   "),
        ];
        let error = run_batch(context(&link, &bus, &coordinator, &config), requests)
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
        assert!(error.to_string().contains("2 problem(s)"));
        assert!(link.calls().is_empty(), "nothing may reach the transport");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_without_payload_is_rejected_up_front() {
        let link = RoutedLink::default();
        let (bus, _seen) = recording_bus();
        let coordinator = Coordinator::new();
        let config = Config::default();

        let mut request = TransferRequest::upload("/fw/app.bin", Vec::new());
        request.payload = None;
        let error = run_batch(context(&link, &bus, &coordinator, &config), vec![request])
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
        assert!(error.to_string().contains("carries no payload"));
        assert!(link.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_halts_the_remaining_entries() {
        let link = RoutedLink::default()
            .script("/a.bin", Script::Complete(None))
            .script("/b.bin", Script::Complete(None));
        let (bus, _seen) = recording_bus();
        let coordinator = Arc::new(Coordinator::new());
        let config = Config::default();

        // Cancel as soon as the first resource completes
        let latch = Arc::clone(&coordinator);
        bus.subscribe(move |event| {
            if matches!(event, TransferEvent::Completed { .. }) {
                latch.request_cancel(Some("operator abort".to_string()));
            }
        });

        let requests = vec![
            TransferRequest::download("/a.bin"),
            TransferRequest::download("/b.bin"),
        ];
        let error = run_batch(context(&link, &bus, &coordinator, &config), requests)
            .await
            .unwrap_err();

        assert!(matches!(error, TransferError::Cancelled { .. }));
        assert_eq!(link.calls().len(), 1, "the second entry must not start");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_runs_between_entries_only() {
        let link = RoutedLink::default()
            .script("/a.bin", Script::Complete(None))
            .script("/b.bin", Script::Complete(None));
        let (bus, _seen) = recording_bus();
        let coordinator = Coordinator::new();
        let mut config = Config::default();
        config.transfer.sleep_between_transfers_ms = 5_000;

        let started = time::Instant::now();
        let report = run_batch(
            context(&link, &bus, &coordinator, &config),
            vec![
                TransferRequest::download("/a.bin"),
                TransferRequest::download("/b.bin"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(report.succeeded(), 2);
        // One gap for two entries
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(10));
    }
}
