use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::json;
use storypipe::api::ApiClient;
use storypipe::model::StatusKind;
use storypipe::poller::{BusyFlag, TaskPoller};
use storypipe::status::StatusPresenter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Short enough that a full sequence finishes within the test, long enough
// that a tick is observable.
const FAST_POLL: Duration = Duration::from_millis(20);

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), None, Duration::from_secs(5)).expect("client")
}

fn counting_hook(counter: Arc<AtomicUsize>) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test]
async fn running_then_done_runs_the_completion_hook_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/task/t1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "running"})),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/task/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"status": "done", "message": "Merge complete"}),
        ))
        .mount(&server)
        .await;

    let presenter = StatusPresenter::new();
    let poller = TaskPoller::new(client_for(&server), presenter.clone(), FAST_POLL);
    let busy = BusyFlag::default();
    busy.set();
    let counter = Arc::new(AtomicUsize::new(0));

    poller
        .spawn("t1", Some(busy.clone()), Some(counting_hook(counter.clone())))
        .wait()
        .await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(!busy.is_busy());
    let note = presenter.current().expect("note");
    assert_eq!(note.kind, StatusKind::Done);
    assert_eq!(note.text, "Merge complete");
}

#[tokio::test]
async fn job_error_ends_the_sequence_without_the_hook() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/task/t2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "running"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/task/t2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"status": "error", "message": "ffmpeg exited with 1"}),
        ))
        .mount(&server)
        .await;

    let presenter = StatusPresenter::new();
    let poller = TaskPoller::new(client_for(&server), presenter.clone(), FAST_POLL);
    let busy = BusyFlag::default();
    busy.set();
    let counter = Arc::new(AtomicUsize::new(0));

    poller
        .spawn("t2", Some(busy.clone()), Some(counting_hook(counter.clone())))
        .wait()
        .await;

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(!busy.is_busy());
    let note = presenter.current().expect("note");
    assert_eq!(note.kind, StatusKind::Error);
    assert_eq!(note.text, "ffmpeg exited with 1");
}

#[tokio::test]
async fn unrecognized_status_presents_running_and_stops_after_one_check() {
    let server = MockServer::start().await;
    // The server answers `unknown` for a task id it has no record of.
    Mock::given(method("GET"))
        .and(path("/api/task/gone"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "unknown"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let presenter = StatusPresenter::new();
    let poller = TaskPoller::new(client_for(&server), presenter.clone(), FAST_POLL);
    let busy = BusyFlag::default();
    busy.set();

    poller.spawn("gone", Some(busy.clone()), None).wait().await;

    assert!(!busy.is_busy());
    let note = presenter.current().expect("note");
    assert_eq!(note.kind, StatusKind::Running);
}

#[tokio::test]
async fn transport_failure_surfaces_its_own_error_note() {
    // Nothing listens here; the connection is refused.
    let client =
        ApiClient::new("http://127.0.0.1:9", None, Duration::from_secs(1)).expect("client");
    let presenter = StatusPresenter::new();
    let poller = TaskPoller::new(client, presenter.clone(), FAST_POLL);
    let busy = BusyFlag::default();
    busy.set();
    let counter = Arc::new(AtomicUsize::new(0));

    poller
        .spawn("t3", Some(busy.clone()), Some(counting_hook(counter.clone())))
        .wait()
        .await;

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(!busy.is_busy());
    let note = presenter.current().expect("note");
    assert_eq!(note.kind, StatusKind::Error);
    assert!(
        note.text.starts_with("task status check failed:"),
        "unexpected note: {}",
        note.text
    );
}
