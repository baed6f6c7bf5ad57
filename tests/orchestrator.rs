use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use storypipe::catalog::ChannelPicker;
use storypipe::model::{BatchRef, MergeMode, StatusKind};
use storypipe::orchestrator::{Console, ConsoleConfig};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Matches only requests that carry no security token header. Reads never
/// send the token; a GET with one is a bug.
struct NoTokenHeader;

impl wiremock::Match for NoTokenHeader {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("X-CSRFToken")
    }
}

fn console_for(server: &MockServer, token: Option<&str>) -> Console {
    Console::new(&ConsoleConfig {
        base_url: server.uri(),
        token: token.map(|t| t.to_string()),
        poll_interval: Duration::from_millis(20),
        request_timeout: Duration::from_secs(5),
    })
    .expect("console")
}

#[tokio::test]
async fn merge_submits_polls_to_done_and_refreshes_folders_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/merge"))
        .and(header("X-CSRFToken", "secret"))
        .and(body_json(json!({
            "username": "nasa",
            "date": "2026-08-01",
            "merge_mode": "shorts",
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": true, "task_id": "t1"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/task/t1"))
        .and(NoTokenHeader)
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "running"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/task/t1"))
        .and(NoTokenHeader)
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"status": "done", "message": "Merge complete"}),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/merged-folders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"username": "nasa", "date": "2026-08-01"},
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let console = console_for(&server, Some("secret"));
    console
        .submit_merge("nasa", Some("2026-08-01".into()), MergeMode::Shorts)
        .await;
    console.wait_idle().await;

    assert!(!console.busy.merge.is_busy());
    let note = console.presenter.current().expect("note");
    assert_eq!(note.kind, StatusKind::Done);
    assert_eq!(note.text, "Merge complete");

    let folders = console.folders.state().folders;
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].key(), "nasa/2026-08-01");
}

#[tokio::test]
async fn blank_download_username_never_reaches_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(0)
        .mount(&server)
        .await;

    let console = console_for(&server, None);
    console.submit_download("   ", false).await;

    let note = console.presenter.current().expect("note");
    assert_eq!(note.kind, StatusKind::Error);
    assert_eq!(note.text, "Enter a username");
    assert!(!console.busy.download.is_busy());
}

#[tokio::test]
async fn refused_job_surfaces_the_error_and_re_enables_the_affordance() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/download"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "error": "Download already in progress",
        })))
        .expect(1)
        .mount(&server)
        .await;
    // A refused submission must not touch the folder list.
    Mock::given(method("GET"))
        .and(path("/api/merged-folders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let console = console_for(&server, None);
    console.submit_download("nasa", true).await;
    console.wait_idle().await;

    let note = console.presenter.current().expect("note");
    assert_eq!(note.kind, StatusKind::Error);
    assert_eq!(note.text, "Download already in progress");
    assert!(!console.busy.download.is_busy());
}

#[tokio::test]
async fn upload_all_requires_a_bulk_channel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/merged-folders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"username": "nasa", "date": "2026-08-01"},
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload-all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(0)
        .mount(&server)
        .await;

    let console = console_for(&server, None);
    console.submit_upload_all("private", "shorts").await;

    let note = console.presenter.current().expect("note");
    assert_eq!(note.kind, StatusKind::Error);
    assert_eq!(note.text, "Choose a channel for the bulk upload");
    assert!(!console.busy.upload_all.is_busy());
}

#[tokio::test]
async fn upload_all_targets_the_auto_selected_stories_channel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/youtube/channels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [
                {"id": "c1", "title": "Main Channel"},
                {"id": "c2", "title": "Daily Stories"},
            ],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/merged-folders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"username": "nasa", "date": "2026-08-01"},
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload-all"))
        .and(body_json(json!({
            "folders": [{"username": "nasa", "date": "2026-08-01"}],
            "privacy": "private",
            "upload_type": "shorts",
            "channel_id": "c2",
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": true, "task_id": "t9"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/task/t9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"status": "done", "message": "Uploaded 1 folder"}),
        ))
        .mount(&server)
        .await;

    let console = console_for(&server, None);
    console.channels.load().await;
    assert_eq!(
        console
            .channels
            .state()
            .selected(ChannelPicker::Bulk)
            .map(|c| c.id.clone()),
        Some("c2".to_string())
    );

    console.submit_upload_all("private", "shorts").await;
    console.wait_idle().await;

    assert!(!console.busy.upload_all.is_busy());
    let note = console.presenter.current().expect("note");
    assert_eq!(note.kind, StatusKind::Done);
    assert_eq!(note.text, "Uploaded 1 folder");
}

#[tokio::test]
async fn channel_refresh_recomputes_the_inline_summary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/youtube/channels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [{"id": "c1", "title": "Main Channel"}],
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/youtube/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [
                {"id": "c1", "title": "Main Channel"},
                {"id": "c2", "title": "Daily Stories"},
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let console = console_for(&server, None);
    console.channels.load().await;
    assert_eq!(
        console.channels.state().note.as_deref(),
        Some("Connected: Main Channel")
    );

    console.refresh_channels().await;
    let state = console.channels.state();
    assert_eq!(state.channels.len(), 2);
    assert_eq!(
        state.note.as_deref(),
        Some("Connected: Main Channel, Daily Stories")
    );

    let note = console.presenter.current().expect("note");
    assert_eq!(note.kind, StatusKind::Done);
    assert_eq!(note.text, "Channels updated");
}

#[tokio::test]
async fn upload_file_streams_the_local_file_and_polls_to_done() {
    let dir = tempfile::tempdir().expect("tempdir");
    let clip = dir.path().join("launch highlights.mp4");
    std::fs::write(&clip, b"not really mp4").expect("write clip");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload-file"))
        .and(header("X-CSRFToken", "secret"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": true, "task_id": "t5"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/task/t5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"status": "done", "message": "Upload complete"}),
        ))
        .mount(&server)
        .await;

    let console = console_for(&server, Some("secret"));
    console.submit_upload_file(&clip, None, "private").await;
    console.wait_idle().await;

    let note = console.presenter.current().expect("note");
    assert_eq!(note.kind, StatusKind::Done);
    assert_eq!(note.text, "Upload complete");
}

#[tokio::test]
async fn upload_file_on_a_missing_path_surfaces_a_read_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload-file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(0)
        .mount(&server)
        .await;

    let console = console_for(&server, None);
    console
        .submit_upload_file(&std::path::PathBuf::from("/no/such/clip.mp4"), None, "private")
        .await;

    let note = console.presenter.current().expect("note");
    assert_eq!(note.kind, StatusKind::Error);
    assert!(note.text.contains("/no/such/clip.mp4"), "{}", note.text);
}

#[tokio::test]
async fn clear_batch_reports_the_server_message_and_refreshes_folders() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/clear-batch"))
        .and(body_json(json!({"username": "nasa", "date": "2026-08-01"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "message": "Removed nasa/2026-08-01",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/merged-folders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let console = console_for(&server, None);
    console
        .clear_batch(Some(BatchRef {
            username: "nasa".into(),
            date: "2026-08-01".into(),
        }))
        .await;

    let note = console.presenter.current().expect("note");
    assert_eq!(note.kind, StatusKind::Done);
    assert_eq!(note.text, "Removed nasa/2026-08-01");
    assert!(console.folders.state().folders.is_empty());
}
