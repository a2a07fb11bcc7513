use super::Library;
use repokeeper::error::ApiError;
use repokeeper::publish::BroadcastPublisher;
use repokeeper::service::commands::DISPATCHER_CONTEXT;
use repokeeper::service::{stdio, CacheHandle, ServiceRequest, ServiceResponse};
use repokeeper::types::FsChange;
use repokeeper::watch::{EventSender, MemoryRegistry};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

async fn start(
    library: &Library,
) -> (
    CacheHandle,
    JoinHandle<Result<(), ApiError>>,
    EventSender,
    Arc<BroadcastPublisher>,
) {
    start_cancellable(library, Arc::new(AtomicBool::new(false))).await
}

async fn start_cancellable(
    library: &Library,
    cancel: Arc<AtomicBool>,
) -> (
    CacheHandle,
    JoinHandle<Result<(), ApiError>>,
    EventSender,
    Arc<BroadcastPublisher>,
) {
    let publisher = Arc::new(BroadcastPublisher::default());
    let (registry, events, rx) = MemoryRegistry::channel();
    let (handle, owner) = library
        .keeper(publisher.clone())
        .start_with(cancel, Box::new(registry), rx)
        .await
        .unwrap();
    (handle, owner, events, publisher)
}

#[tokio::test]
async fn ping_and_info() {
    let library = Library::new();
    library.album("A", &["01.flac"]);
    library.album("B/CD1", &["01.flac"]);
    let (handle, owner, _events, _publisher) = start(&library).await;

    let request = ServiceRequest::new("ping");
    let response = handle.request(request.clone()).await.unwrap();
    assert!(!response.is_error());
    assert_eq!(response.correlation_id, request.correlation_id);

    let info = handle
        .request(ServiceRequest::new("info"))
        .await
        .unwrap()
        .info
        .unwrap();
    assert_eq!(info.name, "repokeeper");
    assert_eq!(info.root_dir, library.root);
    assert_eq!(info.album_entries, 2);
    assert_eq!(info.tracked_directories, 4);
    assert_eq!(info.pending_renames, 0);

    handle.shutdown().await.unwrap();
    owner.await.unwrap().unwrap();
}

#[tokio::test]
async fn unknown_and_unimplemented_commands_answer_with_errors() {
    let library = Library::new();
    library.album("A", &["01.flac"]);
    let (handle, owner, _events, _publisher) = start(&library).await;

    let response = handle.request(ServiceRequest::new("x")).await.unwrap();
    let error = response.error.clone().unwrap();
    assert_eq!(error.error, "Unknown command: x");
    assert_eq!(error.context, DISPATCHER_CONTEXT);
    assert!(matches!(response.into_result(), Err(ApiError::UnknownCommand(_))));

    let response = handle
        .request(ServiceRequest::new("normalize").with_path(library.path("A")))
        .await
        .unwrap();
    let error = response.error.unwrap();
    assert_eq!(error.context, "normalize");
    assert!(error.error.contains("Not implemented"));

    let response = handle.dispatch_raw("not json").await;
    assert_eq!(response.error.unwrap().context, DISPATCHER_CONTEXT);

    // Still serving after the failures.
    let response = handle.dispatch_raw(r#"{"cmd":"ping"}"#).await;
    assert!(!response.is_error());

    handle.shutdown().await.unwrap();
    owner.await.unwrap().unwrap();
}

#[tokio::test]
async fn update_reports_and_publishes_changes() {
    let library = Library::new();
    library.album("A", &["01.flac"]);
    let (handle, owner, _events, publisher) = start(&library).await;
    let mut notices = publisher.subscribe();

    library.album("B", &["01.mp3"]);
    fs::remove_dir_all(library.path("A")).unwrap();

    let response = handle
        .request(ServiceRequest::new("update"))
        .await
        .unwrap();
    let changes = response.changes.unwrap();
    assert_eq!(changes.len(), 2);
    assert!(changes
        .iter()
        .any(|c| c.kind == FsChange::Created && c.path == library.path("B")));
    assert!(changes
        .iter()
        .any(|c| c.kind == FsChange::Deleted && c.path == library.path("A")));

    let first = notices.recv().await.unwrap();
    assert!(changes.contains(&first));

    let full = handle
        .request(ServiceRequest::new("update").full())
        .await
        .unwrap();
    let snapshot = full.snapshot.unwrap();
    assert!(snapshot.contains_key(&library.path("B")));
    assert!(!snapshot.contains_key(&library.path("A")));
    assert!(full.changes.is_none());

    handle.shutdown().await.unwrap();
    owner.await.unwrap().unwrap();
}

#[tokio::test]
async fn cancelled_update_keeps_live_tree() {
    let library = Library::new();
    library.album("A", &["01.flac"]);
    let cancel = Arc::new(AtomicBool::new(false));
    let (handle, owner, _events, _publisher) = start_cancellable(&library, cancel.clone()).await;
    let before = handle
        .request(ServiceRequest::new("info"))
        .await
        .unwrap()
        .info
        .unwrap();

    library.album("B", &["01.mp3"]);
    cancel.store(true, Ordering::SeqCst);
    let response = handle
        .request(ServiceRequest::new("update"))
        .await
        .unwrap();
    let error = response.error.clone().unwrap();
    assert_eq!(error.context, "update");
    assert!(matches!(
        response.into_result(),
        Err(ApiError::RemoteError { context, .. }) if context == "update"
    ));

    let after = handle
        .request(ServiceRequest::new("info"))
        .await
        .unwrap()
        .info
        .unwrap();
    assert_eq!(after, before);

    // The retained tree still lacks B, so the next update reports it.
    cancel.store(false, Ordering::SeqCst);
    let changes = handle
        .request(ServiceRequest::new("update"))
        .await
        .unwrap()
        .changes
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, FsChange::Created);
    assert_eq!(changes[0].path, library.path("B"));

    handle.shutdown().await.unwrap();
    owner.await.unwrap().unwrap();
}

#[tokio::test]
async fn stdio_transport_answers_each_line() {
    let library = Library::new();
    library.album("A", &["01.flac"]);
    let (handle, owner, _events, _publisher) = start(&library).await;

    let input = b"{\"cmd\":\"ping\",\"correlation_id\":\"c-1\"}\n\n{\"cmd\":\"bogus\"}\n".to_vec();
    let mut output = Vec::new();
    stdio::serve_lines(&handle, None, &input[..], &mut output)
        .await
        .unwrap();

    let lines: Vec<ServiceResponse> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].correlation_id.as_deref(), Some("c-1"));
    assert!(!lines[0].is_error());
    assert_eq!(lines[1].error.as_ref().unwrap().error, "Unknown command: bogus");

    handle.shutdown().await.unwrap();
    owner.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_persists_snapshot_and_closes_handle() {
    let library = Library::new();
    library.album("A", &["01.flac"]);
    let (handle, owner, _events, _publisher) = start(&library).await;

    handle.shutdown().await.unwrap();
    owner.await.unwrap().unwrap();

    assert!(library.snapshot.exists());
    let err = handle.request(ServiceRequest::new("ping")).await.unwrap_err();
    assert!(matches!(err, ApiError::ServiceUnavailable(_)));
}
