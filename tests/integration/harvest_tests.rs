//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to create mock image servers and upload
//! endpoints and run the full pipeline end-to-end.

use image_harvest::archive::{ArchiveSink, ClosedArchive, SavedArchive};
use image_harvest::config::{Config, UploadConfig, UploadMode};
use image_harvest::harvest::Coordinator;
use image_harvest::{
    ArchiveError, ArchiveResult, HarvestError, OutcomeStatus, ProductRecord, RunOutcome,
};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing archives into `dir`
fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.pool_size = 4;
    config.download.per_host_limit = 4;
    config.download.timeout_ms = 2_000;
    config.download.backoff_base_ms = 10;
    config.archive.output_dir = dir.path().join("archives").to_string_lossy().into_owned();
    config
}

fn record(code: &str, links: Vec<String>) -> ProductRecord {
    ProductRecord {
        code: code.to_string(),
        links,
    }
}

fn image(bytes: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "image/jpeg")
        .set_body_bytes(bytes.to_vec())
}

/// Keeps archives in memory instead of writing them out
#[derive(Default)]
struct MemorySink {
    stored: Mutex<Vec<(String, usize)>>,
}

impl ArchiveSink for MemorySink {
    fn store(&self, archive: &ClosedArchive) -> ArchiveResult<PathBuf> {
        self.stored
            .lock()
            .unwrap()
            .push((archive.name.clone(), archive.file_count));
        Ok(PathBuf::from("memory").join(&archive.name))
    }
}

/// Refuses every archive
struct FullDiskSink;

impl ArchiveSink for FullDiskSink {
    fn store(&self, _archive: &ClosedArchive) -> ArchiveResult<PathBuf> {
        Err(ArchiveError::Io(std::io::Error::other("no space left on device")))
    }
}

/// Reads back the entry names and contents of a saved archive
fn archive_entries(archive: &SavedArchive) -> Vec<(String, Vec<u8>)> {
    let file = File::open(&archive.path).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut entry = zip.by_index(i).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            (entry.name().to_string(), data)
        })
        .collect()
}

#[tokio::test]
async fn test_full_run_single_archive() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    for i in 1..=3 {
        Mock::given(method("GET"))
            .and(path(format!("/img/{}.jpg", i)))
            .respond_with(image(format!("image-{}", i).as_bytes()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let base = server.uri();
    let records = vec![
        record(
            "A1",
            vec![format!("{}/img/1.jpg", base), format!("{}/img/2.jpg", base)],
        ),
        record("B2", vec![format!("{}/img/3.jpg", base)]),
    ];

    let report = Coordinator::new(create_test_config(&dir), records)
        .run()
        .await
        .unwrap();

    assert_eq!(report.summary.outcome, RunOutcome::Completed);
    assert_eq!(report.summary.total_jobs, 3);
    assert_eq!(report.rows.len(), 3);
    assert!(report.rows.iter().all(|r| r.status == OutcomeStatus::Ok));
    assert!(report.rows.iter().all(|r| r.http_status == Some(200)));

    assert_eq!(report.archives.len(), 1);
    let archive = &report.archives[0];
    assert!(archive.name.starts_with("images_part01_"));
    assert!(archive.path.exists());

    let mut names: Vec<String> = archive_entries(archive).into_iter().map(|(n, _)| n).collect();
    names.sort();
    assert_eq!(names, vec!["A1_01.jpg", "A1_02.jpg", "B2_01.jpg"]);
}

#[tokio::test]
async fn test_max_files_one_produces_two_archives() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/1.jpg"))
        .respond_with(image(b"first"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(b"second".to_vec()),
        )
        .mount(&server)
        .await;

    let mut config = create_test_config(&dir);
    config.archive.max_files = 1;

    let base = server.uri();
    let records = vec![record(
        "A1",
        vec![format!("{}/1.jpg", base), format!("{}/2.png", base)],
    )];

    let report = Coordinator::new(config, records).run().await.unwrap();

    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.archives.len(), 2);

    let mut archives = report.archives.clone();
    archives.sort_by_key(|a| a.index);
    assert_eq!(archives[0].index, 1);
    assert_eq!(archives[1].index, 2);
    assert!(archives[0].name.starts_with("images_part01_"));
    assert!(archives[1].name.starts_with("images_part02_"));

    for archive in &archives {
        assert_eq!(archive.file_count, 1);
        assert_eq!(archive_entries(archive).len(), 1);
    }

    let mut indexes: Vec<u32> = report.rows.iter().filter_map(|r| r.archive_index).collect();
    indexes.sort();
    assert_eq!(indexes, vec![1, 2]);
}

#[tokio::test]
async fn test_server_error_retried_then_failed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/broken.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = create_test_config(&dir);
    config.download.retry_attempts = 3;

    let records = vec![record("A1", vec![format!("{}/broken.jpg", server.uri())])];
    let report = Coordinator::new(config, records).run().await.unwrap();

    assert_eq!(report.rows.len(), 1);
    let row = &report.rows[0];
    assert_eq!(row.status, OutcomeStatus::Fail);
    assert_eq!(row.http_status, None);
    assert_eq!(row.error_message.as_deref(), Some("HTTP 500"));

    assert_eq!(report.summary.outcome, RunOutcome::CompletedWithFailures(1));
    assert!(report.archives.is_empty());
    assert_eq!(report.failures().len(), 1);
}

#[tokio::test]
async fn test_allow_list_excludes_other_hosts() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/ok.jpg"))
        .respond_with(image(b"ok"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(&dir);
    config.hosts.allow = vec!["127.0.0.1".to_string()];

    let records = vec![record(
        "A1",
        vec![
            format!("{}/ok.jpg", server.uri()),
            "https://other.com/skip.jpg".to_string(),
        ],
    )];

    let report = Coordinator::new(config, records).run().await.unwrap();

    assert_eq!(report.summary.total_jobs, 1);
    assert_eq!(report.rows.len(), 1);
    assert!(report.rows.iter().all(|r| !r.url.contains("other.com")));
}

#[tokio::test]
async fn test_no_matching_links() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.hosts.allow = vec!["cdn.example.com".to_string()];

    let records = vec![record("A1", vec!["https://other.com/a.jpg".to_string()])];
    let report = Coordinator::new(config, records).run().await.unwrap();

    assert_eq!(report.summary.outcome, RunOutcome::NoMatchingLinks);
    assert_eq!(report.summary.outcome.to_string(), "no matching links");
    assert!(report.rows.is_empty());
}

#[tokio::test]
async fn test_non_image_content_is_rejected_without_retry() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/page.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html></html>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let records = vec![record("A1", vec![format!("{}/page.jpg", server.uri())])];
    let report = Coordinator::new(create_test_config(&dir), records)
        .run()
        .await
        .unwrap();

    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].status, OutcomeStatus::Fail);
    assert!(report.rows[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("text/html"));
}

#[tokio::test]
async fn test_group_by_code_nests_entries() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(image(b"img"))
        .mount(&server)
        .await;

    let mut config = create_test_config(&dir);
    config.archive.group_by_code = true;
    config.archive.naming_pattern = "{seq}{ext}".to_string();

    let records = vec![record("SKU-9", vec![format!("{}/a.jpg", server.uri())])];
    let report = Coordinator::new(config, records).run().await.unwrap();

    let entries = archive_entries(&report.archives[0]);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "SKU-9/01.jpg");
    assert_eq!(entries[0].1, b"img".to_vec());
    assert_eq!(report.rows[0].final_path.as_deref(), Some("SKU-9/01.jpg"));
}

#[tokio::test]
async fn test_per_host_limit_bounds_concurrency() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(image(b"slow").set_delay(Duration::from_millis(100)))
        .expect(8)
        .mount(&server)
        .await;

    let mut config = create_test_config(&dir);
    config.download.pool_size = 8;
    config.download.per_host_limit = 2;

    let links = (1..=8)
        .map(|i| format!("{}/{}.jpg", server.uri(), i))
        .collect();
    let started = Instant::now();
    let report = Coordinator::new(config, vec![record("A1", links)])
        .run()
        .await
        .unwrap();

    // 8 requests, 2 at a time, 100ms each
    assert!(started.elapsed() >= Duration::from_millis(380));
    assert_eq!(report.rows.len(), 8);
}

#[tokio::test]
async fn test_cancel_stops_new_jobs() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(image(b"slow").set_delay(Duration::from_millis(150)))
        .mount(&server)
        .await;

    let mut config = create_test_config(&dir);
    config.download.pool_size = 2;
    config.download.per_host_limit = 2;

    let links = (1..=20)
        .map(|i| format!("{}/{}.jpg", server.uri(), i))
        .collect();
    let coordinator = Coordinator::new(config, vec![record("A1", links)]);
    let control = coordinator.control();
    let mut progress = coordinator.subscribe_progress();

    let watcher = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            if progress.borrow().completed >= 2 {
                control.cancel();
                break;
            }
        }
    });

    let report = coordinator.run().await.unwrap();
    watcher.await.unwrap();

    let requested = server.received_requests().await.unwrap().len();
    assert!(report.rows.len() <= requested);
    assert!(requested < 20);
    assert!(matches!(
        report.summary.outcome,
        RunOutcome::Cancelled { total: 20, .. }
    ));
    assert_eq!(report.summary.completed, report.rows.len());

    // What was fetched before cancelling still lands in an archive
    let archived: usize = report.archives.iter().map(|a| a.file_count).sum();
    assert_eq!(archived, report.rows.iter().filter(|r| r.is_ok()).count());
}

#[tokio::test]
async fn test_pause_holds_workers_until_resume() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(image(b"img"))
        .expect(3)
        .mount(&server)
        .await;

    let links = (1..=3)
        .map(|i| format!("{}/{}.jpg", server.uri(), i))
        .collect();
    let coordinator = Coordinator::new(create_test_config(&dir), vec![record("A1", links)]);
    let control = coordinator.control();
    control.pause();

    let run = tokio::spawn(async move { coordinator.run().await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(!run.is_finished());

    control.resume();
    let report = run.await.unwrap().unwrap();
    assert_eq!(report.rows.len(), 3);
    assert_eq!(report.summary.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn test_upload_falls_back_to_json_envelope() {
    let images = MockServer::start().await;
    let endpoint = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(image(b"img"))
        .mount(&images)
        .await;

    Mock::given(method("POST"))
        .and(path("/exec"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unsupported payload format"))
        .expect(1)
        .mount(&endpoint)
        .await;

    Mock::given(method("POST"))
        .and(path("/exec"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "webViewLink": "https://drive.example.com/file/1"
        })))
        .expect(1)
        .mount(&endpoint)
        .await;

    let mut config = create_test_config(&dir);
    config.upload = Some(UploadConfig {
        endpoint: format!("{}/exec", endpoint.uri()),
        folder_id: Some("folder-1".to_string()),
        session: None,
        concurrency: 2,
        mode: UploadMode::Archives,
    });

    let records = vec![record("A1", vec![format!("{}/1.jpg", images.uri())])];
    let report = Coordinator::new(config, records).run().await.unwrap();

    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.uploads.len(), 1);

    let upload = &report.uploads[0];
    assert_eq!(upload.status, OutcomeStatus::Ok);
    assert_eq!(
        upload.remote_ref.as_deref(),
        Some("https://drive.example.com/file/1")
    );
    assert_eq!(upload.archive_index, Some(1));
    assert_eq!(report.summary.uploads_ok, 1);

    // The multipart body is not JSON; only the envelope parses
    let requests = endpoint.received_requests().await.unwrap();
    let body = requests
        .iter()
        .find_map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).ok())
        .unwrap();
    assert_eq!(body["folderId"], "folder-1");
    assert_eq!(body["type"], "application/zip");
    assert!(body["data"].as_str().unwrap().len() > 0);
}

#[tokio::test]
async fn test_upload_fails_when_both_strategies_fail() {
    let images = MockServer::start().await;
    let endpoint = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(image(b"img"))
        .mount(&images)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": false,
            "error": "folder not found"
        })))
        .expect(2)
        .mount(&endpoint)
        .await;

    let mut config = create_test_config(&dir);
    config.upload = Some(UploadConfig {
        endpoint: format!("{}/exec", endpoint.uri()),
        folder_id: None,
        session: None,
        concurrency: 1,
        mode: UploadMode::Files,
    });

    let records = vec![record("A1", vec![format!("{}/1.jpg", images.uri())])];
    let report = Coordinator::new(config, records).run().await.unwrap();

    assert_eq!(report.uploads.len(), 1);
    let upload = &report.uploads[0];
    assert_eq!(upload.status, OutcomeStatus::Fail);
    assert_eq!(upload.code, "A1");
    assert_eq!(upload.final_path.as_deref(), Some("A1_01.jpg"));
    assert!(upload
        .error_message
        .as_deref()
        .unwrap()
        .contains("folder not found"));
    assert_eq!(report.summary.uploads_failed, 1);
    // The download itself still succeeded
    assert_eq!(report.summary.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn test_custom_sink_receives_archives() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(image(b"img"))
        .mount(&server)
        .await;

    let links = (1..=2)
        .map(|i| format!("{}/{}.jpg", server.uri(), i))
        .collect();
    let sink = Arc::new(MemorySink::default());
    let report = Coordinator::new(create_test_config(&dir), vec![record("A1", links)])
        .with_sink(sink.clone())
        .run()
        .await
        .unwrap();

    let stored = sink.stored.lock().unwrap().clone();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].1, 2);
    assert_eq!(report.archives[0].path, PathBuf::from("memory").join(&stored[0].0));
    // Nothing touched the configured output directory
    assert!(!dir.path().join("archives").exists());
}

#[tokio::test]
async fn test_sink_failure_aborts_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(image(b"img"))
        .mount(&server)
        .await;

    let records = vec![record("A1", vec![format!("{}/1.jpg", server.uri())])];
    let result = Coordinator::new(create_test_config(&dir), records)
        .with_sink(Arc::new(FullDiskSink))
        .run()
        .await;

    assert!(matches!(result, Err(HarvestError::Archive(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_large_payloads_on_multi_thread_runtime() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let payload: Vec<u8> = (0..3_000_000u32).map(|i| (i * 31 % 251) as u8).collect();
    Mock::given(method("GET"))
        .respond_with(image(&payload))
        .expect(6)
        .mount(&server)
        .await;

    let links = (1..=6)
        .map(|i| format!("{}/{}.jpg", server.uri(), i))
        .collect();
    let report = Coordinator::new(create_test_config(&dir), vec![record("A1", links)])
        .run()
        .await
        .unwrap();

    assert_eq!(report.summary.outcome, RunOutcome::Completed);
    assert_eq!(report.rows.len(), 6);
    assert!(report.rows.iter().all(|r| r.byte_size == Some(3_000_000)));

    let entries: Vec<(String, Vec<u8>)> = report.archives.iter().flat_map(archive_entries).collect();
    assert_eq!(entries.len(), 6);
    assert!(entries.iter().all(|(_, data)| *data == payload));
}

#[tokio::test]
async fn test_file_uploads_share_host_limit_without_stalling() {
    let images = MockServer::start().await;
    let endpoint = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(image(b"img"))
        .expect(5)
        .mount(&images)
        .await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "ok": true, "url": "https://remote/x" }))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(5)
        .mount(&endpoint)
        .await;

    // Both servers live on 127.0.0.1, so downloads and uploads share one slot
    let mut config = create_test_config(&dir);
    config.download.per_host_limit = 1;
    config.upload = Some(UploadConfig {
        endpoint: format!("{}/exec", endpoint.uri()),
        folder_id: None,
        session: None,
        concurrency: 1,
        mode: UploadMode::Files,
    });

    let links = (1..=5)
        .map(|i| format!("{}/{}.jpg", images.uri(), i))
        .collect();
    let coordinator = Coordinator::new(config, vec![record("A1", links)]);
    let run = coordinator.run();
    let report = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.rows.len(), 5);
    assert_eq!(report.uploads.len(), 5);
    assert_eq!(report.summary.uploads_ok, 5);
}
