//! Integration tests for the transfer engine and segment scheduler.
//!
//! These tests verify the resume/retry/skip behavior against mock HTTP
//! servers.

use std::sync::Arc;

use confdl_core::{
    AssumeConnected, DownloadError, DownloadTarget, HttpClient, ProgressLine, RetryLimit,
    SegmentScheduler, TransferEngine,
};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine() -> TransferEngine {
    TransferEngine::new(HttpClient::new(), Arc::new(AssumeConnected))
}

/// Helper to create a mock server with a file endpoint.
async fn setup_mock_file(path_str: &str, content: &[u8]) -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(path_str))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(&mock_server)
        .await;

    mock_server
}

#[tokio::test]
async fn test_transfer_full_flow_preserves_content() {
    let content = b"fake transport stream bytes\x00\x01\x02 across several chunks";
    let mock_server = setup_mock_file("/vod/seg0.ts", content).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let dest = temp_dir.path().join("seg0.ts");
    let target = DownloadTarget::new(format!("{}/vod/seg0.ts", mock_server.uri()), &dest);

    let bytes = engine()
        .transfer(&target, |_| {})
        .await
        .expect("transfer should succeed");

    assert_eq!(bytes, content.len() as u64);
    assert_eq!(std::fs::read(&dest).expect("should read file"), content);
    assert!(
        !target.part_path().exists(),
        "temp file should be gone after the rename"
    );
}

#[tokio::test]
async fn test_transfer_reports_chunk_progress() {
    let content = vec![7u8; 4096];
    let mock_server = setup_mock_file("/vod/seg1.ts", &content).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let target = DownloadTarget::new(
        format!("{}/vod/seg1.ts", mock_server.uri()),
        temp_dir.path().join("seg1.ts"),
    );

    let mut last_file_bytes = 0;
    let mut expected_total = None;
    engine()
        .transfer(&target, |chunk| {
            last_file_bytes = chunk.file_bytes;
            expected_total = chunk.expected_total;
        })
        .await
        .expect("transfer should succeed");

    assert_eq!(last_file_bytes, 4096);
    assert_eq!(expected_total, Some(4096));
}

#[tokio::test]
async fn test_resume_requests_remainder_and_completes_file() {
    let full = b"0123456789abcdef";
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    // Only the ranged request is mounted: a fresh full-file GET would 404,
    // proving the client actually resumed.
    Mock::given(method("GET"))
        .and(path("/vod/big.ts"))
        .and(header("Range", "bytes=6-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Range", "bytes 6-15/16")
                .set_body_bytes(full[6..].to_vec()),
        )
        .mount(&mock_server)
        .await;

    let dest = temp_dir.path().join("big.ts");
    let target = DownloadTarget::new(format!("{}/vod/big.ts", mock_server.uri()), &dest);

    // A previous attempt left the first 6 bytes behind.
    std::fs::write(target.part_path(), &full[..6]).expect("should seed partial file");

    let bytes = engine()
        .transfer(&target, |_| {})
        .await
        .expect("resumed transfer should succeed");

    assert_eq!(bytes, full.len() as u64, "no duplicated or missing ranges");
    assert_eq!(std::fs::read(&dest).expect("should read file"), full);
}

#[tokio::test]
async fn test_server_ignoring_range_restarts_from_zero() {
    let full = b"fresh full body";
    let mock_server = setup_mock_file("/vod/nr.ts", full).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let dest = temp_dir.path().join("nr.ts");
    let target = DownloadTarget::new(format!("{}/vod/nr.ts", mock_server.uri()), &dest);

    // Stale partial content that must NOT survive a 200 answer.
    std::fs::write(target.part_path(), b"stale-junk").expect("should seed partial file");

    engine()
        .transfer(&target, |_| {})
        .await
        .expect("transfer should succeed");

    assert_eq!(std::fs::read(&dest).expect("should read file"), full);
}

#[tokio::test]
async fn test_range_overshoot_restarts_instead_of_failing() {
    let full = b"complete body from before the crash";
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    // A ranged request past the end of the resource gets 416; the engine
    // must treat that as "discard the partial file and start over", not as
    // a permanent failure.
    Mock::given(method("GET"))
        .and(path("/vod/whole.ts"))
        .and(header("Range", format!("bytes={}-", full.len())))
        .respond_with(
            ResponseTemplate::new(416)
                .insert_header("Content-Range", format!("bytes */{}", full.len())),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vod/whole.ts"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(full.to_vec()))
        .mount(&mock_server)
        .await;

    let dest = temp_dir.path().join("whole.ts");
    let target = DownloadTarget::new(format!("{}/vod/whole.ts", mock_server.uri()), &dest);

    // A previous run was killed after the last chunk but before the rename:
    // the partial file already holds every byte.
    std::fs::write(target.part_path(), full).expect("should seed partial file");

    engine()
        .transfer(&target, |_| {})
        .await
        .expect("overshooting resume must recover via a fresh download");

    assert_eq!(std::fs::read(&dest).expect("should read file"), full);
    assert!(!target.part_path().exists());
}

#[tokio::test]
async fn test_transient_failure_retried_until_success() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/vod/flaky.ts"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vod/flaky.ts"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"eventually".to_vec()))
        .mount(&mock_server)
        .await;

    let dest = temp_dir.path().join("flaky.ts");
    let target = DownloadTarget::new(format!("{}/vod/flaky.ts", mock_server.uri()), &dest);

    engine()
        .transfer(&target, |_| {})
        .await
        .expect("retry-forever should outlast two 503s");

    assert_eq!(std::fs::read(&dest).expect("should read file"), b"eventually");
}

#[tokio::test]
async fn test_permanent_failure_leaves_destination_absent() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/vod/gone.ts"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let dest = temp_dir.path().join("gone.ts");
    let target = DownloadTarget::new(format!("{}/vod/gone.ts", mock_server.uri()), &dest);

    let result = engine().transfer(&target, |_| {}).await;

    assert!(matches!(
        result,
        Err(DownloadError::HttpStatus { status: 404, .. })
    ));
    // Atomic visibility: the final path never appeared, and nothing
    // partial lingers either.
    assert!(!dest.exists(), "destination must stay absent on failure");
    assert!(!target.part_path().exists());
}

#[tokio::test]
async fn test_bounded_retries_give_up() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/vod/dead.ts"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let dest = temp_dir.path().join("dead.ts");
    let target = DownloadTarget::new(format!("{}/vod/dead.ts", mock_server.uri()), &dest);

    let engine = TransferEngine::new(HttpClient::new(), Arc::new(AssumeConnected))
        .with_retry_limit(RetryLimit::Bounded(2));
    let result = engine.transfer(&target, |_| {}).await;

    assert!(matches!(
        result,
        Err(DownloadError::RetriesExhausted { attempts: 2, .. })
    ));
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_scheduler_skips_existing_destination_without_network_io() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    // Any request at all fails the test.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dest = temp_dir.path().join("done.ts");
    std::fs::write(&dest, b"previous run").expect("should pre-create destination");

    let engine = engine();
    let scheduler = SegmentScheduler::new(&engine);
    let targets = vec![DownloadTarget::new(
        format!("{}/vod/done.ts", mock_server.uri()),
        &dest,
    )];

    let stats = scheduler
        .fetch_all(&targets, &ProgressLine::hidden())
        .await
        .expect("skip should succeed");

    assert_eq!(stats.completed, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.bytes, 0);
    assert_eq!(
        std::fs::read(&dest).expect("should read file"),
        b"previous run",
        "existing file must be untouched"
    );
}

#[tokio::test]
async fn test_scheduler_fetches_ordered_batch_sequentially() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    for (name, body) in [("s0.ts", "aaa"), ("s1.ts", "bbbb"), ("s2.ts", "cc")] {
        Mock::given(method("GET"))
            .and(path(format!("/vod/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.as_bytes().to_vec()))
            .mount(&mock_server)
            .await;
    }

    let engine = engine();
    let scheduler = SegmentScheduler::new(&engine);
    let targets: Vec<DownloadTarget> = ["s0.ts", "s1.ts", "s2.ts"]
        .iter()
        .map(|name| {
            DownloadTarget::new(
                format!("{}/vod/{name}", mock_server.uri()),
                temp_dir.path().join(name),
            )
        })
        .collect();

    let stats = scheduler
        .fetch_all(&targets, &ProgressLine::hidden())
        .await
        .expect("batch should succeed");

    assert_eq!(stats.completed, 3);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.bytes, 9);
    for target in &targets {
        assert!(target.dest.exists());
    }
}
