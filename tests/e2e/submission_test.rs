// Submission pipeline against a local HTTP responder

use super::test_harness::{closed_addr, contains, CannedResponse, Responder};
use inkmark::submission::{
    Endpoints, HttpTransport, PipelineOptions, ScanVerdict, SubmissionError, SubmissionPipeline,
    SubmissionStatus, UploadFile, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PROTECTED_PATH,
    DEFAULT_UNPROTECTED_PATH, GENERIC_FAILURE_MESSAGE,
};
use inkmark::watermark::FilenamePolicy;
use serde_json::json;
use std::time::Duration;

fn pipeline(base_url: &str, policy: FilenamePolicy) -> SubmissionPipeline<HttpTransport> {
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    SubmissionPipeline::new(
        transport,
        PipelineOptions {
            endpoints: Endpoints::new(base_url, DEFAULT_PROTECTED_PATH, DEFAULT_UNPROTECTED_PATH),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            filename_policy: policy,
        },
    )
}

#[tokio::test]
async fn test_clean_scan_succeeds_with_payload_verbatim() {
    let body = json!({
        "scan_result_code": 0,
        "scan_results": {"status": "clean", "fileName": "report.txt", "scanId": "abc"}
    });
    let server = Responder::start(CannedResponse::json(200, body.clone())).await;
    let mut pipeline = pipeline(&server.base_url(), FilenamePolicy::Sanitize);

    let file = UploadFile::new(&b"quarterly numbers"[..], "report.txt").with_mime("text/plain");
    let result = pipeline.submit(&file, true).await.unwrap();

    assert_eq!(result.status, SubmissionStatus::Succeeded);
    assert_eq!(result.payload, Some(body));
    assert_eq!(result.verdict(), Some(ScanVerdict::Clean));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.starts_with(b"POST /api/sdk/upload HTTP/1.1"));
    assert!(contains(request, b"name=\"file\"; filename=\"report.txt\""));
    assert!(contains(request, b"quarterly numbers"));
}

#[tokio::test]
async fn test_unprotected_endpoint_selected() {
    let body = json!({"scan_result_code": -4, "scan_results": {"status": "vulnerable"}});
    let server = Responder::start(CannedResponse::json(200, body)).await;
    let mut pipeline = pipeline(&server.base_url(), FilenamePolicy::Preserve);

    let file = UploadFile::new(&b"x"[..], "../../../tmp/evil.sh");
    let result = pipeline.submit(&file, false).await.unwrap();

    assert_eq!(result.verdict(), Some(ScanVerdict::Unscanned));
    let request = &server.requests()[0];
    assert!(request.starts_with(b"POST /api/sdk/upload-vulnerable HTTP/1.1"));
    assert!(contains(request, b"filename=\"../../../tmp/evil.sh\""));
}

#[tokio::test]
async fn test_blocked_file_shows_server_reason() {
    let body = json!({"scan_result_code": 1, "reason": "Malware detected: Eicar_test_file"});
    let server = Responder::start(CannedResponse::json(403, body)).await;
    let mut pipeline = pipeline(&server.base_url(), FilenamePolicy::Sanitize);

    let result = pipeline
        .submit(&UploadFile::new(&b"X5O!P%@AP"[..], "eicar.com"), true)
        .await
        .unwrap();

    assert_eq!(result.status, SubmissionStatus::Failed);
    assert_eq!(
        result.error_message.as_deref(),
        Some("Malware detected: Eicar_test_file")
    );
    assert!(result.server_rejection);
    assert_eq!(result.http_status, Some(403));
}

#[tokio::test]
async fn test_plain_text_server_error_is_generic() {
    let server = Responder::start(CannedResponse::text(500, "Scan failed: timeout\n")).await;
    let mut pipeline = pipeline(&server.base_url(), FilenamePolicy::Sanitize);

    let result = pipeline
        .submit(&UploadFile::new(&b"x"[..], "a.txt"), true)
        .await
        .unwrap();

    assert_eq!(result.status, SubmissionStatus::Failed);
    assert_eq!(result.error_message.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
    assert!(!result.server_rejection);
}

#[tokio::test]
async fn test_connection_refused_is_generic_failure() {
    let addr = closed_addr().await;
    let mut pipeline = pipeline(&format!("http://{}", addr), FilenamePolicy::Sanitize);

    let result = pipeline
        .submit(&UploadFile::new(&b"x"[..], "a.txt"), true)
        .await
        .unwrap();

    assert_eq!(result.status, SubmissionStatus::Failed);
    assert_eq!(result.error_message.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
    assert_eq!(result.http_status, None);

    // The pipeline is usable again after a failure
    assert!(!pipeline.is_in_flight());
}

#[tokio::test]
async fn test_oversized_protected_upload_never_reaches_server() {
    let server = Responder::start(CannedResponse::json(200, json!({}))).await;
    let mut pipeline = pipeline(&server.base_url(), FilenamePolicy::Sanitize);

    let file = UploadFile::new(vec![7u8; (10 << 20) + 1], "huge.bin");
    let err = pipeline.submit(&file, true).await.unwrap_err();

    assert!(matches!(err, SubmissionError::FileTooLarge { .. }));
    assert_eq!(server.hits(), 0);
    assert!(pipeline.result().is_none());
}
