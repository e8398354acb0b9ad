//! Analyzer lifecycle tests: MOCK TRANSPORT → CLIENT CALL → ASSERT.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use cu_client::testing::*;
use cu_client::{
    AnalyzerTemplate, CuError, HttpResponse, Operation, OperationKind, TrainingData,
};
use reqwest::Method;
use serde_json::json;

fn invoice_template() -> serde_json::Value {
    json!({
        "description": "Invoice analyzer",
        "baseAnalyzerId": "prebuilt-documentAnalyzer",
        "fieldSchema": {
            "fields": {
                "CompanyName": { "type": "string", "method": "extract" }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// exists
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exists_maps_404_to_false_and_200_to_true() {
    let transport = MockTransport::new(|req| {
        if req.url.contains("/analyzers/present?") {
            Ok(HttpResponse::new(200).with_json(&json!({"analyzerId": "present"})))
        } else if req.url.contains("/analyzers/absent?") {
            Ok(HttpResponse::new(404))
        } else {
            Ok(HttpResponse::new(500))
        }
    });
    let client = test_client(transport.clone());

    assert!(client.exists("present").await.unwrap());
    assert!(!client.exists("absent").await.unwrap());
    match client.exists("broken").await {
        Err(CuError::Transport { status, .. }) => assert_eq!(status, 500),
        other => panic!("expected transport error, got {other:?}"),
    }

    let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls[0],
        format!("{TEST_ENDPOINT}/contentunderstanding/analyzers/present?api-version={TEST_API_VERSION}")
    );
}

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_with_empty_schema_fails_before_any_request() {
    let transport = MockTransport::new(|_| Ok(HttpResponse::new(201)));
    let client = test_client(transport.clone());

    let err = client.create_analyzer("a1", &json!({})).await.unwrap_err();
    assert!(matches!(err, CuError::Validation(_)));

    let err = client
        .create_analyzer("a1", &AnalyzerTemplate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CuError::Validation(_)));

    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn create_returns_operation_from_header() {
    let transport =
        MockTransport::new(|_| Ok(accepted(201, "https://cu.test/operations/create-1?api-version=v")));
    let client = test_client(transport.clone());

    let op = client
        .create_analyzer("invoice", &invoice_template())
        .await
        .unwrap();

    assert_eq!(op.kind(), OperationKind::CreateAnalyzer);
    assert_eq!(op.id(), "create-1");
    assert_eq!(op.analyzer_id(), "invoice");

    let sent = &transport.requests()[0];
    assert_eq!(sent.method, Method::PUT);
    assert_eq!(sent.json.as_ref().unwrap()["description"], "Invoice analyzer");
}

#[tokio::test]
async fn create_requires_201() {
    let transport = MockTransport::new(|_| Ok(accepted(200, "https://cu.test/operations/x")));
    let client = test_client(transport);

    match client.create_analyzer("invoice", &invoice_template()).await {
        Err(CuError::Transport { status, .. }) => assert_eq!(status, 200),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn create_without_operation_location_is_an_error() {
    let transport = MockTransport::new(|_| Ok(HttpResponse::new(201)));
    let client = test_client(transport);

    let err = client
        .create_analyzer("invoice", &invoice_template())
        .await
        .unwrap_err();
    assert!(matches!(err, CuError::MissingOperationLocation(_)));
}

#[tokio::test]
async fn training_data_is_attached_to_template() {
    let transport = MockTransport::new(|_| Ok(accepted(201, "https://cu.test/operations/c")));
    let client = test_client(transport.clone());

    client
        .create_analyzer_with_training_data(
            "trained",
            &invoice_template(),
            &TrainingData::blob("https://acct.blob/container?sig=abc", "dataset/v1"),
        )
        .await
        .unwrap();

    let body = transport.requests()[0].json.clone().unwrap();
    assert_eq!(
        body["trainingData"],
        json!({
            "kind": "blob",
            "containerUrl": "https://acct.blob/container?sig=abc",
            "prefix": "dataset/v1"
        })
    );
}

// ---------------------------------------------------------------------------
// await_completion
// ---------------------------------------------------------------------------

fn scripted_polls(statuses: &[&'static str]) -> Mutex<VecDeque<&'static str>> {
    Mutex::new(statuses.iter().copied().collect())
}

#[tokio::test(start_paused = true)]
async fn await_completion_returns_after_three_polls() {
    let script = scripted_polls(&["running", "running", "succeeded"]);
    let transport = MockTransport::new(move |_| {
        let status = script.lock().unwrap().pop_front().unwrap_or("succeeded");
        Ok(poll_status(status))
    });
    let client = test_client(transport.clone());
    let op = Operation::new("https://cu.test/operations/op-3", OperationKind::Analyze, "a");

    let start = tokio::time::Instant::now();
    let outcome = client
        .await_completion(&op, Duration::from_secs(10), Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(outcome.payload["status"], "succeeded");
    assert_eq!(outcome.operation_id, "op-3");
    assert_eq!(transport.count(Method::GET, "/operations/op-3"), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn await_completion_times_out_while_running() {
    let transport = MockTransport::new(|_| Ok(poll_status("running")));
    let client = test_client(transport.clone());
    let op = Operation::new("https://cu.test/operations/slow", OperationKind::Analyze, "a");

    let err = client
        .await_completion(&op, Duration::from_secs(1), Duration::from_millis(400))
        .await
        .unwrap_err();

    assert!(matches!(err, CuError::Timeout { .. }));
    // Polls at 0ms, 400ms, 800ms; the deadline check at 1200ms stops the loop.
    assert_eq!(transport.count(Method::GET, "/operations/slow"), 3);
}

#[tokio::test(start_paused = true)]
async fn failed_status_is_remote_operation_error() {
    let transport = MockTransport::new(|_| {
        Ok(HttpResponse::new(200).with_json(&json!({
            "status": "Failed",
            "error": { "code": "InvalidRequest", "message": "bad schema" }
        })))
    });
    let client = test_client(transport);
    let op = Operation::new("https://cu.test/operations/f", OperationKind::CreateAnalyzer, "a");

    match client
        .await_completion(&op, Duration::from_secs(10), Duration::from_secs(1))
        .await
    {
        Err(CuError::RemoteOperation { operation, detail }) => {
            assert_eq!(operation, "f");
            assert!(detail.contains("bad schema"));
        }
        other => panic!("expected remote operation error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn transient_poll_failure_counts_as_a_tick() {
    let calls = Mutex::new(0u32);
    let transport = MockTransport::new(move |_| {
        let mut n = calls.lock().unwrap();
        *n += 1;
        match *n {
            1 => Err(CuError::Network("connection reset".into())),
            2 => Ok(HttpResponse::new(503)),
            _ => Ok(poll_status("Succeeded")),
        }
    });
    let client = test_client(transport.clone());
    let op = Operation::new("https://cu.test/operations/t", OperationKind::Analyze, "a");

    client
        .await_completion(&op, Duration::from_secs(10), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(transport.count(Method::GET, "/operations/t"), 3);
}

#[tokio::test(start_paused = true)]
async fn client_error_on_poll_aborts() {
    let transport = MockTransport::new(|_| Ok(HttpResponse::new(401)));
    let client = test_client(transport.clone());
    let op = Operation::new("https://cu.test/operations/u", OperationKind::Analyze, "a");

    let err = client
        .await_completion(&op, Duration::from_secs(10), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, CuError::Transport { status: 401, .. }));
    assert_eq!(transport.requests().len(), 1);
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

#[tokio::test]
async fn analyze_url_is_sent_as_json_reference() {
    let transport = MockTransport::new(|_| Ok(accepted(202, "https://cu.test/results/r1")));
    let client = test_client(transport.clone());

    let op = client
        .analyze("invoice", "https://files.example.com/invoice.pdf")
        .await
        .unwrap();
    assert_eq!(op.kind(), OperationKind::Analyze);

    let sent = &transport.requests()[0];
    assert_eq!(sent.method, Method::POST);
    assert!(sent.url.contains("/analyzers/invoice:analyze?api-version="));
    assert_eq!(sent.body_url(), Some("https://files.example.com/invoice.pdf"));
}

#[tokio::test]
async fn analyze_local_path_uploads_bytes() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"%PDF-1.7 test").unwrap();
    let path = file.path().to_string_lossy().into_owned();

    let transport = MockTransport::new(|_| Ok(accepted(202, "https://cu.test/results/r2")));
    let client = test_client(transport.clone());

    client.analyze("invoice", &path).await.unwrap();

    let sent = &transport.requests()[0];
    assert_eq!(sent.bytes.as_deref(), Some(&b"%PDF-1.7 test"[..]));
    assert!(sent.json.is_none());
}

#[tokio::test]
async fn analyze_rejects_unknown_location_without_requests() {
    let transport = MockTransport::new(|_| Ok(accepted(202, "https://cu.test/results/r")));
    let client = test_client(transport.clone());

    for location in ["not/a/real/file.pdf", "ftp://files.example.com/a.pdf", ""] {
        let err = client.analyze("invoice", location).await.unwrap_err();
        assert!(matches!(err, CuError::Validation(_)), "{location}");
    }
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn analyze_submission_is_retried_then_propagates() {
    let transport = MockTransport::new(|_| Ok(HttpResponse::new(429)));
    let client = test_client(transport.clone());

    let err = client
        .analyze("invoice", "https://files.example.com/a.pdf")
        .await
        .unwrap_err();

    assert!(matches!(err, CuError::Transport { status: 429, .. }));
    // test_client allows three attempts
    assert_eq!(transport.count(Method::POST, ":analyze"), 3);
}

// ---------------------------------------------------------------------------
// delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_requires_204() {
    let transport = MockTransport::new(|req| {
        if req.url.contains("/analyzers/gone?") {
            Ok(HttpResponse::new(204))
        } else {
            Ok(HttpResponse::new(200))
        }
    });
    let client = test_client(transport);

    client.delete_analyzer("gone").await.unwrap();
    assert!(matches!(
        client.delete_analyzer("other").await,
        Err(CuError::Transport { status: 200, .. })
    ));
}

// ---------------------------------------------------------------------------
// list / get / images
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_and_get_analyzers() {
    let transport = MockTransport::new(|req| {
        if req.url.contains("/analyzers?api-version") {
            Ok(HttpResponse::new(200).with_json(&json!({
                "value": [
                    { "analyzerId": "prebuilt-documentAnalyzer", "status": "ready" },
                    { "analyzerId": "invoice", "description": "Invoices" }
                ]
            })))
        } else {
            Ok(HttpResponse::new(200).with_json(&json!({
                "analyzerId": "invoice",
                "description": "Invoices",
                "fieldSchema": { "fields": {} }
            })))
        }
    });
    let client = test_client(transport);

    let all = client.list_analyzers().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].status.as_deref(), Some("ready"));

    let one = client.get_analyzer("invoice").await.unwrap();
    assert_eq!(one.description.as_deref(), Some("Invoices"));
    assert!(one.field_schema.is_some());
}

#[tokio::test]
async fn result_image_url_is_built_from_operation_location() {
    let transport = MockTransport::new(|req| {
        assert!(req
            .url
            .ends_with("/analyzerResults/r9/images/face-1?api-version=2024-12-01-preview"));
        Ok(HttpResponse::new(200).with_header("content-type", "image/jpeg"))
    });
    let client = test_client(transport);
    let op = Operation::new(
        "https://cu.test/contentunderstanding/analyzerResults/r9?api-version=2024-12-01-preview",
        OperationKind::Analyze,
        "video",
    );

    client.get_result_image(&op, "face-1").await.unwrap();
}
