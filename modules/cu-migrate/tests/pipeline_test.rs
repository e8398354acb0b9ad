use std::path::Path;
use std::sync::Arc;

use cu_client::testing::*;
use cu_client::HttpResponse;
use cu_migrate::config::DEFAULT_RESULT_OUTPUT;
use cu_migrate::{run_migration, MigrationConfig, MigrationContext};
use cu_schema::DiVersion;
use reqwest::Method;
use serde_json::{json, Value};

const SAMPLE_URL: &str = "https://files.example.com/sample.pdf";

fn neural_fields() -> Value {
    json!({
        "fields": [
            {"fieldKey": "Vendor Name", "fieldType": "string", "fieldFormat": "not-specified"},
            {"fieldKey": "Approver", "fieldType": "signature", "fieldFormat": "not-specified"},
            {"fieldKey": "Lines", "fieldType": "array", "itemType": "Lines_object"}
        ],
        "definitions": {
            "Lines_object": {"fieldKey": "Lines_object", "fieldType": "object", "fields": [
                {"fieldKey": "Amount", "fieldType": "currency"}
            ]}
        }
    })
}

fn labels() -> Value {
    json!({
        "document": "invoice.pdf",
        "labels": [
            {"label": "Vendor Name", "value": [{"page": 1, "text": "Contoso"}]},
            {"label": "Approver", "value": [{"page": 2, "text": ""}]},
            {"label": "Lines/0/Amount", "value": [{"page": 1, "text": "12.00"}]}
        ]
    })
}

struct Fixture {
    source: tempfile::TempDir,
    target: tempfile::TempDir,
    container: tempfile::TempDir,
    output: tempfile::TempDir,
}

impl Fixture {
    async fn new(fields: Value) -> Self {
        let fixture = Self {
            source: tempfile::tempdir().unwrap(),
            target: tempfile::tempdir().unwrap(),
            container: tempfile::tempdir().unwrap(),
            output: tempfile::tempdir().unwrap(),
        };
        let write = |name: &str, body: Vec<u8>| {
            let path = fixture.source.path().join(name);
            async move { tokio::fs::write(path, body).await.unwrap() }
        };
        write("fields.json", fields.to_string().into_bytes()).await;
        write("invoice.pdf.labels.json", labels().to_string().into_bytes()).await;
        write("invoice.pdf.ocr.json", b"{}".to_vec()).await;
        write("invoice.pdf", b"%PDF-1.7".to_vec()).await;
        fixture
    }

    fn config(&self, analyze_file: Option<&str>) -> MigrationConfig {
        MigrationConfig {
            di_version: DiVersion::CustomNeural,
            analyzer_prefix: Some("neural-invoices".into()),
            source_dir: self.source.path().to_path_buf(),
            target_dir: self.target.path().to_path_buf(),
            staging_dir: Some(self.container.path().to_path_buf()),
            training_container_url: "https://store.example/training?sig=abc".into(),
            training_container_prefix: "invoices".into(),
            type_mapping_file: None,
            analyze_file: analyze_file.map(str::to_string),
            result_output: self.output.path().join(DEFAULT_RESULT_OUTPUT),
        }
    }
}

/// Service double: analyzers never pre-exist and every operation succeeds.
fn service() -> Arc<MockTransport> {
    MockTransport::new(|req| {
        let url = req.url.as_str();
        match req.method {
            Method::GET if url.contains("/analyzers/") => Ok(HttpResponse::new(404)),
            Method::PUT => Ok(accepted(201, "https://cu.test/operations/create")),
            Method::GET if url.contains("/operations/") => Ok(poll_status("Succeeded")),
            Method::POST => Ok(accepted(202, "https://cu.test/results/analyze")),
            Method::GET if url.contains("/results/") => {
                Ok(analyze_succeeded("# Invoice", json!({"Vendor_Name": {"type": "string", "valueString": "Contoso"}})))
            }
            Method::DELETE => Ok(HttpResponse::new(204)),
            _ => Ok(HttpResponse::new(418)),
        }
    })
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn migrates_a_neural_dataset_end_to_end() {
    let fixture = Fixture::new(neural_fields()).await;
    let transport = service();
    let ctx = MigrationContext::new(test_client(transport.clone()), fixture.config(Some(SAMPLE_URL))).unwrap();

    let report = run_migration(&ctx).await.unwrap();

    assert_eq!(report.analyzer_id, "neural-invoices");
    assert_eq!(report.field_count, 3);
    assert_eq!(report.dropped_fields, vec!["Approver".to_string()]);
    assert_eq!(report.documents, 1);
    assert!(report.ocr_failures.is_empty());

    // Target dataset: relabeled labels, the document and its layout result.
    let target = fixture.target.path();
    let relabeled = read_json(&target.join("invoice.pdf.labels.json"));
    let paths: Vec<&str> = relabeled["labels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["label"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["Vendor_Name", "Lines/0/Amount"]);
    assert!(target.join("invoice.pdf").exists());
    assert_eq!(read_json(&target.join("invoice.pdf.result.json"))["status"], "Succeeded");
    assert!(!target.join("invoice.pdf.ocr.json").exists());
    let fields = read_json(&target.join("fields.json"));
    assert_eq!(fields["fieldSchema"]["Vendor_Name"]["type"], "string");
    assert!(fields["fieldSchema"].get("Approver").is_none());

    // Staged under the container prefix.
    assert_eq!(report.staged_files, 4);
    assert!(fixture.container.path().join("invoices").join("invoice.pdf.labels.json").exists());

    // The final analyzer carries the converted schema and training data.
    let final_put = transport
        .requests()
        .into_iter()
        .find(|r| r.method == Method::PUT && r.url.contains("/analyzers/neural-invoices?"))
        .unwrap();
    let body = final_put.json.unwrap();
    assert_eq!(body["trainingData"]["kind"], "blob");
    assert_eq!(body["trainingData"]["prefix"], "invoices");
    assert_eq!(body["fieldSchema"]["fields"]["Lines"]["items"]["properties"]["Amount"]["type"], "number");
    assert!(body["fieldSchema"]["fields"].get("Approver").is_none());

    // Layout analyzer is thrown away; the migrated one stays.
    assert_eq!(transport.count(Method::DELETE, "-layout-"), 1);
    assert_eq!(transport.count(Method::DELETE, "/analyzers/neural-invoices?"), 0);

    // Sample analyze result was written.
    let output = report.analyze_output.unwrap();
    assert_eq!(read_json(&output)["result"]["contents"][0]["markdown"], "# Invoice");
}

#[tokio::test]
async fn oversized_schema_stops_before_any_request() {
    let fields: Vec<Value> = (0..101)
        .map(|i| json!({"fieldKey": format!("F{i}"), "fieldType": "string"}))
        .collect();
    let fixture = Fixture::new(json!({"fields": fields, "definitions": {}})).await;
    let transport = service();
    let ctx = MigrationContext::new(test_client(transport.clone()), fixture.config(None)).unwrap();

    let err = run_migration(&ctx).await.unwrap_err();

    assert!(err.to_string().contains("101"));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn failed_layout_ocr_is_reported_not_fatal() {
    let fixture = Fixture::new(neural_fields()).await;
    let transport = MockTransport::new(|req| {
        let url = req.url.as_str();
        match req.method {
            Method::GET if url.contains("/analyzers/") => Ok(HttpResponse::new(404)),
            Method::PUT => Ok(accepted(201, "https://cu.test/operations/create")),
            Method::GET if url.contains("/operations/") => Ok(poll_status("Succeeded")),
            Method::POST => Ok(HttpResponse::new(400)),
            Method::DELETE => Ok(HttpResponse::new(204)),
            _ => Ok(HttpResponse::new(418)),
        }
    });
    let ctx = MigrationContext::new(test_client(transport.clone()), fixture.config(None)).unwrap();

    let report = run_migration(&ctx).await.unwrap();

    assert_eq!(report.ocr_failures.len(), 1);
    assert!(report.ocr_failures[0].ends_with("invoice.pdf"));
    assert!(!fixture.target.path().join("invoice.pdf.result.json").exists());
    assert!(report.analyze_output.is_none());
}
