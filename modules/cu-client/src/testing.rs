//! Scripted transport for exercising the client without a network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Method;

use crate::error::Result;
use crate::transport::{HttpRequest, HttpResponse, RequestBody, Transport};
use crate::{CuClient, CuConfig, Credential, PollSettings, RetryPolicy};

pub const TEST_ENDPOINT: &str = "https://cu.test";
pub const TEST_API_VERSION: &str = "2024-12-01-preview";

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub json: Option<serde_json::Value>,
    pub bytes: Option<Vec<u8>>,
}

impl RecordedRequest {
    /// `url` field of a JSON analyze body, if any.
    pub fn body_url(&self) -> Option<&str> {
        self.json.as_ref()?.get("url")?.as_str()
    }
}

type Responder = dyn Fn(&RecordedRequest) -> Result<HttpResponse> + Send + Sync;

/// Transport that answers every request through a closure and records
/// what it was sent.
pub struct MockTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&RecordedRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, url_fragment: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.contains(url_fragment))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let (json, bytes) = match request.body {
            RequestBody::Empty => (None, None),
            RequestBody::Json(v) => (Some(v), None),
            RequestBody::Bytes(b) => (None, Some(b.to_vec())),
        };
        let recorded = RecordedRequest {
            method: request.method,
            url: request.url,
            json,
            bytes,
        };
        self.requests.lock().unwrap().push(recorded.clone());
        (self.responder)(&recorded)
    }
}

/// 201 with an Operation-Location pointing at `location`.
pub fn accepted(status: u16, location: &str) -> HttpResponse {
    HttpResponse::new(status).with_header("Operation-Location", location)
}

/// Poll body with the given status string.
pub fn poll_status(status: &str) -> HttpResponse {
    HttpResponse::new(200).with_json(&serde_json::json!({ "status": status }))
}

/// Succeeded analyze poll body with one content item.
pub fn analyze_succeeded(markdown: &str, fields: serde_json::Value) -> HttpResponse {
    HttpResponse::new(200).with_json(&serde_json::json!({
        "status": "Succeeded",
        "result": {
            "analyzerId": "test",
            "contents": [{ "markdown": markdown, "fields": fields }]
        }
    }))
}

/// Client wired to a mock transport with no retry delay and fast polling.
pub fn test_client(transport: Arc<MockTransport>) -> CuClient {
    let mut config = CuConfig::new(TEST_ENDPOINT, TEST_API_VERSION);
    config.subscription_key = Some("test-key".to_string());
    CuClient::with_transport(&config, Credential::subscription_key("test-key"), transport)
        .expect("test config is valid")
        .with_retry_policy(RetryPolicy::immediate(3))
        .with_poll_settings(
            PollSettings::builder()
                .timeout(std::time::Duration::from_secs(10))
                .interval(std::time::Duration::from_millis(10))
                .build(),
        )
}
