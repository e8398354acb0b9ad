pub mod auth;
pub mod batch;
pub mod config;
pub mod error;
pub mod retry;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use auth::{Credential, TokenProvider};
pub use batch::BatchResults;
pub use config::CuConfig;
pub use error::{CuError, Result};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, RequestBody, Transport};
pub use types::{
    AnalyzeResult, AnalyzerConfig, AnalyzerDescriptor, AnalyzerTemplate, ContentItem, FieldValue,
    Operation, OperationKind, OperationOutcome, OperationStatus, TrainingData,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;

use transport::OPERATION_LOCATION;
use types::{AnalyzeUrlRequest, AnalyzerList, PollResponse};

/// Analyze requests in flight at once during a batch.
const MAX_CONCURRENT_ANALYSES: usize = 8;

/// Polling cadence used by the convenience operations.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PollSettings {
    #[builder(default = Duration::from_secs(120))]
    pub timeout: Duration,
    #[builder(default = Duration::from_secs(2))]
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// What `analyze` submits: local bytes or a URL reference.
#[derive(Debug, Clone)]
pub enum FileSource {
    Local { path: PathBuf, bytes: Bytes },
    Url(String),
}

impl FileSource {
    /// An existing local path wins over URL interpretation.
    pub async fn classify(location: &str) -> Result<Self> {
        let path = Path::new(location);
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            let bytes = tokio::fs::read(path).await?;
            return Ok(FileSource::Local {
                path: path.to_path_buf(),
                bytes: Bytes::from(bytes),
            });
        }

        match url::Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                Ok(FileSource::Url(location.to_string()))
            }
            _ => Err(CuError::Validation(format!(
                "file location must be an existing path or an http(s) URL: {location}"
            ))),
        }
    }
}

/// Client for the analyzer-management API. Drives the
/// create → await → analyze → await → delete protocol.
pub struct CuClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_version: String,
    credential: Credential,
    user_agent: String,
    retry: RetryPolicy,
    poll: PollSettings,
    max_concurrency: usize,
}

impl CuClient {
    pub fn new(config: &CuConfig, credential: Credential) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Self::with_transport(config, credential, transport)
    }

    /// Build from config, authenticating with its subscription key.
    pub fn from_config(config: &CuConfig) -> Result<Self> {
        let key = config.subscription_key.clone().ok_or_else(|| {
            CuError::Config("either a subscription key or a token provider must be provided".into())
        })?;
        Self::new(config, Credential::subscription_key(key))
    }

    pub fn with_transport(
        config: &CuConfig,
        credential: Credential,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(CuError::Config("endpoint must be provided".into()));
        }
        if config.api_version.trim().is_empty() {
            return Err(CuError::Config("API version must be provided".into()));
        }

        Ok(Self {
            transport,
            base_url: config.base_url(),
            api_version: config.api_version.clone(),
            credential,
            user_agent: config.user_agent.clone(),
            retry: RetryPolicy::default(),
            poll: PollSettings::default(),
            max_concurrency: MAX_CONCURRENT_ANALYSES,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn poll_settings(&self) -> &PollSettings {
        &self.poll
    }

    fn analyzer_url(&self, analyzer_id: &str) -> String {
        format!(
            "{}/analyzers/{}?api-version={}",
            self.base_url, analyzer_id, self.api_version
        )
    }

    fn analyzer_list_url(&self) -> String {
        format!("{}/analyzers?api-version={}", self.base_url, self.api_version)
    }

    fn analyze_url(&self, analyzer_id: &str) -> String {
        format!(
            "{}/analyzers/{}:analyze?api-version={}",
            self.base_url, analyzer_id, self.api_version
        )
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let headers = self.credential.headers(&self.user_agent)?;
        self.transport.send(request.with_headers(headers)).await
    }

    fn operation_from(
        &self,
        resp: HttpResponse,
        kind: OperationKind,
        analyzer_id: &str,
    ) -> Result<Operation> {
        match resp.header(&OPERATION_LOCATION) {
            Some(location) if !location.is_empty() => {
                Ok(Operation::new(location, kind, analyzer_id))
            }
            _ => Err(CuError::MissingOperationLocation(analyzer_id.to_string())),
        }
    }

    /// Probe whether an analyzer exists.
    pub async fn exists(&self, analyzer_id: &str) -> Result<bool> {
        let resp = self
            .send(HttpRequest::new(Method::GET, self.analyzer_url(analyzer_id)))
            .await?;

        if resp.status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if resp.status.is_success() {
            return Ok(true);
        }
        Err(resp.into_transport_error())
    }

    pub async fn get_analyzer(&self, analyzer_id: &str) -> Result<AnalyzerDescriptor> {
        let resp = self
            .send(HttpRequest::new(Method::GET, self.analyzer_url(analyzer_id)))
            .await?;
        if !resp.status.is_success() {
            return Err(resp.into_transport_error());
        }
        resp.json()
    }

    pub async fn list_analyzers(&self) -> Result<Vec<AnalyzerDescriptor>> {
        let resp = self
            .send(HttpRequest::new(Method::GET, self.analyzer_list_url()))
            .await?;
        if !resp.status.is_success() {
            return Err(resp.into_transport_error());
        }
        let list: AnalyzerList = resp.json()?;
        Ok(list.value)
    }

    /// Submit an analyzer creation. The template must serialize to a
    /// non-empty JSON object; this is checked before any request is sent.
    pub async fn create_analyzer<T>(&self, analyzer_id: &str, template: &T) -> Result<Operation>
    where
        T: Serialize + ?Sized,
    {
        self.submit_create(analyzer_id, serde_json::to_value(template)?, None)
            .await
    }

    /// Like `create_analyzer`, attaching a labeled training-data location.
    pub async fn create_analyzer_with_training_data<T>(
        &self,
        analyzer_id: &str,
        template: &T,
        training_data: &TrainingData,
    ) -> Result<Operation>
    where
        T: Serialize + ?Sized,
    {
        self.submit_create(
            analyzer_id,
            serde_json::to_value(template)?,
            Some(training_data),
        )
        .await
    }

    async fn submit_create(
        &self,
        analyzer_id: &str,
        mut body: serde_json::Value,
        training_data: Option<&TrainingData>,
    ) -> Result<Operation> {
        if analyzer_id.trim().is_empty() {
            return Err(CuError::Validation("analyzer id must not be empty".into()));
        }
        let is_empty = match &body {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            _ => {
                return Err(CuError::Validation(
                    "analyzer schema must be a JSON object".into(),
                ))
            }
        };
        if is_empty {
            return Err(CuError::Validation("analyzer schema must be provided".into()));
        }

        if let (Some(training), serde_json::Value::Object(map)) = (training_data, &mut body) {
            map.insert("trainingData".to_string(), serde_json::to_value(training)?);
        }

        let resp = self
            .send(HttpRequest::new(Method::PUT, self.analyzer_url(analyzer_id)).with_json(body))
            .await?;

        if resp.status != StatusCode::CREATED {
            error!(analyzer_id, status = resp.status.as_u16(), "Analyzer creation rejected");
            return Err(resp.into_transport_error());
        }

        info!(analyzer_id, "Analyzer create request accepted");
        self.operation_from(resp, OperationKind::CreateAnalyzer, analyzer_id)
    }

    /// Submit a file for analysis, retrying the submission with backoff.
    pub async fn analyze(&self, analyzer_id: &str, file_location: &str) -> Result<Operation> {
        let source = FileSource::classify(file_location).await?;
        retry_with_backoff(&self.retry, "analyze", || {
            self.submit_analyze(analyzer_id, &source)
        })
        .await
    }

    async fn submit_analyze(&self, analyzer_id: &str, source: &FileSource) -> Result<Operation> {
        let request = HttpRequest::new(Method::POST, self.analyze_url(analyzer_id));
        let request = match source {
            FileSource::Local { bytes, .. } => request.with_bytes(bytes.clone()),
            FileSource::Url(url) => {
                request.with_json(serde_json::to_value(AnalyzeUrlRequest { url })?)
            }
        };

        let resp = self.send(request).await?;
        if !resp.status.is_success() {
            return Err(resp.into_transport_error());
        }

        match source {
            FileSource::Local { path, .. } => {
                info!(analyzer_id, file = %path.display(), "Analyzing file")
            }
            FileSource::Url(url) => info!(analyzer_id, url = url.as_str(), "Analyzing file"),
        }
        self.operation_from(resp, OperationKind::Analyze, analyzer_id)
    }

    /// GET the operation handle once.
    async fn poll_once(&self, operation: &Operation) -> Result<(OperationStatus, serde_json::Value)> {
        let resp = self
            .send(HttpRequest::new(Method::GET, operation.location()))
            .await?;
        if !resp.status.is_success() {
            return Err(resp.into_transport_error());
        }
        let status = resp.json::<PollResponse>()?.status;
        Ok((OperationStatus::parse(&status), resp.json()?))
    }

    /// Poll the same operation handle every `poll_interval` until it reaches
    /// a terminal state or `timeout` (measured from this call) elapses.
    ///
    /// A network failure or 5xx on a single poll counts as another tick.
    /// Timing out does not cancel the remote operation.
    pub async fn await_completion(
        &self,
        operation: &Operation,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<OperationOutcome> {
        let start = tokio::time::Instant::now();
        loop {
            let elapsed = start.elapsed();
            if elapsed > timeout {
                return Err(CuError::Timeout {
                    operation: operation.id().to_string(),
                    timeout,
                });
            }

            match self.poll_once(operation).await {
                Ok((OperationStatus::Succeeded, payload)) => {
                    info!(
                        operation = operation.id(),
                        elapsed_secs = elapsed.as_secs_f64(),
                        "Request result is ready"
                    );
                    return Ok(OperationOutcome {
                        operation_id: operation.id().to_string(),
                        payload,
                    });
                }
                Ok((OperationStatus::Failed, payload)) => {
                    error!(operation = operation.id(), reason = %payload, "Request failed");
                    let detail = payload
                        .get("error")
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| payload.to_string());
                    return Err(CuError::RemoteOperation {
                        operation: operation.id().to_string(),
                        detail,
                    });
                }
                Ok((OperationStatus::Running, _)) => {
                    debug!(operation = operation.id(), "Request in progress");
                }
                Err(e) if e.is_transient() => {
                    warn!(operation = operation.id(), error = %e, "Poll failed, will retry on next tick");
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// `analyze` followed by `await_completion` with the client's poll settings.
    pub async fn analyze_and_wait(
        &self,
        analyzer_id: &str,
        file_location: &str,
    ) -> Result<OperationOutcome> {
        let operation = self.analyze(analyzer_id, file_location).await?;
        self.await_completion(&operation, self.poll.timeout, self.poll.interval)
            .await
    }

    pub async fn delete_analyzer(&self, analyzer_id: &str) -> Result<()> {
        let resp = self
            .send(HttpRequest::new(Method::DELETE, self.analyzer_url(analyzer_id)))
            .await?;
        if resp.status != StatusCode::NO_CONTENT {
            error!(analyzer_id, status = resp.status.as_u16(), "Analyzer deletion failed");
            return Err(resp.into_transport_error());
        }
        info!(analyzer_id, "Analyzer deleted");
        Ok(())
    }

    /// Fetch an image extracted during an analyze operation.
    pub async fn get_result_image(&self, operation: &Operation, image_id: &str) -> Result<Bytes> {
        let base = operation
            .location()
            .split("?api-version")
            .next()
            .unwrap_or_default();
        let url = format!("{base}/images/{image_id}?api-version={}", self.api_version);

        let resp = self.send(HttpRequest::new(Method::GET, url)).await?;
        if !resp.status.is_success() {
            return Err(resp.into_transport_error());
        }
        let content_type = resp
            .header(&reqwest::header::CONTENT_TYPE)
            .unwrap_or_default();
        if content_type != "image/jpeg" {
            return Err(CuError::Parse(format!(
                "expected image/jpeg, got '{content_type}'"
            )));
        }
        Ok(resp.body)
    }
}
