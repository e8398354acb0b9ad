use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CuError, Result};

// --- Analyzer management ---

/// Request body for `PUT /analyzers/{id}`.
///
/// Every field is optional so that `AnalyzerTemplate::default()` serializes
/// to `{}`, which the client rejects as an empty schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_analyzer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AnalyzerConfig>,
    /// Vendor field schema, kept opaque here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_data: Option<TrainingData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_location: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl AnalyzerTemplate {
    /// Template for a schema-less analyzer that only returns layout/OCR output.
    pub fn layout_only(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            base_analyzer_id: Some("prebuilt-documentAnalyzer".to_string()),
            config: Some(AnalyzerConfig::layout()),
            field_schema: Some(Value::Object(Default::default())),
            mode: Some("standard".to_string()),
            processing_location: Some("geography".to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_details: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_ocr: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_layout: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_formula: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_content_filtering: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_field_source_and_confidence: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locales: Vec<String>,
}

impl AnalyzerConfig {
    pub fn layout() -> Self {
        Self {
            return_details: Some(true),
            enable_ocr: Some(true),
            enable_layout: Some(true),
            enable_formula: Some(false),
            disable_content_filtering: Some(false),
            segmentation_mode: Some("noSegmentation".to_string()),
            table_format: Some("html".to_string()),
            estimate_field_source_and_confidence: Some(false),
            locales: Vec::new(),
        }
    }
}

/// Labeled training data location attached to an analyzer at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingData {
    pub kind: String,
    pub container_url: String,
    pub prefix: String,
}

impl TrainingData {
    pub fn blob(container_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            kind: "blob".to_string(),
            container_url: container_url.into(),
            prefix: prefix.into(),
        }
    }
}

/// Analyzer as reported by `GET /analyzers/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerDescriptor {
    pub analyzer_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub base_analyzer_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
    #[serde(default)]
    pub field_schema: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnalyzerList {
    #[serde(default)]
    pub value: Vec<AnalyzerDescriptor>,
}

/// Body for a URL-referenced analyze request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct AnalyzeUrlRequest<'a> {
    pub url: &'a str,
}

// --- Long-running operations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    CreateAnalyzer,
    Analyze,
}

/// Resumable handle to an asynchronous remote task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    location: String,
    kind: OperationKind,
    analyzer_id: String,
}

impl Operation {
    pub fn new(
        location: impl Into<String>,
        kind: OperationKind,
        analyzer_id: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            kind,
            analyzer_id: analyzer_id.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn analyzer_id(&self) -> &str {
        &self.analyzer_id
    }

    /// Last path segment of the operation location, without the query string.
    pub fn id(&self) -> &str {
        let path = self.location.split('?').next().unwrap_or_default();
        path.rsplit('/').next().unwrap_or(path)
    }
}

/// Remote status of an operation. Anything that is not a terminal state
/// (`notStarted`, `running`, unknown values) is treated as running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Running,
    Succeeded,
    Failed,
}

impl OperationStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "succeeded" => OperationStatus::Succeeded,
            "failed" => OperationStatus::Failed,
            _ => OperationStatus::Running,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, OperationStatus::Running)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PollResponse {
    #[serde(default)]
    pub status: String,
}

/// Payload of a succeeded operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutcome {
    pub operation_id: String,
    pub payload: Value,
}

impl OperationOutcome {
    /// Typed view of an analyze operation's `result` object.
    pub fn analyze_result(&self) -> Result<AnalyzeResult> {
        let result = self
            .payload
            .get("result")
            .cloned()
            .ok_or_else(|| CuError::Parse("operation payload has no result".to_string()))?;
        Ok(serde_json::from_value(result)?)
    }
}

// --- Analyze results ---

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default)]
    pub analyzer_id: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub warnings: Vec<Value>,
    #[serde(default)]
    pub contents: Vec<ContentItem>,
}

impl AnalyzeResult {
    pub fn first_content(&self) -> Option<&ContentItem> {
        self.contents.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// Typed value wrapper returned for each extracted field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValue {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_number: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_integer: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_boolean: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_array: Option<Vec<FieldValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_object: Option<BTreeMap<String, FieldValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}
