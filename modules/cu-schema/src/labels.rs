//! Label file re-keying after a schema conversion.
//!
//! A label's `label` is a path whose root segment is a top-level field key
//! (`Vendor`, `Lines/0/Amount`, `Summary/Q1/Revenue`). Segments escape `~` as
//! `~0` and `/` as `~1`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::convert::ConvertedSchema;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelDocument {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub document: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
    #[serde(default)]
    pub value: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Label {
    /// Root segment with escapes decoded, and the untouched remainder
    /// (including its leading `/`).
    fn split_root(&self) -> (String, &str) {
        let (root, rest) = match self.label.find('/') {
            Some(at) => self.label.split_at(at),
            None => (self.label.as_str(), ""),
        };
        (unescape_segment(root), rest)
    }
}

impl LabelDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelabelOutcome {
    pub document: LabelDocument,
    /// Labels removed because their field was dropped.
    pub dropped: Vec<String>,
    /// Labels whose root field is not in the schema; kept unchanged.
    pub unknown: Vec<String>,
}

pub fn relabel(document: &LabelDocument, converted: &ConvertedSchema) -> RelabelOutcome {
    let mut outcome = RelabelOutcome {
        document: LabelDocument {
            labels: Vec::with_capacity(document.labels.len()),
            ..document.clone()
        },
        ..Default::default()
    };

    for label in &document.labels {
        let (root, rest) = label.split_root();
        if converted.is_dropped(&root) {
            outcome.dropped.push(label.label.clone());
            continue;
        }
        let mut label = label.clone();
        match converted.target_key(&root) {
            Some(target) => label.label = format!("{}{rest}", escape_segment(target)),
            None => outcome.unknown.push(label.label.clone()),
        }
        outcome.document.labels.push(label);
    }

    debug!(
        document = %document.document,
        kept = outcome.document.labels.len(),
        dropped = outcome.dropped.len(),
        "Relabeled document"
    );
    outcome
}

fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
