use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

pub const DEFAULT_TEMPLATE_DIR: &str = "analyzer_templates";

/// A fixed analyzer: stable id plus the template it is created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub analyzer_id: &'static str,
    pub template_file: &'static str,
    pub description: &'static str,
}

pub const PRESETS: &[Preset] = &[
    Preset {
        name: "financial-report",
        analyzer_id: "financial-analyzer-agent-sample",
        template_file: "financial_report.json",
        description: "Annual financial reports (10-K filings)",
    },
    Preset {
        name: "call-center-recording",
        analyzer_id: "callcenter-analyzer-agent-sample",
        template_file: "call_recording_analytics.json",
        description: "Call center audio recordings",
    },
    Preset {
        name: "invoice",
        analyzer_id: "invoice-analyzer-agent-sample",
        template_file: "invoice.json",
        description: "Invoices",
    },
    Preset {
        name: "marketing-video",
        analyzer_id: "marketing-video-analyzer-agent-sample",
        template_file: "marketing_video.json",
        description: "Marketing videos",
    },
];

#[derive(Debug, Clone)]
pub struct PresetRegistry {
    template_dir: PathBuf,
}

impl PresetRegistry {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static Preset> {
        PRESETS.iter().find(|p| p.name == name)
    }

    pub fn all(&self) -> &'static [Preset] {
        PRESETS
    }

    pub async fn load_template(&self, preset: &Preset) -> Result<Value> {
        load_template_file(&self.template_dir.join(preset.template_file)).await
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }
}

pub async fn load_template_file(path: &Path) -> Result<Value> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading analyzer template {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing analyzer template {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_names_and_ids_are_unique() {
        for (i, a) in PRESETS.iter().enumerate() {
            for b in &PRESETS[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!(a.analyzer_id, b.analyzer_id);
            }
        }
    }

    #[tokio::test]
    async fn bundled_templates_parse() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../analyzer_templates");
        let registry = PresetRegistry::new(dir);
        for preset in registry.all() {
            let template = registry.load_template(preset).await.unwrap();
            assert!(template["fieldSchema"]["fields"].is_object(), "{}", preset.name);
        }
    }

    #[tokio::test]
    async fn missing_template_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PresetRegistry::new(dir.path());
        let preset = registry.get("invoice").unwrap();
        assert!(registry.load_template(preset).await.is_err());
    }
}
