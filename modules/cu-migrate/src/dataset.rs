//! Layout of a labeled dataset directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const FIELDS_JSON: &str = "fields.json";
pub const VALIDATIONS_TXT: &str = "validations.txt";
pub const LABELS_SUFFIX: &str = ".labels.json";
pub const OCR_SUFFIX: &str = ".ocr.json";
pub const RESULT_SUFFIX: &str = ".result.json";

/// Files of a source dataset, sorted by name.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub fields: PathBuf,
    pub label_files: Vec<PathBuf>,
    /// Documents to be re-run through layout OCR.
    pub documents: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Fields,
    Labels,
    Document,
    Skip,
}

fn classify(name: &str) -> Entry {
    if name == FIELDS_JSON {
        Entry::Fields
    } else if name.ends_with(LABELS_SUFFIX) {
        Entry::Labels
    } else if name == VALIDATIONS_TXT || name.ends_with(OCR_SUFFIX) || name.ends_with(RESULT_SUFFIX) || name.starts_with('.') {
        Entry::Skip
    } else {
        Entry::Document
    }
}

impl Dataset {
    pub async fn scan(dir: &Path) -> Result<Self> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("reading dataset directory {}", dir.display()))?;

        let mut fields = None;
        let mut label_files = Vec::new();
        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            match classify(&name) {
                Entry::Fields => fields = Some(path),
                Entry::Labels => label_files.push(path),
                Entry::Document => documents.push(path),
                Entry::Skip => {}
            }
        }

        label_files.sort();
        documents.sort();
        let fields = fields.with_context(|| format!("no {FIELDS_JSON} in {}", dir.display()))?;
        Ok(Self {
            fields,
            label_files,
            documents,
        })
    }
}

/// File name of `path`, or an error for paths that have none.
pub fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))
}
