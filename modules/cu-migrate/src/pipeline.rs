//! DI dataset to CU analyzer migration.
//!
//! validate schema → convert field types (saved as the target `fields.json`)
//! → relabel → layout OCR (ephemeral analyzer) → stage training data →
//! create analyzer → optional analyze.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cu_client::{AnalyzerConfig, AnalyzerTemplate, CuClient};
use cu_schema::{
    relabel, sanitize_key, validate_field_count, ConvertedSchema, FieldTypeConverter,
    LabelDocument, SchemaDialect, TableConverter, TypeMappingTable,
};
use rand::Rng;
use tracing::{info, warn};

use crate::config::MigrationConfig;
use crate::dataset::{file_name, Dataset, FIELDS_JSON, RESULT_SUFFIX};
use crate::staging::{DirectorySink, TrainingDataSink};

/// Everything a migration run needs, built once by the caller.
pub struct MigrationContext {
    pub client: CuClient,
    pub config: MigrationConfig,
    pub converter: Box<dyn FieldTypeConverter + Send + Sync>,
    pub sink: Box<dyn TrainingDataSink>,
}

impl MigrationContext {
    /// Table converter (bundled or `TYPE_MAPPING_FILE`) and a directory sink
    /// over the configured staging location.
    pub fn new(client: CuClient, config: MigrationConfig) -> Result<Self> {
        let table = match &config.type_mapping_file {
            Some(path) => TypeMappingTable::from_path(path)?,
            None => TypeMappingTable::default(),
        };
        let sink = DirectorySink::new(
            config.staging_dir().clone(),
            config.training_container_url.clone(),
            config.training_container_prefix.clone(),
        );
        Ok(Self {
            client,
            config,
            converter: Box::new(TableConverter::new(table)),
            sink: Box::new(sink),
        })
    }

    pub fn with_sink(mut self, sink: impl TrainingDataSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Id of the migrated analyzer: the configured prefix, else the source
    /// directory name.
    pub fn analyzer_id(&self) -> String {
        match &self.config.analyzer_prefix {
            Some(prefix) => prefix.clone(),
            None => {
                let dir_name = self
                    .config
                    .source_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "migrated".to_string());
                sanitize_key(&dir_name)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub analyzer_id: String,
    pub field_count: usize,
    pub dropped_fields: Vec<String>,
    pub labels_converted: usize,
    pub unknown_labels: Vec<String>,
    pub documents: usize,
    pub ocr_failures: Vec<String>,
    pub staged_files: usize,
    pub analyze_output: Option<PathBuf>,
}

pub async fn run_migration(ctx: &MigrationContext) -> Result<MigrationReport> {
    let config = &ctx.config;
    let analyzer_id = ctx.analyzer_id();
    info!(analyzer_id = analyzer_id.as_str(), version = %config.di_version, "Starting migration");

    let dataset = Dataset::scan(&config.source_dir).await?;

    // 1. Validate
    let raw = tokio::fs::read(&dataset.fields)
        .await
        .with_context(|| format!("reading {}", dataset.fields.display()))?;
    let schema = SchemaDialect::parse(config.di_version, &raw)?;
    let field_count = validate_field_count(&schema)?;

    // 2. Convert
    let converted = ctx.converter.convert(&schema)?;
    let dropped_fields: Vec<String> = converted.dropped.iter().map(|d| d.path.clone()).collect();
    if !dropped_fields.is_empty() {
        warn!(?dropped_fields, "Fields removed from the dataset");
    }

    tokio::fs::create_dir_all(&config.target_dir)
        .await
        .with_context(|| format!("creating {}", config.target_dir.display()))?;
    let fields_path = config.target_dir.join(FIELDS_JSON);
    tokio::fs::write(&fields_path, serde_json::to_vec_pretty(&converted.schema)?)
        .await
        .with_context(|| format!("writing {}", fields_path.display()))?;
    info!(path = %fields_path.display(), "Saved converted field schema");

    // 3. Relabel
    let mut unknown_labels = Vec::new();
    for path in &dataset.label_files {
        unknown_labels.extend(convert_label_file(path, &config.target_dir, &converted).await?);
    }

    // 4. Layout OCR over copies in the target dataset
    let mut documents = Vec::with_capacity(dataset.documents.len());
    for path in &dataset.documents {
        let target = config.target_dir.join(file_name(path)?);
        tokio::fs::copy(path, &target)
            .await
            .with_context(|| format!("copying {}", path.display()))?;
        documents.push(target.to_string_lossy().into_owned());
    }
    let ocr_failures = run_layout_ocr(&ctx.client, &analyzer_id, &documents, &config.target_dir).await?;

    // 5. Stage
    let staged_files = ctx.sink.stage(&config.target_dir).await?;

    // 6. Create the trained analyzer
    let description = format!(
        "Migrated from {} dataset {}",
        config.di_version,
        config.source_dir.display()
    );
    let template = AnalyzerTemplate {
        description: Some(description.clone()),
        base_analyzer_id: Some("prebuilt-documentAnalyzer".to_string()),
        scenario: Some("document".to_string()),
        config: Some(AnalyzerConfig {
            return_details: Some(true),
            ..Default::default()
        }),
        field_schema: Some(converted.schema.to_analyzer_field_schema(&analyzer_id, &description)?),
        ..Default::default()
    };
    let poll = ctx.client.poll_settings().clone();
    let operation = ctx
        .client
        .create_analyzer_with_training_data(&analyzer_id, &template, &ctx.sink.training_data())
        .await?;
    ctx.client
        .await_completion(&operation, poll.timeout, poll.interval)
        .await
        .with_context(|| format!("creating analyzer {analyzer_id}"))?;
    info!(analyzer_id = analyzer_id.as_str(), "Analyzer created");

    // 7. Optional sample analyze
    let analyze_output = match &config.analyze_file {
        Some(file) => Some(analyze_sample(&ctx.client, &analyzer_id, file, &config.result_output).await?),
        None => {
            info!("No ANALYZE_FILE set, skipping sample analyze");
            None
        }
    };

    let report = MigrationReport {
        analyzer_id,
        field_count,
        dropped_fields,
        labels_converted: dataset.label_files.len(),
        unknown_labels,
        documents: documents.len(),
        ocr_failures,
        staged_files,
        analyze_output,
    };
    info!(
        analyzer_id = report.analyzer_id.as_str(),
        fields = report.field_count,
        documents = report.documents,
        ocr_failures = report.ocr_failures.len(),
        "Migration finished"
    );
    Ok(report)
}

/// Re-key one label file into the target dataset. Returns unknown labels.
async fn convert_label_file(
    path: &Path,
    target_dir: &Path,
    converted: &ConvertedSchema,
) -> Result<Vec<String>> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let document = LabelDocument::from_slice(&raw)
        .with_context(|| format!("parsing {}", path.display()))?;

    let outcome = relabel(&document, converted);
    if !outcome.dropped.is_empty() {
        warn!(file = %path.display(), dropped = ?outcome.dropped, "Removed labels of dropped fields");
    }
    if !outcome.unknown.is_empty() {
        warn!(file = %path.display(), unknown = ?outcome.unknown, "Labels reference fields missing from the schema");
    }

    let target = target_dir.join(file_name(path)?);
    tokio::fs::write(&target, serde_json::to_vec_pretty(&outcome.document)?).await?;
    Ok(outcome.unknown)
}

/// Run every document through a throwaway layout analyzer and write
/// `<name>.result.json` next to it. Per-document failures are returned,
/// not raised.
async fn run_layout_ocr(
    client: &CuClient,
    analyzer_id: &str,
    documents: &[String],
    target_dir: &Path,
) -> Result<Vec<String>> {
    if documents.is_empty() {
        return Ok(Vec::new());
    }

    let layout_id = format!("{analyzer_id}-layout-{}", rand::rng().random_range(0..1_000_000u32));
    let template = AnalyzerTemplate::layout_only("Layout analyzer for dataset migration");
    let results = client
        .run_once(documents, &layout_id, &template)
        .await
        .context("running layout OCR")?;

    for (file, outcome) in results.successes() {
        let output = target_dir.join(format!("{}{RESULT_SUFFIX}", file_name(Path::new(file))?));
        tokio::fs::write(&output, serde_json::to_vec_pretty(&outcome.payload)?).await?;
        info!(file, output = %output.display(), "Saved layout result");
    }

    let mut failures: Vec<String> = results
        .failures()
        .map(|(file, e)| {
            warn!(file, error = %e, "Layout OCR failed");
            file.to_string()
        })
        .collect();
    failures.sort();
    Ok(failures)
}

async fn analyze_sample(
    client: &CuClient,
    analyzer_id: &str,
    file: &str,
    output: &Path,
) -> Result<PathBuf> {
    let outcome = client
        .analyze_and_wait(analyzer_id, file)
        .await
        .with_context(|| format!("analyzing {file}"))?;
    tokio::fs::write(output, serde_json::to_vec_pretty(&outcome.payload)?)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    info!(file, output = %output.display(), "Analyze result saved");
    Ok(output.to_path_buf())
}
