use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use cu_schema::DiVersion;

pub const DEFAULT_RESULT_OUTPUT: &str = "analyzer_result.json";

/// Migration settings loaded from environment variables. Service
/// connection settings live in `cu_client::CuConfig`.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub di_version: DiVersion,
    /// Analyzer id of the migrated analyzer. Required for CustomNeural.
    pub analyzer_prefix: Option<String>,
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    /// Where converted training data is staged. Defaults to `target_dir`.
    pub staging_dir: Option<PathBuf>,
    pub training_container_url: String,
    pub training_container_prefix: String,
    pub type_mapping_file: Option<PathBuf>,
    pub analyze_file: Option<String>,
    pub result_output: PathBuf,
}

impl MigrationConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let di_version = match optional_env("DI_VERSION") {
            Some(raw) => raw.parse::<DiVersion>()?,
            None => DiVersion::CustomGen,
        };

        let config = Self {
            di_version,
            analyzer_prefix: optional_env("ANALYZER_PREFIX"),
            source_dir: PathBuf::from(required_env("SOURCE_DATASET_DIR")?),
            target_dir: PathBuf::from(required_env("TARGET_DATASET_DIR")?),
            staging_dir: optional_env("TRAINING_STAGING_DIR").map(PathBuf::from),
            training_container_url: required_env("TRAINING_CONTAINER_URL")?,
            training_container_prefix: optional_env("TRAINING_CONTAINER_PREFIX").unwrap_or_default(),
            type_mapping_file: optional_env("TYPE_MAPPING_FILE").map(PathBuf::from),
            analyze_file: optional_env("ANALYZE_FILE"),
            result_output: optional_env("ANALYZER_RESULT_OUTPUT_JSON")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULT_OUTPUT)),
        };

        config.validate()?;
        config.log_keys();
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.di_version == DiVersion::CustomNeural && self.analyzer_prefix.is_none() {
            bail!("ANALYZER_PREFIX is required when migrating a {} dataset", self.di_version);
        }
        if self.source_dir == self.target_dir {
            bail!("source and target dataset directories must differ");
        }
        Ok(())
    }

    pub fn staging_dir(&self) -> &PathBuf {
        self.staging_dir.as_ref().unwrap_or(&self.target_dir)
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            // SAS tokens ride in the query string.
            match val.split_once('?') {
                Some((base, query)) => format!("{base}?...({} chars)", query.len()),
                None => val.to_string(),
            }
        }

        tracing::info!("Migration config loaded:");
        tracing::info!("  DI_VERSION: {}", self.di_version);
        tracing::info!("  SOURCE_DATASET_DIR: {}", self.source_dir.display());
        tracing::info!("  TARGET_DATASET_DIR: {}", self.target_dir.display());
        tracing::info!("  TRAINING_CONTAINER_URL: {}", preview(&self.training_container_url));
        tracing::info!(
            "  ANALYZE_FILE: {}",
            self.analyze_file.as_deref().unwrap_or("<not set>")
        );
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required_env(key: &str) -> Result<String> {
    optional_env(key).with_context(|| format!("{key} environment variable is required"))
}
