use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{CuError, Result};
use crate::types::OperationOutcome;
use crate::CuClient;

/// Per-file outcomes of a batch, keyed by file location. No ordering.
#[derive(Debug, Default)]
pub struct BatchResults {
    pub entries: HashMap<String, Result<OperationOutcome>>,
    /// Whether this batch created (and therefore deleted) the analyzer.
    pub created_analyzer: bool,
    /// Set when deleting the analyzer this batch created failed. The
    /// analyzer is left behind; the per-file entries are still valid.
    pub cleanup_error: Option<CuError>,
}

impl BatchResults {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &OperationOutcome)> {
        self.entries
            .iter()
            .filter_map(|(file, r)| r.as_ref().ok().map(|o| (file.as_str(), o)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &CuError)> {
        self.entries
            .iter()
            .filter_map(|(file, r)| r.as_ref().err().map(|e| (file.as_str(), e)))
    }
}

impl CuClient {
    /// Analyze every file concurrently against an existing analyzer. One
    /// file's failure is recorded as its entry and never aborts the others.
    pub async fn process_files_in_parallel(
        &self,
        analyzer_id: &str,
        file_locations: &[String],
    ) -> HashMap<String, Result<OperationOutcome>> {
        let jobs: Vec<_> = file_locations
            .iter()
            .cloned()
            .map(|file| async move {
                let outcome = self.analyze_and_wait(analyzer_id, &file).await;
                if let Err(ref e) = outcome {
                    error!(file = file.as_str(), error = %e, "Error processing file");
                }
                (file, outcome)
            })
            .collect();

        stream::iter(jobs)
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await
    }

    /// Ensure the analyzer exists, analyze all files, and delete the
    /// analyzer afterwards iff this call created it.
    pub async fn run_once<T>(
        &self,
        file_locations: &[String],
        analyzer_id: &str,
        template: &T,
    ) -> Result<BatchResults>
    where
        T: Serialize + ?Sized,
    {
        info!(analyzer_id, files = file_locations.len(), "Starting run_once processing");

        let mut created_analyzer = false;
        if !self.exists(analyzer_id).await? {
            let operation = self.create_analyzer(analyzer_id, template).await?;
            // Accepted by the service, so it is ours to delete from here on.
            created_analyzer = true;
            if let Err(e) = self
                .await_completion(&operation, self.poll.timeout, self.poll.interval)
                .await
            {
                if let Err(cleanup) = self.delete_analyzer(analyzer_id).await {
                    error!(analyzer_id, error = %cleanup, "Could not delete analyzer after failed creation");
                }
                return Err(e);
            }
            info!(analyzer_id, "Analyzer created successfully");
        }

        let entries = self
            .process_files_in_parallel(analyzer_id, file_locations)
            .await;

        let cleanup_error = if created_analyzer {
            match self.delete_analyzer(analyzer_id).await {
                Ok(()) => None,
                Err(e) => {
                    error!(analyzer_id, error = %e, "Analyzer cleanup failed, keeping batch results");
                    Some(e)
                }
            }
        } else {
            None
        };

        let results = BatchResults {
            entries,
            created_analyzer,
            cleanup_error,
        };
        let failed = results.failures().count();
        if failed > 0 {
            warn!(analyzer_id, failed, total = results.len(), "Batch finished with failures");
        } else {
            info!(analyzer_id, total = results.len(), "Batch finished");
        }
        Ok(results)
    }
}
