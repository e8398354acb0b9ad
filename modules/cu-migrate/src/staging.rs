use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use cu_client::TrainingData;
use tracing::{debug, info};

/// Destination for the converted dataset that the final analyzer trains
/// from. Blob storage itself stays outside this crate; a sink only has to
/// put the files somewhere the service can read and describe where.
#[async_trait]
pub trait TrainingDataSink: Send + Sync {
    /// Copy every file under `dataset_dir`. Returns the number of files staged.
    async fn stage(&self, dataset_dir: &Path) -> Result<usize>;

    /// Location handed to the analyzer as `trainingData`.
    fn training_data(&self) -> TrainingData;
}

/// Stages into a local directory that is mounted as (or synced to) the
/// training container. Files land under `root/prefix`.
pub struct DirectorySink {
    root: PathBuf,
    container_url: String,
    prefix: String,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>, container_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            container_url: container_url.into(),
            prefix: prefix.into(),
        }
    }

    fn destination(&self) -> PathBuf {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            self.root.clone()
        } else {
            self.root.join(prefix)
        }
    }
}

#[async_trait]
impl TrainingDataSink for DirectorySink {
    async fn stage(&self, dataset_dir: &Path) -> Result<usize> {
        let destination = self.destination();
        if destination == dataset_dir {
            debug!(dir = %destination.display(), "Dataset already in staging location");
            return count_files(dataset_dir).await;
        }

        tokio::fs::create_dir_all(&destination)
            .await
            .with_context(|| format!("creating staging directory {}", destination.display()))?;

        let mut staged = 0;
        let mut pending = vec![dataset_dir.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    // Staging under the dataset itself must not re-copy its own output.
                    if path != destination {
                        pending.push(path);
                    }
                    continue;
                }
                let relative = path.strip_prefix(dataset_dir)?;
                let target = destination.join(relative);
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::copy(&path, &target)
                    .await
                    .with_context(|| format!("staging {}", path.display()))?;
                debug!(file = %relative.display(), "Staged");
                staged += 1;
            }
        }

        info!(staged, destination = %destination.display(), "Staged training data");
        Ok(staged)
    }

    fn training_data(&self) -> TrainingData {
        TrainingData::blob(&self.container_url, &self.prefix)
    }
}

async fn count_files(dir: &Path) -> Result<usize> {
    let mut count = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}
