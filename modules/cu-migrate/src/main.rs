use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cu_client::{CuClient, CuConfig};
use cu_migrate::{run_migration, MigrationConfig, MigrationContext};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cu=info".parse()?))
        .init();

    info!("DI to CU dataset migration starting...");

    let cu_config = CuConfig::from_env()?;
    let config = MigrationConfig::from_env()?;
    let client = CuClient::from_config(&cu_config)?;

    let ctx = MigrationContext::new(client, config)?;
    let report = run_migration(&ctx).await?;

    println!("\n=== Migrated analyzer: {} ===", report.analyzer_id);
    println!(
        "Fields: {}  |  Documents: {}  |  Staged files: {}",
        report.field_count, report.documents, report.staged_files
    );
    if !report.dropped_fields.is_empty() {
        println!("Dropped fields: {}", report.dropped_fields.join(", "));
    }
    if !report.ocr_failures.is_empty() {
        println!("Layout OCR failed for: {}", report.ocr_failures.join(", "));
    }
    if let Some(path) = &report.analyze_output {
        println!("Analyze result: {}", path.display());
    }

    Ok(())
}
