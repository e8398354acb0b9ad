pub mod config;
pub mod dataset;
pub mod pipeline;
pub mod staging;

pub use config::MigrationConfig;
pub use dataset::Dataset;
pub use pipeline::{run_migration, MigrationContext, MigrationReport};
pub use staging::{DirectorySink, TrainingDataSink};
