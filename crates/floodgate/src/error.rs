//! Error types for the floodgate importer.

use snafu::prelude::*;
use std::path::PathBuf;

// Re-export common errors
pub use floodgate_core::error::{ConfigError, MetricsError, StorageError};

/// Errors returned by the target database collaborator.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TargetError {
    /// Could not obtain a connection.
    #[snafu(display("Failed to connect to target database: {source}"))]
    Connect { source: sqlx::Error },

    /// A statement failed.
    #[snafu(display("Statement failed ({statement}): {source}"))]
    Statement {
        statement: String,
        source: sqlx::Error,
    },

    /// The named system configuration variable does not exist.
    #[snafu(display("Configuration variable '{name}' not found"))]
    ConfigValueMissing { name: String },

    /// The requested table is not part of the database.
    #[snafu(display("Table '{database}.{table}' not found"))]
    TableNotFound { database: String, table: String },

    /// The target refused the request without a driver error.
    #[snafu(display("Target rejected request: {message}"))]
    Rejected { message: String },
}

/// Errors from extending and restoring the GC horizon.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum HorizonError {
    /// Reading the current horizon failed; nothing was changed.
    #[snafu(display("Failed to read GC horizon: {source}"))]
    ReadOriginal { source: TargetError },

    /// Writing the extended horizon failed; the import did not run.
    #[snafu(display("Failed to extend GC horizon to '{life_time}': {source}"))]
    Extend {
        life_time: String,
        source: TargetError,
    },

    /// The import finished but the original horizon could not be put back.
    #[snafu(display("Failed to restore GC horizon to '{original}': {source}"))]
    Restore {
        original: String,
        source: TargetError,
    },
}

/// Top-level import errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ImportError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Metrics setup error.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },

    /// Storage setup error.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    /// Target database error.
    #[snafu(display("Target database error: {source}"))]
    Target { source: TargetError },

    /// GC horizon error.
    #[snafu(display("{source}"))]
    Horizon { source: HorizonError },

    /// A source file could not be read.
    #[snafu(display("Failed to read source file {}: {source}", path.display()))]
    ReadSource {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing a blob failed.
    #[snafu(display("Failed to upload '{name}': {source}"))]
    Upload { name: String, source: StorageError },

    /// The sink accepted zero bytes for a non-empty write.
    #[snafu(display("Upload of '{name}' stalled: sink accepted no bytes"))]
    StalledWrite { name: String },

    /// The target database never became visible.
    #[snafu(display("Database '{database}' does not exist on the target"))]
    DatabaseMissing { database: String },

    /// Tables were still unavailable when the readiness budget ran out.
    #[snafu(display(
        "Database '{database}' not ready, unavailable tables: {}",
        tables.join(", ")
    ))]
    SchemaNotReady {
        database: String,
        tables: Vec<String>,
    },

    /// Shutdown was requested before the import finished.
    #[snafu(display("Import cancelled"))]
    Cancelled,
}

impl From<HorizonError> for ImportError {
    fn from(source: HorizonError) -> Self {
        ImportError::Horizon { source }
    }
}

impl ImportError {
    /// Bytes already durable in the sink when an upload was cancelled mid-wait.
    pub fn partially_written(&self) -> Option<usize> {
        match self {
            ImportError::Upload { source, .. } => source.written_before_cancel(),
            _ => None,
        }
    }
}
