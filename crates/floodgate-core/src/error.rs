//! Common error types shared across floodgate crates.

use snafu::prelude::*;

/// Blob storage failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    #[snafu(display("Unsupported storage URL: {url}"))]
    InvalidUrl { url: String },

    #[snafu(display("Object store request failed: {source}"))]
    ObjectStore { source: object_store::Error },

    #[snafu(display("Storage I/O failed: {source}"))]
    Io { source: std::io::Error },

    #[snafu(display("Invalid S3 settings: {source}"))]
    S3Config { source: object_store::Error },

    #[snafu(display("Invalid GCS settings: {source}"))]
    GcsConfig { source: object_store::Error },

    /// Write attempted on a blob that was already closed.
    #[snafu(display("Blob '{name}' is already closed"))]
    WriterClosed { name: String },

    /// The throttling wait after a write was cancelled.
    ///
    /// `written` bytes were already accepted by the underlying sink and must
    /// be treated as durable.
    #[snafu(display("Rate limit wait on '{name}' cancelled after {written} bytes were written"))]
    WaitCancelled { name: String, written: usize },
}

impl StorageError {
    /// True when the blob does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }

    /// Bytes accepted by the sink before a cancelled rate-limit wait.
    ///
    /// Returns `None` for every other error kind.
    pub fn written_before_cancel(&self) -> Option<usize> {
        match self {
            StorageError::WaitCancelled { written, .. } => Some(*written),
            _ => None,
        }
    }
}

/// Job configuration failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("Cannot substitute environment variables: {message}"))]
    EnvInterpolation { message: String },

    #[snafu(display("Malformed job YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    #[snafu(display("Failed to read configuration file {}: {source}", path.display()))]
    ReadFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// A configuration value failed validation.
    #[snafu(display("Invalid configuration: {message}"))]
    Invalid { message: String },

    /// Validation found more than one problem.
    #[snafu(display("Invalid configuration:\n  {}", errors.join("\n  ")))]
    MultipleErrors { errors: Vec<String> },
}

/// Prometheus exporter setup failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    #[snafu(display("Failed to parse metrics address '{address}': {source}"))]
    AddressParse {
        address: String,
        source: std::net::AddrParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_before_cancel_only_for_cancelled_waits() {
        let cancelled = StorageError::WaitCancelled {
            name: "a.csv".to_string(),
            written: 42,
        };
        assert_eq!(cancelled.written_before_cancel(), Some(42));

        let closed = StorageError::WriterClosed {
            name: "a.csv".to_string(),
        };
        assert_eq!(closed.written_before_cancel(), None);
        assert!(!closed.is_not_found());
    }
}
