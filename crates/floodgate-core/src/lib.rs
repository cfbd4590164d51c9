//! floodgate-core: Shared components for the floodgate importer.
//!
//! - `storage/` - Blob sink abstraction over object stores (S3, GCS, local, memory)
//! - `ratelimit` - Token bucket and the throughput-limiting sink decorator
//! - `metrics/` - Prometheus metrics infrastructure
//! - `config/` - Environment variable interpolation and size constants
//! - `signal` - Signal handling for graceful shutdown
//! - `error` - Common error types

pub mod config;
pub mod error;
pub mod metrics;
pub mod ratelimit;
pub mod signal;
pub mod storage;
pub mod tracing;

// Re-export commonly used items
pub use config::{KB, MB, interpolate};
pub use error::{ConfigError, MetricsError, StorageError};
pub use ratelimit::{BURST_LIMIT, RateLimitedSink, RateLimitedWriter, TokenBucket, with_rate_limit};
pub use signal::shutdown_signal;
pub use storage::{BlobSink, BlobWriter, StorageProvider};
pub use tracing::init_tracing;
