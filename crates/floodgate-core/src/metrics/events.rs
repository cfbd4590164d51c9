//! Internal events for floodgate metrics emission.
//!
//! Each event struct represents a measurable occurrence during an import.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! Prometheus metric.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

// ============================================================================
// Storage operation events
// ============================================================================

/// Blob storage operation types.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Create,
    Write,
    Close,
    Abort,
}

impl StorageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Create => "create",
            StorageOperation::Write => "write",
            StorageOperation::Close => "close",
            StorageOperation::Abort => "abort",
        }
    }
}

/// Status of a storage request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    Error,
}

impl RequestStatus {
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted when a storage request completes.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "floodgate_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted when a storage request completes with duration.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            duration_ms = self.duration.as_millis(),
            "Storage request duration"
        );
        histogram!(
            "floodgate_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when bytes are accepted by a blob writer.
pub struct BlobBytesWritten {
    pub bytes: u64,
    /// Name of the blob being written.
    pub blob: String,
}

impl InternalEvent for BlobBytesWritten {
    fn emit(self) {
        trace!(bytes = self.bytes, blob = %self.blob, "Blob bytes written");
        counter!("floodgate_blob_bytes_written_total").increment(self.bytes);
    }
}

/// Event emitted after a write was throttled by the rate limiter.
pub struct RateLimitWait {
    pub duration: Duration,
}

impl InternalEvent for RateLimitWait {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Rate limit wait");
        histogram!("floodgate_rate_limit_wait_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a rate limit wait is cancelled.
pub struct RateLimitWaitCancelled;

impl InternalEvent for RateLimitWaitCancelled {
    fn emit(self) {
        trace!("Rate limit wait cancelled");
        counter!("floodgate_rate_limit_cancellations_total").increment(1);
    }
}

/// Event emitted when a blob upload finishes.
pub struct BlobUploaded {
    pub bytes: u64,
    pub duration: Duration,
}

impl InternalEvent for BlobUploaded {
    fn emit(self) {
        trace!(
            bytes = self.bytes,
            duration_ms = self.duration.as_millis(),
            "Blob uploaded"
        );
        counter!("floodgate_blobs_uploaded_total").increment(1);
        histogram!("floodgate_blob_upload_duration_seconds").record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Target database events
// ============================================================================

/// Outcome of a single readiness poll.
#[derive(Debug, Clone, Copy)]
pub enum ReadinessResult {
    Ready,
    Pending,
}

impl ReadinessResult {
    fn as_str(&self) -> &'static str {
        match self {
            ReadinessResult::Ready => "ready",
            ReadinessResult::Pending => "pending",
        }
    }
}

/// Event emitted for every schema readiness poll.
pub struct ReadinessPoll {
    pub result: ReadinessResult,
    /// Database being polled.
    pub database: String,
}

impl InternalEvent for ReadinessPoll {
    fn emit(self) {
        trace!(result = self.result.as_str(), database = %self.database, "Readiness poll");
        counter!(
            "floodgate_readiness_polls_total",
            "result" => self.result.as_str(),
            "database" => self.database
        )
        .increment(1);
    }
}

/// Event emitted with the number of tables not yet available.
pub struct TablesUnavailable {
    pub count: usize,
    /// Database being polled.
    pub database: String,
}

impl InternalEvent for TablesUnavailable {
    fn emit(self) {
        trace!(count = self.count, database = %self.database, "Tables unavailable");
        gauge!("floodgate_tables_unavailable", "database" => self.database).set(self.count as f64);
    }
}

/// Event emitted when the GC horizon variable is overwritten.
pub struct GcHorizonUpdated {
    /// True when the original value is being put back.
    pub restore: bool,
}

impl InternalEvent for GcHorizonUpdated {
    fn emit(self) {
        let action = if self.restore { "restore" } else { "extend" };
        trace!(action, "GC horizon updated");
        counter!("floodgate_gc_horizon_updates_total", "action" => action).increment(1);
    }
}
