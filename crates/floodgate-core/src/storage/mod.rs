//! Blob storage abstraction.
//!
//! `BlobSink` / `BlobWriter` are the capability interface every writer in the
//! import path goes through (create a named blob, write bytes, close). The
//! object-store backed `StorageProvider` is the production sink; the rate
//! limiter in [`crate::ratelimit`] decorates any sink behind the same traits.

mod backends;
mod url_parser;

pub use backends::{GcsConfig, LocalConfig, S3Config};
pub use url_parser::BackendConfig;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::ObjectStore;
use object_store::buffered::BufWriter;
use object_store::path::Path;
use snafu::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::emit;
use crate::error::{IoSnafu, ObjectStoreSnafu, StorageError, WriterClosedSnafu};
use crate::metrics::events::{
    BlobBytesWritten, BlobUploaded, RequestStatus, StorageOperation, StorageRequest,
    StorageRequestDuration,
};

/// A target that can create named blobs.
#[async_trait]
pub trait BlobSink: Send + Sync {
    /// Create a new blob and return a writer for it.
    async fn create(&self, name: &str) -> Result<Box<dyn BlobWriter>, StorageError>;
}

/// A single in-progress blob.
///
/// One writer carries one logical stream; it is not shared between tasks.
#[async_trait]
pub trait BlobWriter: Send {
    /// Write bytes, returning how many the sink accepted.
    ///
    /// `cancel` aborts any waiting the writer performs after the bytes were
    /// handed to the sink. A cancelled wait is reported as
    /// [`StorageError::WaitCancelled`] carrying the accepted byte count.
    async fn write(&mut self, cancel: &CancellationToken, buf: &[u8])
    -> Result<usize, StorageError>;

    /// Flush buffered data and finish the blob.
    async fn close(&mut self) -> Result<(), StorageError>;

    /// Discard the blob without publishing it.
    ///
    /// Releases any partial upload held by the backend. Writers with nothing
    /// to release keep the default.
    async fn abort(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Storage provider that abstracts over different object store backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL with storage options.
    pub async fn for_url_with_options(
        url: &str,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let config = BackendConfig::parse_url(url)?;

        match config {
            BackendConfig::S3(config) => Self::construct_s3(config, options).await,
            BackendConfig::Gcs(config) => Self::construct_gcs(config, options).await,
            BackendConfig::Local(config) => Self::construct_local(config).await,
            BackendConfig::Memory => Ok(Self::construct_memory()),
        }
    }

    /// Canonical URL of the storage location, for logging.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    /// Qualify a path with the configured key prefix.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// Get the contents of a blob.
    pub async fn get(&self, path: impl Into<Path>) -> Result<Bytes, StorageError> {
        let path = path.into();
        let bytes = self
            .object_store
            .get(&self.qualify_path(&path))
            .await
            .context(ObjectStoreSnafu)?
            .bytes()
            .await
            .context(ObjectStoreSnafu)?;
        Ok(bytes)
    }
}

#[async_trait]
impl BlobSink for StorageProvider {
    async fn create(&self, name: &str) -> Result<Box<dyn BlobWriter>, StorageError> {
        let path = Path::from(name);
        let path = self.qualify_path(&path).into_owned();

        debug!(blob = %name, location = %path, "Creating blob");
        emit!(StorageRequest {
            operation: StorageOperation::Create,
            status: RequestStatus::Success,
        });

        Ok(Box::new(ObjectStoreWriter {
            name: name.to_string(),
            inner: Some(BufWriter::new(self.object_store.clone(), path)),
            written: 0,
            started: Instant::now(),
        }))
    }
}

/// Streaming writer over an object store upload.
///
/// Small blobs are sent with a single PUT on close; larger ones switch to a
/// multipart upload once the internal buffer fills.
pub struct ObjectStoreWriter {
    name: String,
    inner: Option<BufWriter>,
    written: u64,
    started: Instant,
}

#[async_trait]
impl BlobWriter for ObjectStoreWriter {
    async fn write(
        &mut self,
        _cancel: &CancellationToken,
        buf: &[u8],
    ) -> Result<usize, StorageError> {
        let inner = self
            .inner
            .as_mut()
            .context(WriterClosedSnafu { name: &self.name })?;

        let start = Instant::now();
        let result = inner.write(buf).await;

        emit!(StorageRequest {
            operation: StorageOperation::Write,
            status: RequestStatus::from_result(&result),
        });
        emit!(StorageRequestDuration {
            operation: StorageOperation::Write,
            duration: start.elapsed(),
        });

        let n = result.context(IoSnafu)?;
        self.written += n as u64;
        emit!(BlobBytesWritten {
            bytes: n as u64,
            blob: self.name.clone(),
        });
        Ok(n)
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        let mut inner = self
            .inner
            .take()
            .context(WriterClosedSnafu { name: &self.name })?;

        let start = Instant::now();
        let result = inner.shutdown().await;

        emit!(StorageRequest {
            operation: StorageOperation::Close,
            status: RequestStatus::from_result(&result),
        });
        emit!(StorageRequestDuration {
            operation: StorageOperation::Close,
            duration: start.elapsed(),
        });

        result.context(IoSnafu)?;
        emit!(BlobUploaded {
            bytes: self.written,
            duration: self.started.elapsed(),
        });
        debug!(blob = %self.name, bytes = self.written, "Closed blob");
        Ok(())
    }

    async fn abort(&mut self) -> Result<(), StorageError> {
        // Already closed or aborted: nothing left to release.
        let Some(mut inner) = self.inner.take() else {
            return Ok(());
        };

        let result = inner.abort().await;
        emit!(StorageRequest {
            operation: StorageOperation::Abort,
            status: RequestStatus::from_result(&result),
        });

        result.context(ObjectStoreSnafu)?;
        debug!(blob = %self.name, bytes = self.written, "Aborted blob");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_all(writer: &mut dyn BlobWriter, data: &[u8]) {
        let cancel = CancellationToken::new();
        let mut offset = 0;
        while offset < data.len() {
            offset += writer.write(&cancel, &data[offset..]).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_local_blob_round_trip_under_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let url = format!("{}/exports", temp_dir.path().display());
        let storage = StorageProvider::for_url_with_options(&url, HashMap::new())
            .await
            .unwrap();

        let mut writer = storage.create("db/orders.csv").await.unwrap();
        write_all(writer.as_mut(), b"id,amount\n1,10\n").await;
        writer.close().await.unwrap();

        let on_disk = temp_dir.path().join("exports/db/orders.csv");
        assert_eq!(std::fs::read(on_disk).unwrap(), b"id,amount\n1,10\n");

        let content = storage.get("db/orders.csv").await.unwrap();
        assert_eq!(content.as_ref(), b"id,amount\n1,10\n");
    }

    #[tokio::test]
    async fn test_memory_blob_round_trip() {
        let storage = StorageProvider::for_url_with_options("memory://", HashMap::new())
            .await
            .unwrap();

        let mut writer = storage.create("a.bin").await.unwrap();
        write_all(writer.as_mut(), &[7u8; 4096]).await;
        writer.close().await.unwrap();

        let content = storage.get("a.bin").await.unwrap();
        assert_eq!(content.len(), 4096);
        assert!(content.iter().all(|b| *b == 7));
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let storage = StorageProvider::for_url_with_options("memory://", HashMap::new())
            .await
            .unwrap();

        let mut writer = storage.create("closed.bin").await.unwrap();
        writer.close().await.unwrap();

        let err = writer
            .write(&CancellationToken::new(), b"late")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::WriterClosed { .. }));
        assert!(matches!(
            writer.close().await.unwrap_err(),
            StorageError::WriterClosed { .. }
        ));
    }

    #[tokio::test]
    async fn test_aborted_blob_is_never_published() {
        let storage = StorageProvider::for_url_with_options("memory://", HashMap::new())
            .await
            .unwrap();

        let mut writer = storage.create("partial.bin").await.unwrap();
        write_all(writer.as_mut(), &[3u8; 1024]).await;
        writer.abort().await.unwrap();

        assert!(storage.get("partial.bin").await.unwrap_err().is_not_found());
        assert!(matches!(
            writer.close().await.unwrap_err(),
            StorageError::WriterClosed { .. }
        ));
        writer.abort().await.unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_blob_is_not_found() {
        let storage = StorageProvider::for_url_with_options("memory://", HashMap::new())
            .await
            .unwrap();

        let err = storage.get("missing.bin").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
