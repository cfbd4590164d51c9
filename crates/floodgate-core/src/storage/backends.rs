//! Object store construction for each supported backend.
//!
//! Every constructor produces a `StorageProvider` holding the store, the
//! parsed backend config, and a canonical URL used in logs.

use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, RetryConfig};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{GcsConfigSnafu, IoSnafu, ObjectStoreSnafu, S3ConfigSnafu, StorageError};

use super::{BackendConfig, StorageProvider};

/// S3 (or S3-compatible) bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    /// Custom endpoint for S3-compatible stores, e.g. `http://minio:9000`.
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket: String,
    pub key: Option<Path>,
}

/// Google Cloud Storage bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsConfig {
    pub bucket: String,
    pub key: Option<Path>,
}

/// Directory on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub path: String,
}

fn with_key(base: String, key: Option<&Path>) -> String {
    match key {
        Some(key) => format!("{base}/{key}"),
        None => base,
    }
}

impl StorageProvider {
    pub(super) async fn construct_s3(
        config: S3Config,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_retry(RetryConfig::default());

        for (key, value) in &options {
            builder = builder.with_config(key.parse().context(S3ConfigSnafu)?, value.clone());
        }
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false)
                .with_allow_http(true);
        }

        let base = match &config.endpoint {
            Some(endpoint) => format!("s3::{endpoint}/{}", config.bucket),
            None => format!("s3://{}", config.bucket),
        };
        let canonical_url = with_key(base, config.key.as_ref());
        let object_store: Arc<dyn ObjectStore> =
            Arc::new(builder.build().context(S3ConfigSnafu)?);

        Ok(Self {
            config: BackendConfig::S3(config),
            object_store,
            canonical_url,
        })
    }

    /// Credentials come from the environment unless given as options
    /// (`google_service_account_key`, `google_application_credentials`, ...).
    pub(super) async fn construct_gcs(
        config: GcsConfig,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let mut builder = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(&config.bucket)
            .with_retry(RetryConfig::default());

        for (key, value) in &options {
            debug!(option = %key, "Applying GCS option");
            builder = builder.with_config(key.parse().context(GcsConfigSnafu)?, value.clone());
        }

        let canonical_url = with_key(format!("gs://{}", config.bucket), config.key.as_ref());
        let object_store: Arc<dyn ObjectStore> =
            Arc::new(builder.build().context(GcsConfigSnafu)?);

        Ok(Self {
            config: BackendConfig::Gcs(config),
            object_store,
            canonical_url,
        })
    }

    /// The directory is created if missing.
    pub(super) async fn construct_local(config: LocalConfig) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&config.path)
            .await
            .context(IoSnafu)?;

        let store = LocalFileSystem::new_with_prefix(&config.path).context(ObjectStoreSnafu)?;

        Ok(Self {
            canonical_url: format!("file://{}", config.path),
            config: BackendConfig::Local(config),
            object_store: Arc::new(store),
        })
    }

    /// Process-local store; contents vanish with the provider.
    pub(super) fn construct_memory() -> Self {
        Self {
            config: BackendConfig::Memory,
            object_store: Arc::new(InMemory::new()),
            canonical_url: "memory://".to_string(),
        }
    }
}
