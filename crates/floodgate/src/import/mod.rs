//! Import job.
//!
//! Sequence for one run:
//! 1. Extend the GC horizon (restored on every exit path)
//! 2. Create the database and tables, if any are configured
//! 3. Wait for every table, including each configured one, to become available
//! 4. Upload the configured files through the rate-limited sink

mod upload;

use snafu::prelude::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use floodgate_core::error::ConfigError;
use floodgate_core::{BlobSink, StorageProvider, with_rate_limit};

use crate::config::Config;
use crate::error::{CancelledSnafu, ImportError, StorageSnafu, TargetSnafu};
use crate::gc::GcHorizon;
use crate::schema::{ReadinessOutcome, SchemaLoader, SchemaSynchronizer};
use crate::target::{MySqlTarget, TargetDatabase};

/// What a finished import did.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub files: usize,
    pub bytes: u64,
    pub readiness: ReadinessOutcome,
}

/// One configured import against a target database and blob sink.
pub struct ImportJob {
    config: Config,
    target: Arc<dyn TargetDatabase>,
    sink: Option<Arc<dyn BlobSink>>,
}

impl ImportJob {
    /// Build a job from collaborators.
    ///
    /// `sink` is wrapped with the configured rate limit here, once.
    pub fn new(
        config: Config,
        target: Arc<dyn TargetDatabase>,
        sink: Option<Box<dyn BlobSink>>,
    ) -> Self {
        let rate_limit = config.storage.as_ref().map_or(0, |s| s.rate_limit);
        let sink: Option<Arc<dyn BlobSink>> =
            sink.map(|sink| Arc::from(with_rate_limit(sink, rate_limit)));

        Self {
            config,
            target,
            sink,
        }
    }

    /// Connect to the configured target and storage.
    pub async fn connect(config: Config) -> Result<Self, ImportError> {
        let target = MySqlTarget::connect(&config.target.url, config.target.max_connections)
            .await
            .context(TargetSnafu)?;

        let sink: Option<Box<dyn BlobSink>> = match &config.storage {
            Some(storage) => {
                let provider =
                    StorageProvider::for_url_with_options(&storage.url, storage.options.clone())
                        .await
                        .context(StorageSnafu)?;
                info!(storage = %provider.canonical_url(), "Connected to storage");
                Some(Box::new(provider))
            }
            None => None,
        };

        Ok(Self::new(config, Arc::new(target), sink))
    }

    /// Run the import until done, failed, or `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<ImportSummary, ImportError> {
        let horizon = GcHorizon::new(self.target.clone(), self.config.gc.variable.as_str());
        horizon
            .with_extended(&self.config.gc.life_time, self.run_extended(&shutdown))
            .await
    }

    async fn run_extended(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<ImportSummary, ImportError> {
        let database = self.config.database.as_str();

        if !self.config.schemas.is_empty() {
            SchemaLoader::new(self.target.clone())
                .init_schema(database, &self.config.schemas)
                .await
                .context(TargetSnafu)?;
        }

        let readiness = self.wait_for_schema(shutdown).await?;

        let (files, bytes) = self.upload(shutdown).await?;
        info!(database, files, bytes, "Import finished");

        Ok(ImportSummary {
            files,
            bytes,
            readiness,
        })
    }

    async fn wait_for_schema(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<ReadinessOutcome, ImportError> {
        let database = self.config.database.as_str();
        let sync = SchemaSynchronizer::new(self.target.clone(), self.config.readiness.policy())
            .expecting(self.config.schemas.keys());

        let outcome = shutdown
            .run_until_cancelled(sync.wait_until_ready(database))
            .await
            .context(CancelledSnafu)?
            .context(TargetSnafu)?;

        if outcome.ready {
            return Ok(outcome);
        }

        let abort = self.config.readiness.abort_if_unready;
        match &outcome.snapshot {
            None if abort => {
                return Err(ImportError::DatabaseMissing {
                    database: database.to_string(),
                });
            }
            Some(_) if abort => {
                return Err(ImportError::SchemaNotReady {
                    database: database.to_string(),
                    tables: outcome.unavailable_tables(),
                });
            }
            _ => {
                warn!(
                    database,
                    unavailable = ?outcome.unavailable_tables(),
                    "Continuing although schema is not ready"
                );
            }
        }
        Ok(outcome)
    }

    /// Release the target's connections.
    pub async fn close(&self) {
        self.target.close().await;
    }

    async fn upload(&self, shutdown: &CancellationToken) -> Result<(usize, u64), ImportError> {
        if self.config.files.is_empty() {
            return Ok((0, 0));
        }

        let (Some(sink), Some(storage)) = (&self.sink, &self.config.storage) else {
            return Err(ImportError::Config {
                source: ConfigError::Invalid {
                    message: "files are listed but no storage is configured".to_string(),
                },
            });
        };

        let bytes = upload::upload_files(
            &**sink,
            &self.config.files,
            storage.chunk_size,
            storage.max_concurrent_uploads,
            shutdown,
        )
        .await?;
        Ok((self.config.files.len(), bytes))
    }
}
