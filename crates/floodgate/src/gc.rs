//! GC horizon controller.
//!
//! The GC life time is a cluster-wide variable. An import that runs longer
//! than the current horizon risks its snapshot versions being collected, so
//! the job widens the horizon for its duration and puts the old value back
//! afterwards. Values are opaque strings and are restored byte for byte.

use futures::FutureExt;
use snafu::prelude::*;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info};

use floodgate_core::emit;
use floodgate_core::metrics::events::GcHorizonUpdated;

use crate::error::{ExtendSnafu, HorizonError, ReadOriginalSnafu, RestoreSnafu, TargetError};
use crate::target::TargetDatabase;

/// Variable holding the GC life time on TiDB-compatible targets.
pub const DEFAULT_GC_LIFE_TIME_VARIABLE: &str = "tikv_gc_life_time";

/// Reads and overwrites the GC horizon variable.
#[derive(Clone)]
pub struct GcHorizon {
    target: Arc<dyn TargetDatabase>,
    variable: String,
}

impl GcHorizon {
    pub fn new(target: Arc<dyn TargetDatabase>, variable: impl Into<String>) -> Self {
        Self {
            target,
            variable: variable.into(),
        }
    }

    /// Current value, verbatim.
    pub async fn read(&self) -> Result<String, TargetError> {
        self.target.read_config_value(&self.variable).await
    }

    /// Overwrite the value. No validation, no retries.
    pub async fn update(&self, value: &str) -> Result<(), TargetError> {
        self.target.write_config_value(&self.variable, value).await
    }

    /// Run `job` with the horizon set to `life_time`.
    ///
    /// The original value is written back whether `job` succeeds, fails or
    /// panics. Neither write happens when the horizon already equals
    /// `life_time`. If both `job` and the restore fail, the job's error is
    /// returned and the restore failure is logged.
    pub async fn with_extended<F, T, E>(&self, life_time: &str, job: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<HorizonError>,
    {
        let original = self.read().await.context(ReadOriginalSnafu)?;
        let changed = original != life_time;

        if changed {
            self.update(life_time)
                .await
                .context(ExtendSnafu { life_time })?;
            emit!(GcHorizonUpdated { restore: false });
            info!(
                variable = %self.variable,
                original = %original,
                life_time,
                "Extended GC horizon"
            );
        }

        let outcome = AssertUnwindSafe(job).catch_unwind().await;

        let restored = if changed {
            let restored = self
                .update(&original)
                .await
                .context(RestoreSnafu {
                    original: original.as_str(),
                });
            if restored.is_ok() {
                emit!(GcHorizonUpdated { restore: true });
                info!(variable = %self.variable, original = %original, "Restored GC horizon");
            }
            restored
        } else {
            Ok(())
        };

        match outcome {
            Ok(Ok(value)) => {
                restored?;
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(restore_err) = restored {
                    error!(error = %restore_err, "GC horizon left extended after failed import");
                }
                Err(err)
            }
            Err(panic) => {
                if let Err(restore_err) = restored {
                    error!(error = %restore_err, "GC horizon left extended after panic");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}
