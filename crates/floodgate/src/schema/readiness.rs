//! Schema readiness gate.
//!
//! DDL on a distributed database converges asynchronously, so a freshly
//! created table may not be usable on every node yet. The synchronizer polls
//! fresh snapshots at a fixed interval until every table is public or the
//! attempt budget runs out.
//!
//! Running out of attempts is not an error. The last snapshot is returned
//! with `ready == false` and the caller decides whether to proceed.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use floodgate_core::emit;
use floodgate_core::metrics::events::{ReadinessPoll, ReadinessResult, TablesUnavailable};

use crate::error::TargetError;
use crate::target::TargetDatabase;

use super::{DatabaseSnapshot, SchemaLoader};

/// Attempt budget for the readiness gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Total number of polls, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Pause between consecutive polls.
    pub interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            interval: Duration::from_secs(5),
        }
    }
}

/// Result of waiting for a database.
#[derive(Debug, Clone)]
pub struct ReadinessOutcome {
    /// Last snapshot observed; `None` if the database never appeared.
    pub snapshot: Option<DatabaseSnapshot>,
    /// Number of polls performed.
    pub attempts: u32,
    /// Whether every table was available in `snapshot`.
    pub ready: bool,
}

impl ReadinessOutcome {
    /// Tables still unavailable in the last snapshot.
    pub fn unavailable_tables(&self) -> Vec<String> {
        self.snapshot
            .as_ref()
            .map(DatabaseSnapshot::unavailable_tables)
            .unwrap_or_default()
    }
}

/// Polls a database until all of its tables are available.
pub struct SchemaSynchronizer {
    loader: SchemaLoader,
    policy: ReadinessPolicy,
    expected: Vec<String>,
}

impl SchemaSynchronizer {
    pub fn new(target: Arc<dyn TargetDatabase>, policy: ReadinessPolicy) -> Self {
        Self {
            loader: SchemaLoader::new(target),
            policy,
            expected: Vec::new(),
        }
    }

    /// Also wait for `tables` to be listed at all.
    ///
    /// Targets that only list converged tables never report a pending state;
    /// an expected table that is missing from a snapshot counts as unavailable.
    pub fn expecting<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Poll `database` until ready or out of attempts.
    ///
    /// A missing database counts as not ready. Errors from the target are
    /// returned immediately without spending further attempts.
    pub async fn wait_until_ready(&self, database: &str) -> Result<ReadinessOutcome, TargetError> {
        let budget = self.policy.max_attempts.max(1);
        let mut last = None;

        for attempt in 1..=budget {
            let mut snapshot = self.loader.load(database).await?;
            if let Some(db) = snapshot.as_mut() {
                db.expect_tables(self.expected.iter().map(String::as_str));
            }

            match &snapshot {
                Some(db) if db.all_tables_available() => {
                    emit!(ReadinessPoll {
                        result: ReadinessResult::Ready,
                        database: database.to_string(),
                    });
                    emit!(TablesUnavailable {
                        count: 0,
                        database: database.to_string(),
                    });
                    info!(database, attempt, tables = db.tables.len(), "All tables ready");
                    return Ok(ReadinessOutcome {
                        snapshot,
                        attempts: attempt,
                        ready: true,
                    });
                }
                Some(db) => {
                    let pending: Vec<_> = db.tables.values().filter(|t| !t.available).collect();
                    for table in &pending {
                        warn!(
                            database,
                            table = %table.name,
                            state = %table.state,
                            "Table not available"
                        );
                    }
                    emit!(TablesUnavailable {
                        count: pending.len(),
                        database: database.to_string(),
                    });
                }
                None => {
                    warn!(database, "Database not visible on target");
                }
            }

            emit!(ReadinessPoll {
                result: ReadinessResult::Pending,
                database: database.to_string(),
            });
            warn!(database, attempt, max_attempts = budget, "Not all tables ready yet");
            last = snapshot;

            if attempt < budget {
                tokio::time::sleep(self.policy.interval).await;
            }
        }

        warn!(database, attempts = budget, "Readiness attempts exhausted");
        Ok(ReadinessOutcome {
            snapshot: last,
            attempts: budget,
            ready: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{DatabaseMeta, MemoryTarget, TableMeta};
    use tokio::time::Instant;

    fn shop() -> Arc<MemoryTarget> {
        let target = Arc::new(MemoryTarget::new());
        target.put_database(
            DatabaseMeta::new(1, "shop")
                .with_table(TableMeta::new(10, "orders"))
                .with_table(TableMeta::new(11, "items")),
        );
        target
    }

    fn policy(max_attempts: u32, secs: u64) -> ReadinessPolicy {
        ReadinessPolicy {
            max_attempts,
            interval: Duration::from_secs(secs),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_immediately() {
        let target = shop();
        let sync = SchemaSynchronizer::new(target.clone(), policy(10, 5));

        let start = Instant::now();
        let outcome = sync.wait_until_ready("shop").await.unwrap();

        assert!(outcome.ready);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(target.list_calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_for_k_polls_takes_k_plus_one() {
        let target = shop();
        target.set_pending("shop", "items", 3);
        let sync = SchemaSynchronizer::new(target.clone(), policy(10, 5));

        let start = Instant::now();
        let outcome = sync.wait_until_ready("shop").await.unwrap();

        assert!(outcome.ready);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(target.list_calls(), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
        assert!(outcome.unavailable_tables().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_ready_returns_last_snapshot() {
        let target = shop();
        target.set_pending("shop", "orders", 1_000);
        let sync = SchemaSynchronizer::new(target.clone(), policy(5, 5));

        let start = Instant::now();
        let outcome = sync.wait_until_ready("shop").await.unwrap();

        assert!(!outcome.ready);
        assert_eq!(outcome.attempts, 5);
        assert_eq!(target.list_calls(), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(outcome.unavailable_tables(), vec!["orders"]);
        assert!(outcome.snapshot.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_expected_table_to_be_listed() {
        let target = Arc::new(MemoryTarget::new());
        target.put_database(DatabaseMeta::new(1, "shop").with_table(TableMeta::new(10, "orders")));
        let sync = SchemaSynchronizer::new(target.clone(), policy(3, 5))
            .expecting(["orders", "items"]);

        let outcome = sync.wait_until_ready("shop").await.unwrap();
        assert!(!outcome.ready);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.unavailable_tables(), vec!["items"]);

        target.put_table("shop", TableMeta::new(11, "items"));
        let outcome = sync.wait_until_ready("shop").await.unwrap();
        assert!(outcome.ready);
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_database_keeps_polling() {
        let target = Arc::new(MemoryTarget::new());
        let sync = SchemaSynchronizer::new(target.clone(), policy(3, 2));

        let outcome = sync.wait_until_ready("shop").await.unwrap();

        assert!(!outcome.ready);
        assert!(outcome.snapshot.is_none());
        assert_eq!(target.list_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_error_stops_polling() {
        let target = shop();
        target.fail_listing(true);
        let sync = SchemaSynchronizer::new(target.clone(), policy(10, 5));

        let start = Instant::now();
        let err = sync.wait_until_ready("shop").await.unwrap_err();

        assert!(matches!(err, TargetError::Rejected { .. }));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_polls_once() {
        let target = shop();
        let sync = SchemaSynchronizer::new(target.clone(), policy(0, 5));

        let outcome = sync.wait_until_ready("shop").await.unwrap();
        assert!(outcome.ready);
        assert_eq!(target.list_calls(), 1);
    }
}
