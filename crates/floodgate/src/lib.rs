//! floodgate: paced bulk import into a distributed SQL database.
//!
//! This crate handles:
//! - Widening the target's GC horizon for the duration of an import
//! - Creating the target schema and waiting until every table has propagated
//! - Uploading source files to object storage under a throughput ceiling

pub mod config;
pub mod error;
pub mod gc;
pub mod import;
pub mod schema;
pub mod target;

// Re-export commonly used items
pub use config::{CliArgs, Config};
pub use error::{HorizonError, ImportError, TargetError};
pub use gc::{DEFAULT_GC_LIFE_TIME_VARIABLE, GcHorizon};
pub use import::{ImportJob, ImportSummary};
pub use schema::{
    DatabaseSnapshot, ReadinessOutcome, ReadinessPolicy, SchemaLoader, SchemaSynchronizer,
    TableSnapshot,
};
pub use target::{MemoryTarget, MySqlTarget, SchemaState, TargetDatabase};

pub use floodgate_core::{init_tracing, shutdown_signal};
