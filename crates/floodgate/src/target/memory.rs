//! In-process target database.
//!
//! Holds schema metadata and configuration variables in memory. Tables can be
//! scripted to report a non-public state for a number of metadata reads,
//! which models DDL still converging across a cluster.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::TargetError;

use super::{DatabaseMeta, SchemaState, TableMeta, TargetDatabase};

#[derive(Debug, Default)]
struct MemoryState {
    databases: Vec<DatabaseMeta>,
    config: HashMap<String, String>,
    statements: Vec<(Option<String>, String)>,
    /// (database, table) -> remaining reads that report `WriteOnly`.
    pending: HashMap<(String, String), usize>,
    list_calls: usize,
    config_writes: Vec<(String, String)>,
    fail_config_reads: bool,
    fail_config_writes: bool,
    fail_listing: bool,
    closed: bool,
}

/// Target database living entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    state: Mutex<MemoryState>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add or replace a database definition.
    pub fn put_database(&self, database: DatabaseMeta) {
        let mut state = self.lock();
        state.databases.retain(|db| db.name != database.name);
        state.databases.push(database);
    }

    /// Add or replace one table of an existing database.
    ///
    /// Returns `false` when the database does not exist.
    pub fn put_table(&self, database: &str, table: TableMeta) -> bool {
        let mut state = self.lock();
        let Some(db) = state.databases.iter_mut().find(|db| db.name == database) else {
            return false;
        };
        db.tables.retain(|t| t.name != table.name);
        db.tables.push(table);
        true
    }

    /// Report `table` as still propagating for the next `reads` listings.
    pub fn set_pending(&self, database: &str, table: &str, reads: usize) {
        self.lock()
            .pending
            .insert((database.to_string(), table.to_string()), reads);
    }

    /// Seed a configuration variable.
    pub fn set_config_value(&self, name: &str, value: &str) {
        self.lock()
            .config
            .insert(name.to_string(), value.to_string());
    }

    /// Current value of a configuration variable.
    pub fn config_value(&self, name: &str) -> Option<String> {
        self.lock().config.get(name).cloned()
    }

    /// Every configuration write, in order.
    pub fn config_writes(&self) -> Vec<(String, String)> {
        self.lock().config_writes.clone()
    }

    /// Every executed statement with the database it ran in.
    pub fn statements(&self) -> Vec<(Option<String>, String)> {
        self.lock().statements.clone()
    }

    /// Number of metadata listings served so far.
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn fail_config_reads(&self, fail: bool) {
        self.lock().fail_config_reads = fail;
    }

    pub fn fail_config_writes(&self, fail: bool) {
        self.lock().fail_config_writes = fail;
    }

    pub fn fail_listing(&self, fail: bool) {
        self.lock().fail_listing = fail;
    }
}

#[async_trait]
impl TargetDatabase for MemoryTarget {
    async fn execute(&self, database: Option<&str>, sql: &str) -> Result<(), TargetError> {
        self.lock()
            .statements
            .push((database.map(str::to_string), sql.to_string()));
        Ok(())
    }

    async fn list_schemas(&self) -> Result<Vec<DatabaseMeta>, TargetError> {
        let mut state = self.lock();
        if state.fail_listing {
            return Err(TargetError::Rejected {
                message: "schema listing unavailable".to_string(),
            });
        }
        state.list_calls += 1;

        let mut databases = state.databases.clone();
        for db in &mut databases {
            for table in &mut db.tables {
                let key = (db.name.clone(), table.name.clone());
                if let Some(remaining) = state.pending.get_mut(&key) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        table.state = SchemaState::WriteOnly;
                    }
                }
            }
        }
        Ok(databases)
    }

    async fn read_config_value(&self, name: &str) -> Result<String, TargetError> {
        let state = self.lock();
        if state.fail_config_reads {
            return Err(TargetError::Rejected {
                message: format!("cannot read '{name}'"),
            });
        }
        state
            .config
            .get(name)
            .cloned()
            .ok_or_else(|| TargetError::ConfigValueMissing {
                name: name.to_string(),
            })
    }

    async fn write_config_value(&self, name: &str, value: &str) -> Result<(), TargetError> {
        let mut state = self.lock();
        if state.fail_config_writes {
            return Err(TargetError::Rejected {
                message: format!("cannot write '{name}'"),
            });
        }
        state.config.insert(name.to_string(), value.to_string());
        state
            .config_writes
            .push((name.to_string(), value.to_string()));
        Ok(())
    }

    async fn close(&self) {
        self.lock().closed = true;
    }
}
