//! Loads schema snapshots and bootstraps schemas on the target.

use indexmap::IndexMap;
use regex::Regex;
use snafu::prelude::*;
use std::borrow::Cow;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

use crate::error::{TableNotFoundSnafu, TargetError};
use crate::target::{TableMeta, TargetDatabase, quote_identifier};

use super::DatabaseSnapshot;

static CREATE_TABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bCREATE\s+TABLE\s+(IF\s+NOT\s+EXISTS\s+)?")
        .expect("static CREATE TABLE pattern is valid")
});

/// Make a CREATE TABLE statement idempotent.
///
/// Inserts `IF NOT EXISTS` after the first `CREATE TABLE`, unless already
/// present. Everything else in the statement is left as written.
pub fn to_create_table_if_not_exists(sql: &str) -> Cow<'_, str> {
    let Some(caps) = CREATE_TABLE.captures(sql) else {
        return Cow::Borrowed(sql);
    };
    if caps.get(1).is_some() {
        return Cow::Borrowed(sql);
    }
    let Some(head) = caps.get(0) else {
        return Cow::Borrowed(sql);
    };

    let mut rewritten = String::with_capacity(sql.len() + 14);
    rewritten.push_str(&sql[..head.end()]);
    rewritten.push_str("IF NOT EXISTS ");
    rewritten.push_str(&sql[head.end()..]);
    Cow::Owned(rewritten)
}

/// Reads schema metadata from a target database.
#[derive(Clone)]
pub struct SchemaLoader {
    target: Arc<dyn TargetDatabase>,
}

impl SchemaLoader {
    pub fn new(target: Arc<dyn TargetDatabase>) -> Self {
        Self { target }
    }

    /// Capture a snapshot of `database`.
    ///
    /// Returns `Ok(None)` when the database does not exist (yet).
    pub async fn load(&self, database: &str) -> Result<Option<DatabaseSnapshot>, TargetError> {
        let databases = self.target.list_schemas().await?;

        let snapshot = databases
            .into_iter()
            .find(|db| db.name == database)
            .map(DatabaseSnapshot::from_meta);

        if snapshot.is_none() {
            debug!(database, "Database not found on target");
        }
        Ok(snapshot)
    }

    /// Full definition of one table.
    pub async fn table_by_name(
        &self,
        database: &str,
        table: &str,
    ) -> Result<TableMeta, TargetError> {
        let snapshot = self.load(database).await?;

        snapshot
            .as_ref()
            .and_then(|db| db.table(table))
            .map(|t| t.definition().clone())
            .context(TableNotFoundSnafu { database, table })
    }

    /// Create `database` and its tables, skipping anything that already exists.
    ///
    /// `tables` maps table name to its CREATE TABLE statement; statements run
    /// in map order.
    pub async fn init_schema(
        &self,
        database: &str,
        tables: &IndexMap<String, String>,
    ) -> Result<(), TargetError> {
        let create_db = format!("CREATE DATABASE IF NOT EXISTS {}", quote_identifier(database));
        self.target.execute(None, &create_db).await?;

        for (table, statement) in tables {
            let statement = to_create_table_if_not_exists(statement);
            debug!(database, table = %table, "Creating table");
            self.target.execute(Some(database), &statement).await?;
        }

        info!(database, tables = tables.len(), "Schema initialised");
        Ok(())
    }
}
