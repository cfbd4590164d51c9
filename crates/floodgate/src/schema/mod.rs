//! Point-in-time view of a target database's schema.
//!
//! - `loader`: builds snapshots from the target and bootstraps schemas
//! - `readiness`: polls snapshots until every table is usable
//!
//! A snapshot is captured fresh on every load and never updated afterwards.
//! It describes the target only for the instant it was read.

mod loader;
mod readiness;

pub use loader::{SchemaLoader, to_create_table_if_not_exists};
pub use readiness::{ReadinessOutcome, ReadinessPolicy, SchemaSynchronizer};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::target::{DatabaseMeta, SchemaState, TableMeta};

/// Snapshot of one database and its tables.
#[derive(Debug, Clone)]
pub struct DatabaseSnapshot {
    pub id: i64,
    pub name: String,
    pub state: SchemaState,
    pub available: bool,
    pub tables: BTreeMap<String, TableSnapshot>,
}

impl DatabaseSnapshot {
    pub fn from_meta(meta: DatabaseMeta) -> Self {
        let tables = meta
            .tables
            .into_iter()
            .map(|table| (table.name.clone(), TableSnapshot::from_meta(table)))
            .collect();

        Self {
            id: meta.id,
            available: meta.state.is_public(),
            state: meta.state,
            name: meta.name,
            tables,
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.get(name)
    }

    /// True when every table has fully propagated. Vacuously true when empty.
    pub fn all_tables_available(&self) -> bool {
        self.tables.values().all(|t| t.available)
    }

    /// Add a placeholder for every name in `expected` that is not listed.
    ///
    /// A table missing from the listing has not propagated yet, so the
    /// placeholder is unavailable with state `none`.
    pub fn expect_tables<'a>(&mut self, expected: impl IntoIterator<Item = &'a str>) {
        for name in expected {
            if !self.tables.contains_key(name) {
                self.tables.insert(name.to_string(), TableSnapshot::absent(name));
            }
        }
    }

    /// Names of tables that are not yet available, in name order.
    pub fn unavailable_tables(&self) -> Vec<String> {
        self.tables
            .values()
            .filter(|t| !t.available)
            .map(|t| t.name.clone())
            .collect()
    }
}

/// Snapshot of one table.
///
/// Key predicates are computed from the captured definition on each call.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    pub id: i64,
    pub name: String,
    pub columns: usize,
    pub indices: usize,
    pub state: SchemaState,
    pub available: bool,
    core: Arc<TableMeta>,
}

impl TableSnapshot {
    pub fn from_meta(meta: TableMeta) -> Self {
        Self {
            id: meta.id,
            name: meta.name.clone(),
            columns: meta.columns.len(),
            indices: meta.indices.len(),
            state: meta.state,
            available: meta.state.is_public(),
            core: Arc::new(meta),
        }
    }

    /// Placeholder for a table the target does not list yet.
    pub fn absent(name: &str) -> Self {
        Self::from_meta(TableMeta::new(0, name).with_state(SchemaState::None))
    }

    /// Full definition the snapshot was built from.
    pub fn definition(&self) -> &TableMeta {
        &self.core
    }

    pub fn has_explicit_primary_key(&self) -> bool {
        self.core.columns.iter().any(|c| c.primary_key)
    }

    /// The primary key is a single integer column, usable as the row handle.
    pub fn has_integer_primary_key(&self) -> bool {
        let mut keys = self.core.columns.iter().filter(|c| c.primary_key);
        match (keys.next(), keys.next()) {
            (Some(column), None) => column.column_type.is_integer(),
            _ => false,
        }
    }

    pub fn has_auto_increment_primary_key(&self) -> bool {
        self.core
            .columns
            .iter()
            .any(|c| c.primary_key && c.auto_increment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{ColumnMeta, ColumnType, IndexMeta};

    #[test]
    fn test_integer_auto_increment_key() {
        let table = TableSnapshot::from_meta(
            TableMeta::new(1, "orders")
                .with_column(
                    ColumnMeta::new("id", ColumnType::BigInt)
                        .primary_key()
                        .auto_increment(),
                )
                .with_column(ColumnMeta::new("note", ColumnType::Text))
                .with_index(IndexMeta {
                    name: "PRIMARY".to_string(),
                    columns: vec!["id".to_string()],
                    unique: true,
                    primary: true,
                }),
        );

        assert_eq!(table.columns, 2);
        assert_eq!(table.indices, 1);
        assert!(table.has_explicit_primary_key());
        assert!(table.has_integer_primary_key());
        assert!(table.has_auto_increment_primary_key());
    }

    #[test]
    fn test_no_primary_key() {
        let table = TableSnapshot::from_meta(
            TableMeta::new(2, "events")
                .with_column(ColumnMeta::new("ts", ColumnType::Timestamp))
                .with_column(ColumnMeta::new("n", ColumnType::Int).auto_increment()),
        );

        assert!(!table.has_explicit_primary_key());
        assert!(!table.has_integer_primary_key());
        assert!(!table.has_auto_increment_primary_key());
    }

    #[test]
    fn test_composite_or_non_integer_key_is_not_a_handle() {
        let composite = TableSnapshot::from_meta(
            TableMeta::new(3, "pairs")
                .with_column(ColumnMeta::new("a", ColumnType::Int).primary_key())
                .with_column(ColumnMeta::new("b", ColumnType::Int).primary_key()),
        );
        assert!(composite.has_explicit_primary_key());
        assert!(!composite.has_integer_primary_key());

        let text_key = TableSnapshot::from_meta(
            TableMeta::new(4, "users")
                .with_column(ColumnMeta::new("email", ColumnType::Varchar).primary_key()),
        );
        assert!(text_key.has_explicit_primary_key());
        assert!(!text_key.has_integer_primary_key());
        assert!(!text_key.has_auto_increment_primary_key());
    }

    #[test]
    fn test_availability_follows_state() {
        let db = DatabaseSnapshot::from_meta(
            DatabaseMeta::new(7, "shop")
                .with_table(TableMeta::new(1, "a"))
                .with_table(TableMeta::new(2, "b").with_state(SchemaState::WriteOnly))
                .with_table(TableMeta::new(3, "c").with_state(SchemaState::DeleteOnly)),
        );

        assert!(db.available);
        assert!(!db.all_tables_available());
        assert_eq!(db.unavailable_tables(), vec!["b", "c"]);
        assert!(db.table("a").is_some_and(|t| t.available));
        assert!(db.table("missing").is_none());
    }

    #[test]
    fn test_expected_but_unlisted_tables_are_unavailable() {
        let mut db = DatabaseSnapshot::from_meta(
            DatabaseMeta::new(7, "shop").with_table(TableMeta::new(1, "orders")),
        );
        db.expect_tables(["orders", "items"]);

        assert!(!db.all_tables_available());
        assert_eq!(db.unavailable_tables(), vec!["items"]);
        let items = db.table("items").unwrap();
        assert_eq!(items.state, SchemaState::None);
        assert!(!items.has_explicit_primary_key());
        assert!(db.table("orders").is_some_and(|t| t.available));
    }

    #[test]
    fn test_empty_database_is_ready() {
        let db = DatabaseSnapshot::from_meta(DatabaseMeta::new(1, "empty"));
        assert!(db.all_tables_available());
        assert!(db.unavailable_tables().is_empty());
    }
}
