//! Target database collaborator.
//!
//! The importer never runs queries of its own beyond these four calls: run a
//! statement, list schema metadata, and read/write a system configuration
//! variable. `MySqlTarget` speaks the MySQL protocol; `MemoryTarget` is an
//! in-process stand-in.

mod memory;
mod mysql;

pub use memory::MemoryTarget;
pub use mysql::MySqlTarget;

use async_trait::async_trait;
use std::fmt;

use crate::error::TargetError;

/// Trait for the database an import writes into.
#[async_trait]
pub trait TargetDatabase: Send + Sync {
    /// Execute a statement, inside `database` when given.
    async fn execute(&self, database: Option<&str>, sql: &str) -> Result<(), TargetError>;

    /// Read metadata for every database on the target.
    async fn list_schemas(&self) -> Result<Vec<DatabaseMeta>, TargetError>;

    /// Read a system configuration variable verbatim.
    async fn read_config_value(&self, name: &str) -> Result<String, TargetError>;

    /// Overwrite a system configuration variable.
    async fn write_config_value(&self, name: &str, value: &str) -> Result<(), TargetError>;

    /// Release held connections. Later calls may fail.
    async fn close(&self) {}
}

/// Propagation state of a schema object.
///
/// Objects move through the intermediate states while DDL converges across
/// the cluster; only `Public` objects are usable by every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchemaState {
    #[default]
    None,
    DeleteOnly,
    WriteOnly,
    WriteReorganization,
    DeleteReorganization,
    Public,
}

impl SchemaState {
    pub fn is_public(&self) -> bool {
        matches!(self, SchemaState::Public)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaState::None => "none",
            SchemaState::DeleteOnly => "delete only",
            SchemaState::WriteOnly => "write only",
            SchemaState::WriteReorganization => "write reorganization",
            SchemaState::DeleteReorganization => "delete reorganization",
            SchemaState::Public => "public",
        }
    }
}

impl fmt::Display for SchemaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column data type, as far as import strategy cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Bit,
    Decimal,
    Float,
    Double,
    Char,
    Varchar,
    Text,
    Binary,
    Blob,
    Enum,
    Set,
    Date,
    Time,
    Datetime,
    Timestamp,
    Year,
    Json,
    Other(String),
}

impl ColumnType {
    /// Map a SQL type name (`information_schema.COLUMNS.DATA_TYPE`).
    pub fn from_sql_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "tinyint" => ColumnType::TinyInt,
            "smallint" => ColumnType::SmallInt,
            "mediumint" => ColumnType::MediumInt,
            "int" | "integer" => ColumnType::Int,
            "bigint" => ColumnType::BigInt,
            "bit" => ColumnType::Bit,
            "decimal" | "numeric" => ColumnType::Decimal,
            "float" => ColumnType::Float,
            "double" | "real" => ColumnType::Double,
            "char" => ColumnType::Char,
            "varchar" => ColumnType::Varchar,
            "tinytext" | "text" | "mediumtext" | "longtext" => ColumnType::Text,
            "binary" | "varbinary" => ColumnType::Binary,
            "tinyblob" | "blob" | "mediumblob" | "longblob" => ColumnType::Blob,
            "enum" => ColumnType::Enum,
            "set" => ColumnType::Set,
            "date" => ColumnType::Date,
            "time" => ColumnType::Time,
            "datetime" => ColumnType::Datetime,
            "timestamp" => ColumnType::Timestamp,
            "year" => ColumnType::Year,
            "json" => ColumnType::Json,
            other => ColumnType::Other(other.to_string()),
        }
    }

    /// Integer types that can serve as a row handle.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt
                | ColumnType::SmallInt
                | ColumnType::MediumInt
                | ColumnType::Int
                | ColumnType::BigInt
        )
    }
}

/// Column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub not_null: bool,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
            auto_increment: false,
            not_null: false,
        }
    }

    /// Flag as (part of) the primary key; implies NOT NULL.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

/// Index definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub primary: bool,
}

/// Full table definition as reported by the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    pub id: i64,
    pub name: String,
    pub state: SchemaState,
    pub columns: Vec<ColumnMeta>,
    pub indices: Vec<IndexMeta>,
}

impl TableMeta {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: SchemaState::Public,
            columns: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn with_state(mut self, state: SchemaState) -> Self {
        self.state = state;
        self
    }

    pub fn with_column(mut self, column: ColumnMeta) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, index: IndexMeta) -> Self {
        self.indices.push(index);
        self
    }
}

/// Database definition as reported by the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseMeta {
    pub id: i64,
    pub name: String,
    pub state: SchemaState,
    pub tables: Vec<TableMeta>,
}

impl DatabaseMeta {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: SchemaState::Public,
            tables: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: TableMeta) -> Self {
        self.tables.push(table);
        self
    }
}

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_types() {
        for name in ["TINYINT", "smallint", "mediumint", "int", "integer", "bigint"] {
            assert!(ColumnType::from_sql_name(name).is_integer(), "{name}");
        }
        for name in ["bit", "decimal", "varchar", "year", "geometry"] {
            assert!(!ColumnType::from_sql_name(name).is_integer(), "{name}");
        }
        assert_eq!(
            ColumnType::from_sql_name("geometry"),
            ColumnType::Other("geometry".to_string())
        );
    }

    #[test]
    fn test_only_public_state_is_public() {
        assert!(SchemaState::Public.is_public());
        assert!(!SchemaState::WriteReorganization.is_public());
        assert_eq!(SchemaState::WriteOnly.to_string(), "write only");
    }

    #[test]
    fn test_quote_identifier_escapes_backticks() {
        assert_eq!(quote_identifier("orders"), "`orders`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }
}
