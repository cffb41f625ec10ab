//! Catalog Contracts
//!
//! Types and the database handle interface the WAL needs from the rest of
//! the database. The WAL serializes what it is handed here and, on replay,
//! calls back into a `Database` to recreate state.
//!
//! ## Responsibilities
//! - Column and table metadata sufficient to recreate a table
//! - The `Database` trait replay dispatches against
//! - A reference in-memory implementation (`MemoryDatabase`)

mod memory;

pub use memory::{DataChunk, MemoryDatabase, MemoryTable, Value};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Logical column type, stored in the log as a single byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogicalType {
    Boolean = 1,
    TinyInt = 2,
    SmallInt = 3,
    Integer = 4,
    BigInt = 5,
    Double = 6,
    Varchar = 7,
    Date = 8,
    Timestamp = 9,
    Blob = 10,
}

impl LogicalType {
    /// Stable on-disk code
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse an on-disk code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(LogicalType::Boolean),
            2 => Some(LogicalType::TinyInt),
            3 => Some(LogicalType::SmallInt),
            4 => Some(LogicalType::Integer),
            5 => Some(LogicalType::BigInt),
            6 => Some(LogicalType::Double),
            7 => Some(LogicalType::Varchar),
            8 => Some(LogicalType::Date),
            9 => Some(LogicalType::Timestamp),
            10 => Some(LogicalType::Blob),
            _ => None,
        }
    }
}

/// A single column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub logical_type: LogicalType,
    pub nullable: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable: true,
        }
    }

    /// Mark the column NOT NULL
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Everything needed to recreate a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableMetadata {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<ColumnDefinition>,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns,
        }
    }
}

/// Database handle that replay applies logged operations to
///
/// Implemented by the surrounding database (catalog, data store and query
/// engine). Every method must apply the change fully or return an error.
pub trait Database {
    fn create_schema(&mut self, name: &str) -> Result<()>;

    fn drop_schema(&mut self, name: &str) -> Result<()>;

    fn create_table(&mut self, table: &TableMetadata) -> Result<()>;

    fn drop_table(&mut self, schema: &str, table: &str) -> Result<()>;

    /// Append a serialized row batch; the WAL never interprets `batch`
    fn insert_row_batch(&mut self, schema: &str, table: &str, batch: &[u8]) -> Result<()>;

    /// Re-run a logged query string
    fn execute(&mut self, query: &str) -> Result<()>;
}
