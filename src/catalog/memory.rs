//! In-memory database handle
//!
//! BTreeMap-backed catalog and row store. Row batches arrive as bincode
//! encoded `DataChunk`s; query strings are recorded rather than executed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Database, TableMetadata};
use crate::error::{Result, WalError};

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Varchar(String),
    Blob(Vec<u8>),
}

/// A batch of rows, serialized into the opaque blob carried by insert entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataChunk {
    pub rows: Vec<Vec<Value>>,
}

impl DataChunk {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// A table and its rows
#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub metadata: TableMetadata,
    pub rows: Vec<Vec<Value>>,
}

impl MemoryTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Reference `Database` implementation kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    /// schema name → table name → table
    schemas: BTreeMap<String, BTreeMap<String, MemoryTable>>,

    /// Query strings handed to `execute`, in order
    executed: Vec<String>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_schema(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn schema_names(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).collect()
    }

    pub fn table(&self, schema: &str, name: &str) -> Option<&MemoryTable> {
        self.schemas.get(schema).and_then(|tables| tables.get(name))
    }

    /// Tables of a schema, in name order
    pub fn tables(&self, schema: &str) -> Vec<&MemoryTable> {
        self.schemas
            .get(schema)
            .map(|tables| tables.values().collect())
            .unwrap_or_default()
    }

    pub fn executed_queries(&self) -> &[String] {
        &self.executed
    }

    /// True when no schema exists and no query was executed
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.executed.is_empty()
    }

    fn schema_mut(&mut self, name: &str) -> Result<&mut BTreeMap<String, MemoryTable>> {
        self.schemas
            .get_mut(name)
            .ok_or_else(|| WalError::Catalog(format!("schema '{}' does not exist", name)))
    }
}

impl Database for MemoryDatabase {
    fn create_schema(&mut self, name: &str) -> Result<()> {
        if self.schemas.contains_key(name) {
            return Err(WalError::Catalog(format!("schema '{}' already exists", name)));
        }
        self.schemas.insert(name.to_string(), BTreeMap::new());
        Ok(())
    }

    fn drop_schema(&mut self, name: &str) -> Result<()> {
        self.schemas
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| WalError::Catalog(format!("schema '{}' does not exist", name)))
    }

    fn create_table(&mut self, table: &TableMetadata) -> Result<()> {
        let tables = self.schema_mut(&table.schema)?;
        if tables.contains_key(&table.name) {
            return Err(WalError::Catalog(format!(
                "table '{}.{}' already exists",
                table.schema, table.name
            )));
        }
        tables.insert(
            table.name.clone(),
            MemoryTable {
                metadata: table.clone(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    fn drop_table(&mut self, schema: &str, table: &str) -> Result<()> {
        self.schema_mut(schema)?
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| missing_table(schema, table))
    }

    fn insert_row_batch(&mut self, schema: &str, table: &str, batch: &[u8]) -> Result<()> {
        let chunk = DataChunk::from_bytes(batch)?;
        let target = self
            .schema_mut(schema)?
            .get_mut(table)
            .ok_or_else(|| missing_table(schema, table))?;

        let columns = &target.metadata.columns;
        for row in &chunk.rows {
            if row.len() != columns.len() {
                return Err(WalError::Catalog(format!(
                    "row has {} values, table '{}.{}' has {} columns",
                    row.len(),
                    schema,
                    table,
                    columns.len()
                )));
            }
            for (value, column) in row.iter().zip(columns) {
                if !column.nullable && *value == Value::Null {
                    return Err(WalError::Catalog(format!(
                        "NULL in NOT NULL column '{}'",
                        column.name
                    )));
                }
            }
        }

        target.rows.extend(chunk.rows);
        Ok(())
    }

    fn execute(&mut self, query: &str) -> Result<()> {
        self.executed.push(query.to_string());
        Ok(())
    }
}

fn missing_table(schema: &str, table: &str) -> WalError {
    WalError::Catalog(format!("table '{}.{}' does not exist", schema, table))
}
