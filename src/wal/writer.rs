//! WAL Writer
//!
//! Handles appending entries to the log file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::catalog::TableMetadata;
use crate::config::{SyncMode, WalConfig};
use crate::error::{Result, WalError};
use super::entry::Entry;

/// Writes entries to the log file
///
/// Starts uninitialized; `initialize()` opens the file for append. Appended
/// entries only become durable once a later `flush()` returns.
pub struct WalWriter {
    config: WalConfig,
    log: Option<OpenLog>,
    poisoned: bool,
}

/// State that only exists while the file is open
struct OpenLog {
    path: PathBuf,
    writer: BufWriter<File>,
    /// Bytes in the file, including unflushed appends
    position: u64,
    /// End of the last FLUSH marker forced to disk
    durable_position: u64,
    /// Entries appended since the last FLUSH
    pending_entries: usize,
}

impl WalWriter {
    /// Create an uninitialized writer
    pub fn new(config: WalConfig) -> Self {
        Self {
            config,
            log: None,
            poisoned: false,
        }
    }

    /// Open (or create) the log file in `dir` for append
    ///
    /// Calling this on an already initialized writer does nothing. Existing
    /// content is kept; the writer continues from the end of the file.
    pub fn initialize(&mut self, dir: &Path) -> Result<()> {
        if let Some(log) = &self.log {
            debug!(path = %log.path.display(), "WAL already initialized");
            return Ok(());
        }

        let path = self.config.log_path(dir);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let position = file.metadata()?.len();

        debug!(path = %path.display(), position, "WAL initialized");
        self.log = Some(OpenLog {
            path,
            writer: BufWriter::new(file),
            position,
            durable_position: position,
            pending_entries: 0,
        });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.log.is_some()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Path of the open log file
    pub fn path(&self) -> Option<&Path> {
        self.log.as_ref().map(|log| log.path.as_path())
    }

    /// Bytes written to the log, flushed or not
    pub fn position(&self) -> u64 {
        self.log.as_ref().map_or(0, |log| log.position)
    }

    /// End of the last durable FLUSH marker
    pub fn durable_position(&self) -> u64 {
        self.log.as_ref().map_or(0, |log| log.durable_position)
    }

    /// Entries appended since the last flush
    pub fn pending_entries(&self) -> usize {
        self.log.as_ref().map_or(0, |log| log.pending_entries)
    }

    // =========================================================================
    // Typed Writes
    // =========================================================================

    pub fn write_create_schema(&mut self, schema: &str) -> Result<u64> {
        self.append(&Entry::CreateSchema {
            schema: schema.to_string(),
        })
    }

    pub fn write_drop_schema(&mut self, schema: &str) -> Result<u64> {
        self.append(&Entry::DropSchema {
            schema: schema.to_string(),
        })
    }

    pub fn write_create_table(&mut self, table: &TableMetadata) -> Result<u64> {
        self.append(&Entry::CreateTable(table.clone()))
    }

    pub fn write_drop_table(&mut self, schema: &str, table: &str) -> Result<u64> {
        self.append(&Entry::DropTable {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    /// Log a serialized row batch; its contents are not interpreted
    pub fn write_insert(
        &mut self,
        schema: &str,
        table: &str,
        batch: impl Into<Bytes>,
    ) -> Result<u64> {
        self.append(&Entry::InsertTuple {
            schema: schema.to_string(),
            table: table.to_string(),
            batch: batch.into(),
        })
    }

    pub fn write_query(&mut self, sql: &str) -> Result<u64> {
        self.append(&Entry::Query {
            sql: sql.to_string(),
        })
    }

    // =========================================================================
    // Append / Flush
    // =========================================================================

    /// Append one entry and return the offset it was written at
    ///
    /// A `Flush` entry is routed through `flush()` so a marker is never
    /// written without forcing it to disk.
    pub fn append(&mut self, entry: &Entry) -> Result<u64> {
        if matches!(entry, Entry::Flush) {
            let offset = self.position();
            self.flush()?;
            return Ok(offset);
        }

        validate_entry(entry, self.config.max_entry_size)?;
        let log = self.open_log()?;
        let offset = log.position;
        let bytes = entry.encode();
        log.writer.write_all(&bytes)?;
        log.position += bytes.len() as u64;
        log.pending_entries += 1;

        trace!(
            kind = entry.entry_type().name(),
            offset,
            len = bytes.len(),
            "WAL entry appended"
        );
        Ok(offset)
    }

    /// Append a FLUSH marker and force everything to durable storage
    ///
    /// Returns the new durable position. Only after this returns may the
    /// entries written before it be reported committed.
    pub fn flush(&mut self) -> Result<u64> {
        let sync_mode = self.config.sync_mode;
        let log = self.open_log()?;

        let marker = Entry::Flush.encode();
        log.writer.write_all(&marker)?;
        log.position += marker.len() as u64;

        log.writer.flush()?;
        match sync_mode {
            SyncMode::Data => log.writer.get_ref().sync_data()?,
            SyncMode::All => log.writer.get_ref().sync_all()?,
        }

        debug!(
            entries = log.pending_entries,
            durable_position = log.position,
            "WAL flushed"
        );
        log.durable_position = log.position;
        log.pending_entries = 0;
        Ok(log.durable_position)
    }

    /// Drop everything appended since the last flush
    ///
    /// Buffered bytes are discarded and the file is cut back to the durable
    /// position. If that fails the writer is poisoned and refuses further
    /// writes, because its next FLUSH would make the partial unit durable.
    /// A poisoned writer stays initialized and keeps reporting its path and
    /// positions.
    pub fn discard_unflushed(&mut self) -> Result<()> {
        let Some(log) = self.log.take() else {
            return Err(WalError::NotInitialized);
        };

        let OpenLog {
            path,
            writer,
            position,
            durable_position,
            pending_entries,
        } = log;
        // Unwritten buffer contents belong to the unit being discarded.
        let (file, _buffered) = writer.into_parts();

        let truncated = file.set_len(durable_position).and_then(|_| file.sync_all());
        if let Err(err) = truncated {
            warn!(
                path = %path.display(),
                error = %err,
                "failed to discard unflushed WAL entries, writer poisoned"
            );
            self.poisoned = true;
            self.log = Some(OpenLog {
                path,
                writer: BufWriter::new(file),
                position,
                durable_position,
                pending_entries,
            });
            return Err(err.into());
        }

        debug!(entries = pending_entries, durable_position, "discarded unflushed WAL entries");
        self.log = Some(OpenLog {
            path,
            writer: BufWriter::new(file),
            position: durable_position,
            durable_position,
            pending_entries: 0,
        });
        Ok(())
    }

    fn open_log(&mut self) -> Result<&mut OpenLog> {
        if self.poisoned {
            return Err(WalError::Poisoned);
        }
        self.log.as_mut().ok_or(WalError::NotInitialized)
    }
}

// =============================================================================
// Argument Validation
// =============================================================================

/// Check an entry before it is appended
///
/// Identifiers and query text must be non-empty, tables need at least one
/// column, and the payload must fit under `max_entry_size`.
pub(crate) fn validate_entry(entry: &Entry, max_entry_size: u32) -> Result<()> {
    match entry {
        Entry::CreateSchema { schema } | Entry::DropSchema { schema } => {
            require_identifier("schema name", schema)?;
        }
        Entry::CreateTable(table) => validate_table(table)?,
        Entry::DropTable { schema, table } | Entry::InsertTuple { schema, table, .. } => {
            require_identifier("schema name", schema)?;
            require_identifier("table name", table)?;
        }
        Entry::Query { sql } => require_identifier("query text", sql)?,
        Entry::Flush => {}
    }

    let payload_len = entry.payload_len();
    if payload_len > max_entry_size as usize {
        return Err(WalError::InvalidArgument(format!(
            "{} payload of {} bytes exceeds limit {}",
            entry.entry_type().name(),
            payload_len,
            max_entry_size
        )));
    }
    Ok(())
}

fn require_identifier(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(WalError::InvalidArgument(format!("{} must not be empty", what)));
    }
    Ok(())
}

fn validate_table(table: &TableMetadata) -> Result<()> {
    require_identifier("schema name", &table.schema)?;
    require_identifier("table name", &table.name)?;
    if table.columns.is_empty() {
        return Err(WalError::InvalidArgument(format!(
            "table '{}.{}' has no columns",
            table.schema, table.name
        )));
    }
    for column in &table.columns {
        require_identifier("column name", &column.name)?;
    }
    Ok(())
}
