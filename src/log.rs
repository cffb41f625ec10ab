//! Write-Ahead Log Coordinator
//!
//! Ties replay and the writer together for a database directory.
//!
//! ## Responsibilities
//! - Replay the existing log before anything is appended
//! - Hand out transaction buffers that touch nothing until commit
//! - Serialize commits so each unit lands contiguously, followed by its FLUSH

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::catalog::{Database, TableMetadata};
use crate::config::WalConfig;
use crate::error::{Result, WalError};
use crate::wal::{validate_entry, Entry, ReplayResult, WalReplay, WalWriter};

/// The write-ahead log of one database directory
///
/// ## Concurrency Model
///
/// - Transactions build their entries independently in a `LogTransaction`
/// - `commit()` holds the writer lock for exactly "append entries, flush"
/// - Units from different transactions appear back to back in lock order
pub struct WriteAheadLog {
    /// Database directory holding the log file
    dir: PathBuf,

    config: WalConfig,

    /// Exclusive owner of the append cursor
    writer: Mutex<WalWriter>,
}

impl WriteAheadLog {
    /// Replay the log in `dir` into `db`, then open it for append
    ///
    /// On startup:
    /// 1. Create the directory if it doesn't exist
    /// 2. Replay flushed units, truncating any torn tail
    /// 3. Initialize the writer at the end of the valid prefix
    pub fn open(
        dir: &Path,
        config: WalConfig,
        db: &mut dyn Database,
    ) -> Result<(Self, ReplayResult)> {
        fs::create_dir_all(dir)?;

        let path = config.log_path(dir);
        let replayed = WalReplay::new(&config).replay(&path, db)?;

        let mut writer = WalWriter::new(config.clone());
        writer.initialize(dir)?;

        let wal = Self {
            dir: dir.to_path_buf(),
            config,
            writer: Mutex::new(writer),
        };
        Ok((wal, replayed))
    }

    /// Open with default config
    pub fn open_path(dir: &Path, db: &mut dyn Database) -> Result<(Self, ReplayResult)> {
        Self::open(dir, WalConfig::default(), db)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the log file
    pub fn path(&self) -> PathBuf {
        self.config.log_path(&self.dir)
    }

    pub fn config(&self) -> &WalConfig {
        &self.config
    }

    /// End of the last durable unit
    pub fn durable_position(&self) -> u64 {
        self.writer.lock().durable_position()
    }

    /// Start collecting a transaction's entries
    pub fn begin(&self) -> LogTransaction {
        LogTransaction {
            entries: Vec::new(),
            max_entry_size: self.config.max_entry_size,
        }
    }

    /// Append a transaction's entries and make them durable
    ///
    /// Returns the durable position once the FLUSH marker is on disk; only
    /// then may the transaction be reported committed. An empty transaction
    /// writes nothing. If any step fails, the partial unit is discarded so a
    /// later FLUSH cannot make it durable.
    pub fn commit(&self, txn: LogTransaction) -> Result<u64> {
        let mut writer = self.writer.lock();
        if txn.is_empty() {
            return Ok(writer.durable_position());
        }

        let written = txn
            .entries
            .iter()
            .try_for_each(|entry| writer.append(entry).map(|_| ()))
            .and_then(|_| writer.flush());

        match written {
            Ok(position) => {
                debug!(entries = txn.entries.len(), position, "WAL transaction committed");
                Ok(position)
            }
            Err(err) => {
                if !matches!(err, WalError::Poisoned | WalError::NotInitialized) {
                    if let Err(discard_err) = writer.discard_unflushed() {
                        warn!(error = %discard_err, "could not discard failed WAL unit");
                    }
                }
                Err(err)
            }
        }
    }
}

/// Entries of one transaction, buffered until commit
///
/// Dropping a transaction without committing it leaves the log untouched.
#[derive(Debug)]
pub struct LogTransaction {
    entries: Vec<Entry>,
    max_entry_size: u32,
}

impl LogTransaction {
    pub fn create_schema(&mut self, schema: &str) -> Result<()> {
        self.push(Entry::CreateSchema {
            schema: schema.to_string(),
        })
    }

    pub fn drop_schema(&mut self, schema: &str) -> Result<()> {
        self.push(Entry::DropSchema {
            schema: schema.to_string(),
        })
    }

    pub fn create_table(&mut self, table: &TableMetadata) -> Result<()> {
        self.push(Entry::CreateTable(table.clone()))
    }

    pub fn drop_table(&mut self, schema: &str, table: &str) -> Result<()> {
        self.push(Entry::DropTable {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    pub fn insert(&mut self, schema: &str, table: &str, batch: impl Into<Bytes>) -> Result<()> {
        self.push(Entry::InsertTuple {
            schema: schema.to_string(),
            table: table.to_string(),
            batch: batch.into(),
        })
    }

    pub fn query(&mut self, sql: &str) -> Result<()> {
        self.push(Entry::Query {
            sql: sql.to_string(),
        })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: Entry) -> Result<()> {
        validate_entry(&entry, self.max_entry_size)?;
        self.entries.push(entry);
        Ok(())
    }
}
