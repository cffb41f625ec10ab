//! WAL Replay
//!
//! Rebuilds database state from the log on startup.
//!
//! Entries are buffered until the FLUSH marker that closes their unit and
//! only then applied, so a crash can never expose half a transaction. The
//! first entry that fails to decode ends replay; everything after the last
//! FLUSH is discarded and cut off the file. `verify` reads without touching
//! anything.

use std::fs::OpenOptions;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::catalog::Database;
use crate::config::WalConfig;
use crate::error::{Result, WalError};
use super::entry::Entry;
use super::reader::{LoggedEntry, WalReader};

/// Replays a log file against a database handle
pub struct WalReplay {
    config: WalConfig,
}

/// Result of a replay or verify pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayResult {
    /// Entries applied (or, when verifying, that would be applied)
    pub entries_replayed: u64,

    /// FLUSH markers reached
    pub transactions_replayed: u64,

    /// Well-formed entries after the last FLUSH that were dropped
    pub entries_discarded: u64,

    /// End of the last FLUSH marker; the log's valid length
    pub valid_length: u64,

    /// Length of the file before replay
    pub file_length: u64,

    /// Whether the file was cut back to `valid_length`
    pub was_truncated: bool,

    /// Decode error that ended replay early, if any
    pub stop_reason: Option<String>,
}

impl ReplayResult {
    /// True if the file holds bytes past its valid length
    pub fn has_torn_tail(&self) -> bool {
        self.file_length > self.valid_length
    }
}

impl WalReplay {
    pub fn new(config: &WalConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Replay the log at `path` into `db`
    ///
    /// A missing file is an empty log. Decode failures after the last FLUSH
    /// are the expected residue of a crash and end replay normally; a
    /// failure inside the final flushed unit is treated the same way. Only a
    /// failure followed by at least one further complete flushed unit is
    /// reported as `WalError::Corruption`, and it leaves the file untouched.
    pub fn replay(&self, path: &Path, db: &mut dyn Database) -> Result<ReplayResult> {
        self.run(path, Some(db), true)
    }

    /// Replay into `db` but leave the file as it is
    pub fn dry_run(&self, path: &Path, db: &mut dyn Database) -> Result<ReplayResult> {
        self.run(path, Some(db), false)
    }

    /// Scan the log without applying or truncating anything
    pub fn verify(&self, path: &Path) -> Result<ReplayResult> {
        self.run(path, None, false)
    }

    fn run(
        &self,
        path: &Path,
        mut db: Option<&mut dyn Database>,
        truncate: bool,
    ) -> Result<ReplayResult> {
        let Some(reader) = WalReader::open(path)? else {
            debug!(path = %path.display(), "no WAL to replay");
            return Ok(ReplayResult::default());
        };
        let mut reader = reader.with_max_entry_size(self.config.max_entry_size);

        let mut result = ReplayResult {
            file_length: reader.len(),
            ..ReplayResult::default()
        };
        let mut pending: Vec<LoggedEntry> = Vec::new();
        let mut stop = None;

        while let Some(next) = reader.next_entry() {
            let logged = match next {
                Ok(logged) => logged,
                Err(err) => {
                    stop = Some(err);
                    break;
                }
            };

            if logged.entry != Entry::Flush {
                pending.push(logged);
                continue;
            }

            result.entries_replayed += pending.len() as u64;
            for op in pending.drain(..) {
                if let Some(db) = db.as_deref_mut() {
                    apply(db, op)?;
                }
            }
            result.transactions_replayed += 1;
            result.valid_length = logged.end;
        }

        if let Some(err) = stop {
            let flushed_after = flushed_units_after(&reader, &err);
            if flushed_after > 1 {
                error!(
                    path = %path.display(),
                    error = %err,
                    valid_length = result.valid_length,
                    "flushed WAL units follow a damaged entry"
                );
                return Err(WalError::Corruption {
                    offset: err.offset().unwrap_or(result.valid_length),
                    reason: err.to_string(),
                });
            }

            let mut reason = err.to_string();
            if flushed_after == 1 {
                // The damaged unit is the last one; its flush may never have returned.
                warn!(
                    path = %path.display(),
                    error = %err,
                    "damaged entry belongs to the final flushed unit, discarding it"
                );
                reason.push_str(" (final flushed unit discarded)");
            }
            result.stop_reason = Some(reason);
        }
        result.entries_discarded = pending.len() as u64;

        if result.has_torn_tail() {
            warn!(
                path = %path.display(),
                valid_length = result.valid_length,
                file_length = result.file_length,
                discarded = result.entries_discarded,
                reason = result.stop_reason.as_deref().unwrap_or("unflushed entries"),
                "WAL has a torn tail"
            );
            if truncate {
                let file = OpenOptions::new().write(true).open(path)?;
                file.set_len(result.valid_length)?;
                file.sync_all()?;
                result.was_truncated = true;
            }
        }

        info!(
            entries = result.entries_replayed,
            transactions = result.transactions_replayed,
            valid_length = result.valid_length,
            truncated = result.was_truncated,
            "WAL replay complete"
        );
        Ok(result)
    }
}

/// Dispatch one decoded entry to the database handle
fn apply(db: &mut dyn Database, logged: LoggedEntry) -> Result<()> {
    let offset = logged.offset;
    let applied = match logged.entry {
        Entry::CreateSchema { schema } => db.create_schema(&schema),
        Entry::DropSchema { schema } => db.drop_schema(&schema),
        Entry::CreateTable(table) => db.create_table(&table),
        Entry::DropTable { schema, table } => db.drop_table(&schema, &table),
        Entry::InsertTuple { schema, table, batch } => {
            db.insert_row_batch(&schema, &table, &batch)
        }
        Entry::Query { sql } => db.execute(&sql),
        Entry::Flush => Ok(()),
    };

    applied.map_err(|err| match err {
        WalError::Catalog(msg) => {
            WalError::Catalog(format!("{} (WAL entry at offset {})", msg, offset))
        }
        other => other,
    })
}

/// Number of decodable FLUSH markers past the damaged entry, capped at two
///
/// The first marker closes the damaged unit itself. Only a second one shows
/// that durable history was written after the damage. Damage inside an entry
/// whose declared size does not fit in the file is always at the tail.
fn flushed_units_after(reader: &WalReader, err: &WalError) -> usize {
    let offset = match err {
        WalError::InvalidTag { offset, .. }
        | WalError::ChecksumMismatch { offset, .. }
        | WalError::MalformedPayload { offset, .. } => *offset,
        _ => return 0,
    };
    let Ok(header) = reader.header_at(offset) else {
        return 0;
    };

    let mut flushes = 0;
    let mut next = header.end_offset(offset);
    while next < reader.len() && flushes < 2 {
        match reader.peek_at(next) {
            Ok(logged) => {
                if logged.entry == Entry::Flush {
                    flushes += 1;
                }
                next = logged.end;
            }
            Err(_) => break,
        }
    }
    flushes
}
