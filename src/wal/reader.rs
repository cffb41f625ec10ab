//! WAL Reader
//!
//! Sequential, read-only cursor over the entries of a log file.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use bytes::Bytes;

use crate::config::DEFAULT_MAX_ENTRY_SIZE;
use crate::error::{Result, WalError};
use super::entry::{Entry, EntryHeader};

/// An entry together with its position in the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedEntry {
    /// Offset of the entry header
    pub offset: u64,
    /// Offset just past the payload
    pub end: u64,
    pub entry: Entry,
}

/// Reads entries from a log file
///
/// The whole file is loaded up front; entries are decoded lazily. After the
/// first decode error the reader yields nothing more, since nothing after a
/// damaged entry can be located reliably.
pub struct WalReader {
    data: Bytes,
    position: u64,
    max_entry_size: u32,
    failed: bool,
}

impl WalReader {
    /// Open a log file for reading; `Ok(None)` if it does not exist
    pub fn open(path: &Path) -> Result<Option<Self>> {
        match fs::read(path) {
            Ok(data) => Ok(Some(Self::from_bytes(Bytes::from(data)))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Read entries from an in-memory copy of a log
    pub fn from_bytes(data: Bytes) -> Self {
        Self {
            data,
            position: 0,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
            failed: false,
        }
    }

    /// Reject headers that declare payloads larger than `size`
    pub fn with_max_entry_size(mut self, size: u32) -> Self {
        self.max_entry_size = size;
        self
    }

    /// Current read offset (start of the next entry)
    pub fn offset(&self) -> u64 {
        self.position
    }

    /// Total length of the log
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> u64 {
        self.len() - self.position
    }

    /// Read the next entry
    ///
    /// Returns `None` at a clean end of file (no partial header) or after a
    /// previous error.
    pub fn next_entry(&mut self) -> Option<Result<LoggedEntry>> {
        if self.failed || self.remaining() == 0 {
            return None;
        }

        match self.peek_at(self.position) {
            Ok(logged) => {
                self.position = logged.end;
                Some(Ok(logged))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }

    /// Decode the entry at an arbitrary offset without moving the cursor
    pub fn peek_at(&self, offset: u64) -> Result<LoggedEntry> {
        let mut buf = self.tail(offset);

        let header = EntryHeader::decode(&mut buf, offset)?;
        if header.entry_type().is_none() {
            return Err(WalError::InvalidTag {
                offset,
                tag: header.tag,
            });
        }
        if header.size > self.max_entry_size {
            return Err(WalError::MalformedPayload {
                offset,
                reason: format!(
                    "declared size {} exceeds limit {}",
                    header.size, self.max_entry_size
                ),
            });
        }

        let entry = Entry::decode_payload(&header, &mut buf, offset)?;
        Ok(LoggedEntry {
            offset,
            end: header.end_offset(offset),
            entry,
        })
    }

    /// Decode only the header at `offset`, valid tag or not
    pub fn header_at(&self, offset: u64) -> Result<EntryHeader> {
        EntryHeader::decode(&mut self.tail(offset), offset)
    }

    fn tail(&self, offset: u64) -> Bytes {
        let start = (offset as usize).min(self.data.len());
        self.data.slice(start..)
    }
}

impl Iterator for WalReader {
    type Item = Result<LoggedEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry()
    }
}
