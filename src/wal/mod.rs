//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Encode catalog and data mutations as self-describing entries
//! - Append entries and force them to disk at transaction commit
//! - CRC32 checksums for torn-write detection
//! - Crash recovery: replay flushed units, truncate the torn tail
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Entry 1                                      │
//! │ ┌─────────┬──────────┬─────────┬──────────┐  │
//! │ │ Tag (1) │ Size (4) │ CRC (4) │ Payload  │  │
//! │ └─────────┴──────────┴─────────┴──────────┘  │
//! ├──────────────────────────────────────────────┤
//! │ ...                                          │
//! ├──────────────────────────────────────────────┤
//! │ FLUSH   │ 0        │ CRC     │              │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Everything up to and including a FLUSH marker forms one durable unit.
//! Entries after the last marker never reach the database on replay.

mod entry;
mod writer;
mod reader;
mod replay;

pub use entry::{
    compute_checksum, encode_blob, encode_header, encode_string, Entry, EntryHeader, EntryType,
    HEADER_SIZE,
};
pub use writer::WalWriter;
pub(crate) use writer::validate_entry;
pub use reader::{LoggedEntry, WalReader};
pub use replay::{ReplayResult, WalReplay};
