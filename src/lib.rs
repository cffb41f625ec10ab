//! # Strata WAL
//!
//! The durability layer of an embedded analytical database:
//! - Write-Ahead Logging (WAL) of catalog and data mutations
//! - FLUSH markers delimiting durable, atomically replayable units
//! - Crash recovery with torn-tail detection and truncation
//! - Single-writer append path shared by concurrent transactions
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Transactions (many threads)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ LogTransaction (buffered entries)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   WriteAheadLog::commit                      │
//! │            (Mutex: append unit, then FLUSH + fsync)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  WalWriter  │          │ Entry codec │
//!   │  (Append)   │          │  (no I/O)   │
//!   └──────┬──────┘          └─────────────┘
//!          │ log file
//!          ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  WalReplay  │ ───────▶ │  Database   │
//!   │  (startup)  │          │  (catalog)  │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod catalog;
pub mod wal;
pub mod log;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, WalError};
pub use config::{SyncMode, WalConfig};
pub use catalog::{ColumnDefinition, Database, LogicalType, MemoryDatabase, TableMetadata};
pub use log::{LogTransaction, WriteAheadLog};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
