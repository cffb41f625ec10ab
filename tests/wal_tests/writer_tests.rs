//! Tests for WAL Writer
//!
//! These tests verify:
//! - Initialization (creation, idempotence, failure)
//! - Typed writes and write-cursor accounting
//! - Flush markers and durable position
//! - Argument validation
//! - Discarding an unflushed unit

use std::fs;
use std::path::PathBuf;

use strata_wal::catalog::{ColumnDefinition, LogicalType, TableMetadata};
use strata_wal::config::DEFAULT_FILE_NAME;
use strata_wal::wal::{Entry, WalReader, WalWriter, HEADER_SIZE};
use strata_wal::{SyncMode, WalConfig, WalError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_writer() -> (TempDir, WalWriter) {
    let temp_dir = TempDir::new().unwrap();
    let mut writer = WalWriter::new(WalConfig::default());
    writer.initialize(temp_dir.path()).unwrap();
    (temp_dir, writer)
}

fn log_path(temp: &TempDir) -> PathBuf {
    temp.path().join(DEFAULT_FILE_NAME)
}

fn read_all(temp: &TempDir) -> Vec<Entry> {
    WalReader::open(&log_path(temp))
        .unwrap()
        .expect("log file exists")
        .map(|next| next.unwrap().entry)
        .collect()
}

fn users_table() -> TableMetadata {
    TableMetadata::new(
        "main",
        "users",
        vec![
            ColumnDefinition::new("id", LogicalType::Integer).not_null(),
            ColumnDefinition::new("email", LogicalType::Varchar),
        ],
    )
}

// =============================================================================
// Initialization Tests
// =============================================================================

#[test]
fn test_write_before_initialize_fails() {
    let mut writer = WalWriter::new(WalConfig::default());

    assert!(!writer.is_initialized());
    assert!(matches!(writer.write_create_schema("s"), Err(WalError::NotInitialized)));
    assert!(matches!(writer.flush(), Err(WalError::NotInitialized)));
}

#[test]
fn test_initialize_creates_file() {
    let (temp, writer) = setup_writer();

    assert!(writer.is_initialized());
    assert!(log_path(&temp).exists());
    assert_eq!(writer.path(), Some(log_path(&temp).as_path()));
    assert_eq!(writer.position(), 0);
    assert_eq!(writer.durable_position(), 0);
}

#[test]
fn test_initialize_twice_is_noop() {
    let (temp, mut writer) = setup_writer();
    writer.write_create_schema("s").unwrap();
    let end = writer.flush().unwrap();

    writer.initialize(temp.path()).unwrap();

    assert_eq!(writer.position(), end);
    assert_eq!(fs::metadata(log_path(&temp)).unwrap().len(), end);
    assert_eq!(read_all(&temp).len(), 2);
}

#[test]
fn test_initialize_existing_log_appends() {
    let (temp, mut writer) = setup_writer();
    writer.write_create_schema("first").unwrap();
    let end = writer.flush().unwrap();
    drop(writer);

    let mut writer = WalWriter::new(WalConfig::default());
    writer.initialize(temp.path()).unwrap();
    assert_eq!(writer.position(), end);
    assert_eq!(writer.durable_position(), end);

    writer.write_create_schema("second").unwrap();
    writer.flush().unwrap();

    assert_eq!(
        read_all(&temp),
        vec![
            Entry::CreateSchema { schema: "first".into() },
            Entry::Flush,
            Entry::CreateSchema { schema: "second".into() },
            Entry::Flush,
        ]
    );
}

#[test]
fn test_initialize_missing_directory_fails() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("does").join("not").join("exist");

    let mut writer = WalWriter::new(WalConfig::default());
    let err = writer.initialize(&missing).unwrap_err();

    assert!(matches!(err, WalError::Io(_)));
    assert!(!writer.is_initialized());
}

#[test]
fn test_custom_file_name() {
    let temp = TempDir::new().unwrap();
    let config = WalConfig::builder()
        .file_name("custom.log")
        .sync_mode(SyncMode::All)
        .build();

    let mut writer = WalWriter::new(config);
    writer.initialize(temp.path()).unwrap();
    writer.write_query("CHECKPOINT").unwrap();
    writer.flush().unwrap();

    assert!(temp.path().join("custom.log").exists());
    assert!(!log_path(&temp).exists());
}

// =============================================================================
// Write Tests
// =============================================================================

#[test]
fn test_writes_advance_position() {
    let (_temp, mut writer) = setup_writer();

    let first = writer.write_create_schema("main").unwrap();
    let second = writer.write_create_table(&users_table()).unwrap();

    let schema_len = Entry::CreateSchema { schema: "main".into() }.encoded_len() as u64;
    let table_len = Entry::CreateTable(users_table()).encoded_len() as u64;

    assert_eq!(first, 0);
    assert_eq!(second, schema_len);
    assert_eq!(writer.position(), schema_len + table_len);
    assert_eq!(writer.pending_entries(), 2);
    assert_eq!(writer.durable_position(), 0);
}

#[test]
fn test_all_entry_kinds_written_in_order() {
    let (temp, mut writer) = setup_writer();

    writer.write_create_schema("main").unwrap();
    writer.write_create_table(&users_table()).unwrap();
    writer.write_insert("main", "users", vec![1u8, 2, 3]).unwrap();
    writer.write_query("DELETE FROM main.users WHERE id = 1").unwrap();
    writer.write_drop_table("main", "users").unwrap();
    writer.write_drop_schema("main").unwrap();
    writer.flush().unwrap();

    let entries = read_all(&temp);
    assert_eq!(entries.len(), 7);
    assert_eq!(entries[0], Entry::CreateSchema { schema: "main".into() });
    assert_eq!(entries[1], Entry::CreateTable(users_table()));
    assert!(matches!(&entries[2], Entry::InsertTuple { batch, .. } if batch[..] == [1u8, 2, 3]));
    assert!(matches!(&entries[3], Entry::Query { sql } if sql.starts_with("DELETE")));
    assert_eq!(
        entries[4],
        Entry::DropTable {
            schema: "main".into(),
            table: "users".into()
        }
    );
    assert_eq!(entries[5], Entry::DropSchema { schema: "main".into() });
    assert_eq!(entries[6], Entry::Flush);
}

#[test]
fn test_append_flush_entry_flushes() {
    let (temp, mut writer) = setup_writer();
    writer.write_create_schema("s").unwrap();

    writer.append(&Entry::Flush).unwrap();

    assert_eq!(writer.pending_entries(), 0);
    assert_eq!(writer.durable_position(), writer.position());
    assert_eq!(read_all(&temp).last(), Some(&Entry::Flush));
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_flush_appends_marker_and_returns_durable_position() {
    let (temp, mut writer) = setup_writer();
    writer.write_create_schema("s").unwrap();
    let before = writer.position();

    let durable = writer.flush().unwrap();

    assert_eq!(durable, before + HEADER_SIZE as u64);
    assert_eq!(writer.durable_position(), durable);
    assert_eq!(writer.pending_entries(), 0);
    assert_eq!(fs::metadata(log_path(&temp)).unwrap().len(), durable);
}

#[test]
fn test_flush_without_entries_writes_marker_only() {
    let (temp, mut writer) = setup_writer();

    let durable = writer.flush().unwrap();

    assert_eq!(durable, HEADER_SIZE as u64);
    assert_eq!(read_all(&temp), vec![Entry::Flush]);
}

#[test]
fn test_multiple_flush_units() {
    let (temp, mut writer) = setup_writer();

    writer.write_create_schema("a").unwrap();
    let first = writer.flush().unwrap();
    writer.write_create_schema("b").unwrap();
    writer.write_create_schema("c").unwrap();
    let second = writer.flush().unwrap();

    assert!(second > first);
    let flushes = read_all(&temp).iter().filter(|e| **e == Entry::Flush).count();
    assert_eq!(flushes, 2);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_empty_identifiers_rejected() {
    let (_temp, mut writer) = setup_writer();

    assert!(matches!(writer.write_create_schema(""), Err(WalError::InvalidArgument(_))));
    assert!(matches!(writer.write_drop_schema(""), Err(WalError::InvalidArgument(_))));
    assert!(matches!(writer.write_drop_table("s", ""), Err(WalError::InvalidArgument(_))));
    assert!(matches!(writer.write_insert("", "t", vec![1u8]), Err(WalError::InvalidArgument(_))));
    assert!(matches!(writer.write_query(""), Err(WalError::InvalidArgument(_))));

    // Nothing reached the file.
    assert_eq!(writer.position(), 0);
}

#[test]
fn test_table_without_columns_rejected() {
    let (_temp, mut writer) = setup_writer();
    let table = TableMetadata::new("s", "t", vec![]);

    assert!(matches!(writer.write_create_table(&table), Err(WalError::InvalidArgument(_))));
}

#[test]
fn test_table_with_unnamed_column_rejected() {
    let (_temp, mut writer) = setup_writer();
    let table = TableMetadata::new("s", "t", vec![ColumnDefinition::new("", LogicalType::Integer)]);

    assert!(matches!(writer.write_create_table(&table), Err(WalError::InvalidArgument(_))));
}

#[test]
fn test_empty_batch_accepted() {
    let (_temp, mut writer) = setup_writer();

    writer.write_insert("s", "t", Vec::<u8>::new()).unwrap();
    assert_eq!(writer.pending_entries(), 1);
}

#[test]
fn test_oversized_entry_rejected() {
    let temp = TempDir::new().unwrap();
    let mut writer = WalWriter::new(WalConfig::builder().max_entry_size(64).build());
    writer.initialize(temp.path()).unwrap();

    let err = writer.write_insert("s", "t", vec![0u8; 128]).unwrap_err();
    assert!(matches!(err, WalError::InvalidArgument(_)));
    assert_eq!(writer.position(), 0);

    writer.write_insert("s", "t", vec![0u8; 16]).unwrap();
}

// =============================================================================
// Discard Tests
// =============================================================================

#[test]
fn test_discard_unflushed_rewinds_to_durable_position() {
    let (temp, mut writer) = setup_writer();
    writer.write_create_schema("kept").unwrap();
    let durable = writer.flush().unwrap();

    writer.write_create_schema("dropped").unwrap();
    writer.write_query("SELECT 1").unwrap();
    writer.discard_unflushed().unwrap();

    assert_eq!(writer.position(), durable);
    assert_eq!(writer.pending_entries(), 0);
    assert_eq!(fs::metadata(log_path(&temp)).unwrap().len(), durable);

    writer.write_create_schema("next").unwrap();
    writer.flush().unwrap();

    assert_eq!(
        read_all(&temp),
        vec![
            Entry::CreateSchema { schema: "kept".into() },
            Entry::Flush,
            Entry::CreateSchema { schema: "next".into() },
            Entry::Flush,
        ]
    );
}

#[test]
fn test_discard_before_initialize_fails() {
    let mut writer = WalWriter::new(WalConfig::default());
    assert!(matches!(writer.discard_unflushed(), Err(WalError::NotInitialized)));
}

#[test]
fn test_drop_without_flush_leaves_entries_unflushed() {
    let (temp, mut writer) = setup_writer();
    writer.write_create_schema("s").unwrap();
    drop(writer);

    // The bytes may reach the file, but no FLUSH marker follows them.
    let entries = read_all(&temp);
    assert!(!entries.contains(&Entry::Flush));
}
