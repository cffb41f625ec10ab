//! WAL Entry definitions
//!
//! Defines the on-disk structure of a single log entry and the pure
//! encode/decode primitives for it. Nothing in here touches a file.
//!
//! ## Payload Layouts
//! - CREATE_SCHEMA / DROP_SCHEMA: schema
//! - CREATE_TABLE:  schema + table + column_count (4) + columns
//!   - column:      name + type code (1) + nullable (1)
//! - DROP_TABLE:    schema + table
//! - INSERT_TUPLE:  schema + table + batch (length-prefixed blob)
//! - QUERY:         query text
//! - FLUSH:         empty
//!
//! Strings and blobs are a 4 byte little-endian length followed by the raw
//! bytes, so a decoder never scans for terminators.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::catalog::{ColumnDefinition, LogicalType, TableMetadata};
use crate::error::{Result, WalError};

/// Header size: tag (1) + payload size (4) + checksum (4)
pub const HEADER_SIZE: usize = 9;

/// Width of a length prefix for strings and blobs
const LEN_PREFIX_SIZE: usize = 4;

// =============================================================================
// Entry Type
// =============================================================================

/// Type tag stored in the first byte of every entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntryType {
    DropTable = 1,
    CreateTable = 2,
    DropSchema = 3,
    CreateSchema = 4,
    InsertTuple = 5,
    Query = 6,
    Flush = 100,
}

impl EntryType {
    /// Parse a raw tag; `None` for anything that is not a defined kind
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(EntryType::DropTable),
            2 => Some(EntryType::CreateTable),
            3 => Some(EntryType::DropSchema),
            4 => Some(EntryType::CreateSchema),
            5 => Some(EntryType::InsertTuple),
            6 => Some(EntryType::Query),
            100 => Some(EntryType::Flush),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            EntryType::DropTable => "DROP_TABLE",
            EntryType::CreateTable => "CREATE_TABLE",
            EntryType::DropSchema => "DROP_SCHEMA",
            EntryType::CreateSchema => "CREATE_SCHEMA",
            EntryType::InsertTuple => "INSERT_TUPLE",
            EntryType::Query => "QUERY",
            EntryType::Flush => "FLUSH",
        }
    }
}

// =============================================================================
// Entry Header
// =============================================================================

/// Fixed-size header preceding every payload
///
/// The tag is kept raw so a header can be decoded before it is known to be
/// valid; `entry_type()` performs the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub tag: u8,
    /// Exact byte length of the payload that follows
    pub size: u32,
    /// CRC32 over tag, size and payload
    pub checksum: u32,
}

impl EntryHeader {
    pub fn entry_type(&self) -> Option<EntryType> {
        EntryType::from_tag(self.tag)
    }

    /// Decode a header from `buf`
    ///
    /// `offset` is the file position of the header, used only for error
    /// reporting. Consumes exactly `HEADER_SIZE` bytes on success.
    pub fn decode(buf: &mut impl Buf, offset: u64) -> Result<Self> {
        if buf.remaining() < HEADER_SIZE {
            return Err(WalError::CorruptHeader {
                offset,
                available: buf.remaining(),
            });
        }

        let tag = buf.get_u8();
        let size = buf.get_u32_le();
        let checksum = buf.get_u32_le();
        Ok(Self { tag, size, checksum })
    }

    /// File offset just past the payload of an entry starting at `offset`
    pub fn end_offset(&self, offset: u64) -> u64 {
        offset + HEADER_SIZE as u64 + self.size as u64
    }
}

/// Encode a header into its fixed-width representation
pub fn encode_header(entry_type: EntryType, size: u32, checksum: u32) -> [u8; HEADER_SIZE] {
    let mut out = [0u8; HEADER_SIZE];
    out[0] = entry_type.tag();
    out[1..5].copy_from_slice(&size.to_le_bytes());
    out[5..9].copy_from_slice(&checksum.to_le_bytes());
    out
}

/// Checksum over everything in an entry except the checksum field itself
pub fn compute_checksum(tag: u8, size: u32, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[tag]);
    hasher.update(&size.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}

// =============================================================================
// Field Encoders
// =============================================================================

/// Length-prefixed string (u32 length, then UTF-8 bytes)
pub fn encode_string(buf: &mut impl BufMut, value: &str) {
    encode_blob(buf, value.as_bytes());
}

/// Length-prefixed opaque bytes
pub fn encode_blob(buf: &mut impl BufMut, value: &[u8]) {
    buf.put_u32_le(len_prefix(value.len()));
    buf.put_slice(value);
}

/// Narrow a length to its on-disk u32 form
///
/// Writers reject oversized entries before encoding, so an overflow here is
/// a caller bug.
fn len_prefix(len: usize) -> u32 {
    debug_assert!(
        u32::try_from(len).is_ok(),
        "length {} does not fit a u32 prefix",
        len
    );
    len as u32
}

fn encode_columns(buf: &mut impl BufMut, columns: &[ColumnDefinition]) {
    buf.put_u32_le(len_prefix(columns.len()));
    for column in columns {
        encode_string(buf, &column.name);
        buf.put_u8(column.logical_type.code());
        buf.put_u8(column.nullable as u8);
    }
}

// =============================================================================
// Entry
// =============================================================================

/// A decoded log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    CreateSchema { schema: String },
    DropSchema { schema: String },
    CreateTable(TableMetadata),
    DropTable { schema: String, table: String },
    InsertTuple { schema: String, table: String, batch: Bytes },
    Query { sql: String },
    Flush,
}

impl Entry {
    pub fn entry_type(&self) -> EntryType {
        match self {
            Entry::CreateSchema { .. } => EntryType::CreateSchema,
            Entry::DropSchema { .. } => EntryType::DropSchema,
            Entry::CreateTable(_) => EntryType::CreateTable,
            Entry::DropTable { .. } => EntryType::DropTable,
            Entry::InsertTuple { .. } => EntryType::InsertTuple,
            Entry::Query { .. } => EntryType::Query,
            Entry::Flush => EntryType::Flush,
        }
    }

    /// Exact size of the encoded payload
    pub fn payload_len(&self) -> usize {
        let string = |s: &str| LEN_PREFIX_SIZE + s.len();
        match self {
            Entry::CreateSchema { schema } | Entry::DropSchema { schema } => string(schema),
            Entry::CreateTable(table) => {
                string(&table.schema)
                    + string(&table.name)
                    + LEN_PREFIX_SIZE
                    + table
                        .columns
                        .iter()
                        .map(|c| string(&c.name) + 2)
                        .sum::<usize>()
            }
            Entry::DropTable { schema, table } => string(schema) + string(table),
            Entry::InsertTuple { schema, table, batch } => {
                string(schema) + string(table) + LEN_PREFIX_SIZE + batch.len()
            }
            Entry::Query { sql } => string(sql),
            Entry::Flush => 0,
        }
    }

    /// Size of header + payload on disk
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload_len()
    }

    /// Append only the payload bytes to `buf`
    pub fn encode_payload(&self, buf: &mut impl BufMut) {
        match self {
            Entry::CreateSchema { schema } | Entry::DropSchema { schema } => {
                encode_string(buf, schema);
            }
            Entry::CreateTable(table) => {
                encode_string(buf, &table.schema);
                encode_string(buf, &table.name);
                encode_columns(buf, &table.columns);
            }
            Entry::DropTable { schema, table } => {
                encode_string(buf, schema);
                encode_string(buf, table);
            }
            Entry::InsertTuple { schema, table, batch } => {
                encode_string(buf, schema);
                encode_string(buf, table);
                encode_blob(buf, batch);
            }
            Entry::Query { sql } => encode_string(buf, sql),
            Entry::Flush => {}
        }
    }

    /// Encode header + payload
    pub fn encode(&self) -> Bytes {
        let payload_len = self.payload_len();
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload_len);
        buf.put_bytes(0, HEADER_SIZE);
        self.encode_payload(&mut buf);
        debug_assert_eq!(buf.len(), HEADER_SIZE + payload_len);

        let entry_type = self.entry_type();
        let size = len_prefix(payload_len);
        let checksum = compute_checksum(entry_type.tag(), size, &buf[HEADER_SIZE..]);
        buf[..HEADER_SIZE].copy_from_slice(&encode_header(entry_type, size, checksum));
        buf.freeze()
    }

    /// Decode the payload described by `header`
    ///
    /// Checks, in order: the tag is a known kind, `header.size` bytes are
    /// available, the checksum matches, and the fields fill the payload
    /// exactly. `offset` is the file position of the header.
    pub fn decode_payload(header: &EntryHeader, buf: &mut impl Buf, offset: u64) -> Result<Self> {
        let entry_type = header.entry_type().ok_or(WalError::InvalidTag {
            offset,
            tag: header.tag,
        })?;

        let size = header.size as usize;
        if buf.remaining() < size {
            return Err(WalError::TruncatedPayload {
                offset,
                expected: size,
                available: buf.remaining(),
            });
        }

        let payload = buf.copy_to_bytes(size);
        let actual = compute_checksum(header.tag, header.size, &payload);
        if actual != header.checksum {
            return Err(WalError::ChecksumMismatch {
                offset,
                expected: header.checksum,
                actual,
            });
        }

        let mut fields = PayloadReader { buf: payload, offset };
        let entry = match entry_type {
            EntryType::CreateSchema => Entry::CreateSchema {
                schema: fields.read_string()?,
            },
            EntryType::DropSchema => Entry::DropSchema {
                schema: fields.read_string()?,
            },
            EntryType::CreateTable => {
                let schema = fields.read_string()?;
                let name = fields.read_string()?;
                let columns = fields.read_columns()?;
                Entry::CreateTable(TableMetadata { schema, name, columns })
            }
            EntryType::DropTable => Entry::DropTable {
                schema: fields.read_string()?,
                table: fields.read_string()?,
            },
            EntryType::InsertTuple => Entry::InsertTuple {
                schema: fields.read_string()?,
                table: fields.read_string()?,
                batch: fields.read_blob()?,
            },
            EntryType::Query => Entry::Query {
                sql: fields.read_string()?,
            },
            EntryType::Flush => Entry::Flush,
        };

        fields.finish()?;
        Ok(entry)
    }

    /// Decode one full entry (header + payload) from the front of `buf`
    pub fn decode(buf: &mut impl Buf, offset: u64) -> Result<Self> {
        let header = EntryHeader::decode(buf, offset)?;
        Self::decode_payload(&header, buf, offset)
    }
}

// =============================================================================
// Payload Field Reader
// =============================================================================

/// Bounds-checked cursor over a payload that already passed its checksum
struct PayloadReader {
    buf: Bytes,
    offset: u64,
}

impl PayloadReader {
    fn malformed(&self, reason: impl Into<String>) -> WalError {
        WalError::MalformedPayload {
            offset: self.offset,
            reason: reason.into(),
        }
    }

    fn read_u8(&mut self) -> Result<u8> {
        if !self.buf.has_remaining() {
            return Err(self.malformed("payload ends inside a fixed-width field"));
        }
        Ok(self.buf.get_u8())
    }

    fn read_u32(&mut self) -> Result<u32> {
        if self.buf.remaining() < 4 {
            return Err(self.malformed("payload ends inside a length prefix"));
        }
        Ok(self.buf.get_u32_le())
    }

    fn read_blob(&mut self) -> Result<Bytes> {
        let len = self.read_u32()? as usize;
        if self.buf.remaining() < len {
            return Err(self.malformed(format!(
                "field of {} bytes overruns payload ({} left)",
                len,
                self.buf.remaining()
            )));
        }
        Ok(self.buf.split_to(len))
    }

    fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_blob()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| self.malformed("string is not valid UTF-8"))
    }

    fn read_columns(&mut self) -> Result<Vec<ColumnDefinition>> {
        let count = self.read_u32()? as usize;
        // Each column needs at least a length prefix plus two bytes.
        if count > self.buf.remaining() / (LEN_PREFIX_SIZE + 2) {
            return Err(self.malformed(format!("column count {} overruns payload", count)));
        }

        let mut columns = Vec::with_capacity(count);
        for _ in 0..count {
            let name = self.read_string()?;
            let code = self.read_u8()?;
            let logical_type = LogicalType::from_code(code)
                .ok_or_else(|| self.malformed(format!("unknown column type code {}", code)))?;
            let nullable = match self.read_u8()? {
                0 => false,
                1 => true,
                other => return Err(self.malformed(format!("invalid nullable flag {}", other))),
            };
            columns.push(ColumnDefinition {
                name,
                logical_type,
                nullable,
            });
        }
        Ok(columns)
    }

    fn finish(&self) -> Result<()> {
        if self.buf.has_remaining() {
            return Err(self.malformed(format!("{} trailing bytes", self.buf.remaining())));
        }
        Ok(())
    }
}
