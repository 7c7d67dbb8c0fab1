//! Record grammar — every unit of the recording after the header.
//!
//! # On-disk layout (all fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   magic            = "RC\0\0"
//!    4      4   record_type      (LE u32, see RecordType)
//!    8      4   node_id          0xFFFF_FFFF = no node  (LE u32)
//!   12    4|8   size             total record bytes incl. header, excl. payload
//!  16|20  4|8   undo_record_pos  offset of the record this one supersedes, 0 = none
//! ```
//!
//! The `size`/`undo_record_pos` width is 4 bytes in recordings older than
//! version 1.0.1.0 and 8 bytes from then on; [`Layout`] carries that branch.
//! Typed bodies follow the header; strings are a LE u32 length followed by
//! UTF-8 bytes with no terminator.  `GeneralProperty` and `NewData` carry an
//! additional payload after the body whose length is declared in the body.
//!
//! # Allocation
//! The codec never allocates.  Headers parse into a small `Copy` struct and
//! every body decode is a view borrowing the caller's record buffer.
//! Decode-time violations (bad magic, unknown type, truncated body, size
//! smaller than the header) surface as `CorruptFile`.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

pub const RECORD_MAGIC: &[u8; 4] = b"RC\x00\x00";

/// Largest uncompressed frame: 1600x1200 at 24 bits per pixel.
pub const DATA_MAX_SIZE: usize = 1600 * 1200 * 3;
/// `NewData` header upper bound: 64-bit record header + body fields.
pub const NEW_DATA_HEADER_MAX_SIZE: usize = Layout::WIDE.header_size() + NEW_DATA_BODY_SIZE;
/// Size of the player's reusable record buffer.
pub const RECORD_MAX_SIZE: usize = NEW_DATA_HEADER_MAX_SIZE + DATA_MAX_SIZE;

/// `node_id` sentinel: this record does not belong to a node.
pub const NO_NODE_ID: u32 = 0xFFFF_FFFF;

/// `NewData` body: frame_number u32 + timestamp u64 + payload_size u32.
pub const NEW_DATA_BODY_SIZE: usize = 16;

// ── Record type ──────────────────────────────────────────────────────────────

/// Discriminates the role of a record within the recording.  Values are
/// frozen on disk; unknown values are rejected as corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RecordType {
    /// Legacy node registration without seek data (pre-1.0.0.5).
    NodeAdded1_0_0_4 = 1,
    IntProperty = 2,
    RealProperty = 3,
    StringProperty = 4,
    /// Carries its value as an opaque payload after the body.
    GeneralProperty = 5,
    NodeRemoved = 6,
    /// Configuration is complete, frame data follows.
    NodeDataBegin = 7,
    NodeStateReady = 8,
    /// One frame; payload is the (possibly compressed) frame bytes.
    NewData = 9,
    /// Per-frame seek index; payload is the entry array.
    SeekTable = 10,
    End = 11,
    /// Node registration with frame count and timestamp range (1.0.0.5).
    NodeAdded1_0_0_5 = 12,
    /// Current node registration, adds the seek-table position.
    NodeAdded = 13,
}

impl RecordType {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(RecordType::NodeAdded1_0_0_4),
            2 => Some(RecordType::IntProperty),
            3 => Some(RecordType::RealProperty),
            4 => Some(RecordType::StringProperty),
            5 => Some(RecordType::GeneralProperty),
            6 => Some(RecordType::NodeRemoved),
            7 => Some(RecordType::NodeDataBegin),
            8 => Some(RecordType::NodeStateReady),
            9 => Some(RecordType::NewData),
            10 => Some(RecordType::SeekTable),
            11 => Some(RecordType::End),
            12 => Some(RecordType::NodeAdded1_0_0_5),
            13 => Some(RecordType::NodeAdded),
            _ => None,
        }
    }

    /// Any of the three node-registration variants.
    pub fn is_node_added(self) -> bool {
        matches!(
            self,
            RecordType::NodeAdded | RecordType::NodeAdded1_0_0_5 | RecordType::NodeAdded1_0_0_4
        )
    }
}

// ── Layout ───────────────────────────────────────────────────────────────────

/// The on-disk width branch for `size` and position fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub is_32bit: bool,
}

impl Layout {
    pub const NARROW: Layout = Layout { is_32bit: true };
    pub const WIDE: Layout = Layout { is_32bit: false };

    pub fn new(is_32bit: bool) -> Self {
        Self { is_32bit }
    }

    /// Record header size: 20 bytes narrow, 28 wide.
    #[inline]
    pub const fn header_size(self) -> usize {
        if self.is_32bit {
            12 + 4 + 4
        } else {
            12 + 8 + 8
        }
    }

    /// `NewData` header-plus-body size for this layout.
    #[inline]
    pub const fn new_data_header_size(self) -> usize {
        self.header_size() + NEW_DATA_BODY_SIZE
    }

    /// Width of a position field (seek-table position, undo position).
    #[inline]
    pub const fn pos_size(self) -> usize {
        if self.is_32bit {
            4
        } else {
            8
        }
    }

    /// Seek-index entry size: narrow entries pack `seek_pos` as u32.
    #[inline]
    pub const fn index_entry_size(self) -> usize {
        if self.is_32bit {
            4 + 8 + 4
        } else {
            8 + 8 + 4
        }
    }
}

// ── Record header ────────────────────────────────────────────────────────────

/// Parsed record header.  Sizes and positions are widened to 64 bits in
/// memory regardless of the on-disk layout.
#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
    pub record_type: RecordType,
    pub node_id: u32,
    pub size: u64,
    pub undo_record_pos: u64,
}

impl RecordHeader {
    /// Parse and validate a record header from the first
    /// `layout.header_size()` bytes of `buf`.
    ///
    /// Returns `CorruptFile` on bad magic, unknown type, or a declared size
    /// smaller than the header itself.
    pub fn parse(buf: &[u8], layout: Layout) -> Result<Self> {
        let header_size = layout.header_size();
        if buf.len() < header_size {
            return Err(Error::corrupt("record header truncated"));
        }

        if &buf[0..4] != RECORD_MAGIC {
            return Err(Error::corrupt("invalid record magic"));
        }

        let raw_type = LittleEndian::read_u32(&buf[4..8]);
        let record_type = RecordType::from_u32(raw_type)
            .ok_or_else(|| Error::corrupt(format!("unrecognized record type {raw_type}")))?;
        let node_id = LittleEndian::read_u32(&buf[8..12]);

        let (size, undo_record_pos) = if layout.is_32bit {
            (
                u64::from(LittleEndian::read_u32(&buf[12..16])),
                u64::from(LittleEndian::read_u32(&buf[16..20])),
            )
        } else {
            (LittleEndian::read_u64(&buf[12..20]), LittleEndian::read_u64(&buf[20..28]))
        };

        if size < header_size as u64 {
            return Err(Error::corrupt(format!(
                "record size {size} is smaller than the {header_size}-byte header"
            )));
        }

        Ok(Self { record_type, node_id, size, undo_record_pos })
    }

    /// Bytes of body following the header (payload excluded).
    #[inline]
    pub fn body_size(&self, layout: Layout) -> usize {
        (self.size as usize).saturating_sub(layout.header_size())
    }
}

// ── Body reader ──────────────────────────────────────────────────────────────

/// Sequential field reader over a record body.  All reads are bounds-checked
/// views; a read past the body is `CorruptFile`.
pub struct BodyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    pub fn new(body: &'a [u8]) -> Self {
        Self { buf: body, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(Error::corrupt("record body truncated"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    /// Position field: u32 narrow, u64 wide, widened in memory.
    pub fn read_pos(&mut self, layout: Layout) -> Result<u64> {
        if layout.is_32bit {
            Ok(u64::from(self.read_u32()?))
        } else {
            self.read_u64()
        }
    }

    /// LE u32 length followed by UTF-8 bytes, no terminator.
    pub fn read_str(&mut self) -> Result<&'a str> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|_| Error::corrupt("string field is not UTF-8"))
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

// ── Typed bodies ─────────────────────────────────────────────────────────────

/// Decoded body of any `NodeAdded*` variant.  Fields absent from legacy
/// variants are zero.
#[derive(Debug, Clone, Copy)]
pub struct NodeAddedBody<'a> {
    pub name: &'a str,
    pub node_type: u32,
    pub codec_id: u32,
    pub frames: u32,
    pub min_timestamp: u64,
    pub max_timestamp: u64,
    pub seek_table_pos: u64,
}

impl<'a> NodeAddedBody<'a> {
    pub fn decode(variant: RecordType, body: &'a [u8], layout: Layout) -> Result<Self> {
        let mut r = BodyReader::new(body);
        let name = r.read_str()?;
        let node_type = r.read_u32()?;
        let codec_id = r.read_u32()?;

        let mut decoded = Self {
            name,
            node_type,
            codec_id,
            frames: 0,
            min_timestamp: 0,
            max_timestamp: 0,
            seek_table_pos: 0,
        };

        match variant {
            RecordType::NodeAdded1_0_0_4 => {}
            RecordType::NodeAdded1_0_0_5 | RecordType::NodeAdded => {
                decoded.frames = r.read_u32()?;
                decoded.min_timestamp = r.read_u64()?;
                decoded.max_timestamp = r.read_u64()?;
                if variant == RecordType::NodeAdded {
                    decoded.seek_table_pos = r.read_pos(layout)?;
                }
            }
            other => {
                return Err(Error::corrupt(format!("{other:?} is not a node-added record")))
            }
        }

        Ok(decoded)
    }
}

/// `IntProperty` / `RealProperty` / `StringProperty` bodies.
pub fn decode_int_prop(body: &[u8]) -> Result<(&str, u64)> {
    let mut r = BodyReader::new(body);
    Ok((r.read_str()?, r.read_u64()?))
}

pub fn decode_real_prop(body: &[u8]) -> Result<(&str, f64)> {
    let mut r = BodyReader::new(body);
    Ok((r.read_str()?, r.read_f64()?))
}

pub fn decode_string_prop(body: &[u8]) -> Result<(&str, &str)> {
    let mut r = BodyReader::new(body);
    Ok((r.read_str()?, r.read_str()?))
}

/// `GeneralProperty` body: name + payload length.  The opaque value follows
/// as the record payload.
pub fn decode_general_prop(body: &[u8]) -> Result<(&str, u32)> {
    let mut r = BodyReader::new(body);
    Ok((r.read_str()?, r.read_u32()?))
}

/// `NodeDataBegin` body.  Modern recordings still carry these fields; legacy
/// ones rely on them for frame-count recovery.
#[derive(Debug, Clone, Copy)]
pub struct DataBeginBody {
    pub frames: u32,
    pub max_timestamp: u64,
}

pub fn decode_data_begin(body: &[u8]) -> Result<DataBeginBody> {
    let mut r = BodyReader::new(body);
    Ok(DataBeginBody { frames: r.read_u32()?, max_timestamp: r.read_u64()? })
}

/// `NewData` body.  The frame bytes follow as the record payload.
#[derive(Debug, Clone, Copy)]
pub struct NewDataBody {
    pub frame_number: u32,
    pub timestamp: u64,
    pub payload_size: u32,
}

pub fn decode_new_data(body: &[u8]) -> Result<NewDataBody> {
    let mut r = BodyReader::new(body);
    Ok(NewDataBody {
        frame_number: r.read_u32()?,
        timestamp: r.read_u64()?,
        payload_size: r.read_u32()?,
    })
}

/// `SeekTable` body: entry count.  The entry array follows as the payload.
pub fn decode_seek_table(body: &[u8]) -> Result<u32> {
    let mut r = BodyReader::new(body);
    r.read_u32()
}

// ── Seek index entries ───────────────────────────────────────────────────────

/// One per-frame seek index entry.  The narrow layout packs `seek_pos` as
/// u32 on disk; it is widened here on ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekIndexEntry {
    pub seek_pos: u64,
    pub timestamp: u64,
    pub configuration_id: u32,
}

impl SeekIndexEntry {
    /// Parse one entry from `buf` at the layout's entry size.
    pub fn parse(buf: &[u8], layout: Layout) -> Result<Self> {
        if buf.len() < layout.index_entry_size() {
            return Err(Error::corrupt("seek-table entry truncated"));
        }
        Ok(if layout.is_32bit {
            Self {
                seek_pos: u64::from(LittleEndian::read_u32(&buf[0..4])),
                timestamp: LittleEndian::read_u64(&buf[4..12]),
                configuration_id: LittleEndian::read_u32(&buf[12..16]),
            }
        } else {
            Self {
                seek_pos: LittleEndian::read_u64(&buf[0..8]),
                timestamp: LittleEndian::read_u64(&buf[8..16]),
                configuration_id: LittleEndian::read_u32(&buf[16..20]),
            }
        })
    }
}

/// Parse a full seek-table payload into owned entries.
///
/// The payload must hold exactly `frames + 1` entries (entry 0 is a
/// sentinel); anything else is corruption.
pub fn parse_seek_index(payload: &[u8], frames: u32, layout: Layout) -> Result<Vec<SeekIndexEntry>> {
    let entry_size = layout.index_entry_size();
    let expected = (frames as usize + 1) * entry_size;
    if payload.len() != expected {
        return Err(Error::corrupt(format!(
            "seek table has {} entries, but the node has {frames} frames",
            payload.len() / entry_size
        )));
    }

    let mut entries = Vec::with_capacity(frames as usize + 1);
    for chunk in payload.chunks_exact(entry_size) {
        entries.push(SeekIndexEntry::parse(chunk, layout)?);
    }
    Ok(entries)
}
