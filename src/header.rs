//! Recording header — format anchor at offset 0.
//!
//! # On-disk layout (32 bytes, all fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   magic                = "NIR\x01"  (4 raw bytes)
//!    4     16   version              {major, minor, maintenance, build} (4 × LE u32)
//!   20      8   global_max_timestamp highest timestamp in the recording (LE u64)
//!   28      4   max_node_id          highest node id; table size = id + 1 (LE u32)
//! ```
//!
//! # Version gating
//! The supported window is [`OLDEST_SUPPORTED_VERSION`] ..= [`CURRENT_VERSION`].
//! Anything outside it is rejected with `UnsupportedVersion` before any record
//! is read.  Versions below [`FIRST_FILESIZE64BIT_VERSION`] use the legacy
//! 32-bit record layout: the `size` and position fields of every record
//! header (and the `seek_pos` field of seek-table entries) are LE u32 on
//! disk.  The header itself is 32 bytes in both variants.

use std::fmt;

use crate::error::{Error, Result};

pub const MAGIC: &[u8; 4] = b"NIR\x01";
pub const HEADER_SIZE: usize = 32;

/// Four-part recording format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub maintenance: u32,
    pub build: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, maintenance: u32, build: u32) -> Self {
        Self { major, minor, maintenance, build }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.maintenance, self.build)
    }
}

/// Oldest recording version this build can replay.
pub const OLDEST_SUPPORTED_VERSION: Version = Version::new(1, 0, 0, 4);
/// First version with 64-bit record size and position fields.
pub const FIRST_FILESIZE64BIT_VERSION: Version = Version::new(1, 0, 1, 0);
/// Newest version this build understands.
pub const CURRENT_VERSION: Version = Version::new(1, 0, 1, 0);

#[derive(Debug, Clone, Copy)]
pub struct RecordingHeader {
    pub version: Version,
    pub global_max_timestamp: u64,
    pub max_node_id: u32,
}

impl RecordingHeader {
    /// Parse and validate the 32-byte header.
    ///
    /// Checks magic and the supported version window.  The caller MUST NOT
    /// read records if this returns an error.
    pub fn parse(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        if &buf[0..4] != MAGIC {
            return Err(Error::corrupt("invalid header magic"));
        }

        let version = Version {
            major: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            minor: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            maintenance: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            build: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
        };

        if version < OLDEST_SUPPORTED_VERSION || version > CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        Ok(Self {
            version,
            global_max_timestamp: u64::from_le_bytes(buf[20..28].try_into().unwrap()),
            max_node_id: u32::from_le_bytes(buf[28..32].try_into().unwrap()),
        })
    }

    /// Legacy variant with 32-bit record size and position fields?
    #[inline]
    pub fn is_32bit(&self) -> bool {
        self.version < FIRST_FILESIZE64BIT_VERSION
    }
}
