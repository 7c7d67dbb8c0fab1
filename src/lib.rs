//! # nirplay — replay engine for the .nir sensor recording format
//!
//! Format guarantees (frozen at 1.0.1.0):
//! - All numeric fields are little-endian; never negotiated
//! - The recording is a linear sequence of typed records: configuration
//!   changes, data frames, and control markers
//! - Every mutating record carries an undo back-pointer to the record it
//!   supersedes for its (node, property) pair or data stream; 0 = none
//! - Record size and position fields are 32-bit before version 1.0.1.0 and
//!   64-bit from then on; the header layout itself never changes
//! - Codec identity is a frozen u32 FourCC; unavailable codecs fail the
//!   node, there is no fallback and no negotiation
//! - Seek tables are optional; random access always works through the undo
//!   chains, seek tables only make it fast
//!
//! The player replays a recording to a [`NodeNotifications`] sink in record
//! order and supports random access by frame index and by timestamp while
//! keeping every generator node consistent with the target position.

pub mod codec;
pub mod error;
pub mod header;
pub mod nodes;
pub mod notify;
pub mod player;
pub mod record;
pub mod stream;

// Flat re-exports for the most common types.
pub use codec::{
    BuiltinCodecFactory, Codec, CodecFactory, CodecId, CODEC_LZ4, CODEC_NULL, CODEC_UNCOMPRESSED,
    CODEC_ZSTD,
};
pub use error::{Error, Result};
pub use header::{RecordingHeader, Version, CURRENT_VERSION, HEADER_SIZE, OLDEST_SUPPORTED_VERSION};
pub use nodes::{NodeInfo, NodeTable, NodeType, UndoInfo};
pub use notify::{EofHandle, NodeNotifications};
pub use player::{MapOutputMode, NodeSummary, Player};
pub use record::{
    Layout, RecordHeader, RecordType, SeekIndexEntry, DATA_MAX_SIZE, RECORD_MAX_SIZE, RECORD_MAGIC,
};
pub use stream::SeekOrigin;
