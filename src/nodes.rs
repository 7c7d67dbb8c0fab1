//! Per-node replay state — one row per node id in the recording.
//!
//! Rows are created by the node-added handlers, mutated by every record that
//! names the node, and cleared by node removal or rewind.  A row owns its
//! decompressor (created through the codec factory once the node's state is
//! ready) and, when the recording carries one, its per-frame seek index.
//!
//! Invariants the player relies on:
//! - `name` is unique among valid rows; lookups scan the table.
//! - `valid` ⇔ the node currently exists in the replayed scene.
//! - `cur_frame ∈ [0, frames]`; 0 means no data emitted yet.
//! - `last_data_pos` is the offset of the most recent data record, 0 = none.
//! - `new_data_undo` and `prop_undo[name]` chain backwards through the file
//!   via undo positions recorded by the writer.

use std::collections::HashMap;

use tracing::warn;

use crate::codec::{Codec, CodecId, CODEC_NULL};
use crate::error::{Error, Result};
use crate::notify::NodeNotifications;
use crate::record::SeekIndexEntry;

// ── Node type ────────────────────────────────────────────────────────────────

/// Production node type.  Generators produce frames over time; everything
/// else is configuration only.  Unknown wire values are carried opaquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Device,
    Depth,
    Image,
    Audio,
    Ir,
    Other(u32),
}

impl NodeType {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => NodeType::Device,
            2 => NodeType::Depth,
            3 => NodeType::Image,
            4 => NodeType::Audio,
            5 => NodeType::Ir,
            other => NodeType::Other(other),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            NodeType::Device => 1,
            NodeType::Depth => 2,
            NodeType::Image => 3,
            NodeType::Audio => 4,
            NodeType::Ir => 5,
            NodeType::Other(v) => v,
        }
    }

    /// Depth, image, and IR streams produce frames.
    pub fn is_generator(self) -> bool {
        matches!(self, NodeType::Depth | NodeType::Image | NodeType::Ir)
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeType::Device => "device",
            NodeType::Depth => "depth",
            NodeType::Image => "image",
            NodeType::Audio => "audio",
            NodeType::Ir => "ir",
            NodeType::Other(_) => "other",
        }
    }
}

impl Default for NodeType {
    fn default() -> Self {
        NodeType::Other(0)
    }
}

// ── Undo bookkeeping ─────────────────────────────────────────────────────────

/// One link of an undo chain: where the current record for a key sits, and
/// where the record it superseded sits (0 = none).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UndoInfo {
    pub record_pos: u64,
    pub undo_record_pos: u64,
}

impl UndoInfo {
    pub fn new(record_pos: u64, undo_record_pos: u64) -> Self {
        Self { record_pos, undo_record_pos }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_set(&self) -> bool {
        self.record_pos != 0
    }
}

// ── Node row ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct NodeInfo {
    pub name: String,
    pub valid: bool,
    pub node_type: NodeType,
    pub is_generator: bool,
    pub state_ready: bool,
    pub compression: CodecId,
    pub frames: u32,
    pub cur_frame: u32,
    pub max_timestamp: u64,
    pub last_data_pos: u64,
    pub new_data_undo: UndoInfo,
    pub prop_undo: HashMap<String, UndoInfo>,
    pub codec: Option<Box<dyn Codec>>,
    pub data_index: Option<Vec<SeekIndexEntry>>,
}

impl NodeInfo {
    /// Clear the row back to its never-added state.  Drops the codec and the
    /// seek index.
    pub fn reset(&mut self) {
        self.name.clear();
        self.valid = false;
        self.node_type = NodeType::default();
        self.is_generator = false;
        self.state_ready = false;
        self.compression = CODEC_NULL;
        self.frames = 0;
        self.cur_frame = 0;
        self.max_timestamp = 0;
        self.last_data_pos = 0;
        self.new_data_undo.reset();
        self.prop_undo.clear();
        self.codec = None;
        self.data_index = None;
    }

    /// Record the undo link for a property, replacing any earlier link for
    /// the same name.
    pub fn save_prop_undo(&mut self, prop_name: &str, info: UndoInfo) {
        self.prop_undo.insert(prop_name.to_owned(), info);
    }
}

// ── Node table ───────────────────────────────────────────────────────────────

/// Fixed-size table of node rows, indexed by node id.
pub struct NodeTable {
    rows: Vec<NodeInfo>,
}

impl NodeTable {
    pub fn new(max_nodes: u32) -> Self {
        let mut rows = Vec::with_capacity(max_nodes as usize);
        rows.resize_with(max_nodes as usize, NodeInfo::default);
        Self { rows }
    }

    pub fn len(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&NodeInfo> {
        let row = self.rows.get(id as usize);
        if row.is_none() {
            warn!(id, max = self.rows.len(), "node id beyond the declared maximum");
        }
        row
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut NodeInfo> {
        let max = self.rows.len();
        let row = self.rows.get_mut(id as usize);
        if row.is_none() {
            warn!(id, max, "node id beyond the declared maximum");
        }
        row
    }

    /// Resolve a node name against valid rows.
    pub fn find_by_name(&self, name: &str) -> Option<u32> {
        self.rows.iter().position(|row| row.valid && row.name == name).map(|i| i as u32)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &NodeInfo)> {
        self.rows.iter().enumerate().map(|(i, row)| (i as u32, row))
    }

    /// Remove a node: deliver `OnNodeRemoved`, drop the codec, clear the
    /// row.  A no-op for rows that are not valid.
    pub fn remove(&mut self, id: u32, sink: &mut dyn NodeNotifications) -> Result<()> {
        let row = self
            .get_mut(id)
            .ok_or_else(|| Error::corrupt(format!("node id {id} out of range")))?;
        if row.valid {
            sink.on_node_removed(&row.name)?;
            row.codec = None;
            row.reset();
        }
        Ok(())
    }

    /// Clear every row without notifications (rewind path).
    pub fn reset_all(&mut self) {
        for row in &mut self.rows {
            row.reset();
        }
    }
}
