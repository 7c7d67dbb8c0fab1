//! Test fixtures: an in-memory recording builder that produces byte-accurate
//! `.nir` files (recorder-correct undo back-pointers and seek tables), and a
//! notification sink that collects every event for assertions.

// Each test binary uses a different slice of these fixtures.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;

use nirplay::{
    BuiltinCodecFactory, CodecId, Error, Layout, NodeNotifications, NodeType, Player, RecordType,
    SeekIndexEntry, Version, RECORD_MAGIC,
};

// ── Event log sink ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Added { name: String, node_type: u32, codec: u32, frames: u32 },
    Removed { name: String },
    StateReady { name: String },
    IntProp { name: String, prop: String, value: u64 },
    RealProp { name: String, prop: String, value: f64 },
    StringProp { name: String, prop: String, value: String },
    GeneralProp { name: String, prop: String, data: Vec<u8> },
    NewData { name: String, timestamp: u64, frame: u32, data: Vec<u8> },
}

#[derive(Default)]
pub struct EventLog {
    pub events: Vec<Event>,
}

impl EventLog {
    /// Only the frame-data events, in order.
    pub fn frames(&self) -> Vec<&Event> {
        self.events.iter().filter(|e| matches!(e, Event::NewData { .. })).collect()
    }
}

impl NodeNotifications for EventLog {
    fn on_node_added(
        &mut self,
        name: &str,
        node_type: NodeType,
        codec: CodecId,
        frames: u32,
    ) -> nirplay::Result<()> {
        self.events.push(Event::Added {
            name: name.to_owned(),
            node_type: node_type.as_u32(),
            codec: codec.0,
            frames,
        });
        Ok(())
    }

    fn on_node_removed(&mut self, name: &str) -> nirplay::Result<()> {
        self.events.push(Event::Removed { name: name.to_owned() });
        Ok(())
    }

    fn on_node_state_ready(&mut self, name: &str) -> nirplay::Result<()> {
        self.events.push(Event::StateReady { name: name.to_owned() });
        Ok(())
    }

    fn on_node_int_prop_changed(&mut self, name: &str, prop: &str, value: u64) -> nirplay::Result<()> {
        self.events.push(Event::IntProp {
            name: name.to_owned(),
            prop: prop.to_owned(),
            value,
        });
        Ok(())
    }

    fn on_node_real_prop_changed(&mut self, name: &str, prop: &str, value: f64) -> nirplay::Result<()> {
        self.events.push(Event::RealProp {
            name: name.to_owned(),
            prop: prop.to_owned(),
            value,
        });
        Ok(())
    }

    fn on_node_string_prop_changed(
        &mut self,
        name: &str,
        prop: &str,
        value: &str,
    ) -> nirplay::Result<()> {
        self.events.push(Event::StringProp {
            name: name.to_owned(),
            prop: prop.to_owned(),
            value: value.to_owned(),
        });
        Ok(())
    }

    fn on_node_general_prop_changed(
        &mut self,
        name: &str,
        prop: &str,
        data: &[u8],
    ) -> nirplay::Result<()> {
        self.events.push(Event::GeneralProp {
            name: name.to_owned(),
            prop: prop.to_owned(),
            data: data.to_vec(),
        });
        Ok(())
    }

    fn on_node_new_data(
        &mut self,
        name: &str,
        timestamp: u64,
        frame_number: u32,
        data: &[u8],
    ) -> nirplay::Result<()> {
        self.events.push(Event::NewData {
            name: name.to_owned(),
            timestamp,
            frame: frame_number,
            data: data.to_vec(),
        });
        Ok(())
    }
}

pub type TestPlayer = Player<Cursor<Vec<u8>>, EventLog>;

pub fn open_player(bytes: Vec<u8>) -> Result<TestPlayer, Error> {
    Player::open(Cursor::new(bytes), EventLog::default(), Box::new(BuiltinCodecFactory))
}

// ── Recording builder ────────────────────────────────────────────────────────

struct TableState {
    entries: Vec<SeekIndexEntry>,
    patch_offset: Option<usize>,
    frames: u32,
}

pub struct RecordingBuilder {
    buf: Vec<u8>,
    layout: Layout,
    config_id: u32,
    prop_undo: HashMap<(u32, String), u64>,
    data_undo: HashMap<u32, u64>,
    tables: HashMap<u32, TableState>,
}

pub const FOURCC_NONE: u32 = u32::from_le_bytes(*b"NONE");
pub const FOURCC_ZSTD: u32 = u32::from_le_bytes(*b"ZSTD");

pub const TYPE_DEPTH: u32 = 2;
pub const TYPE_IMAGE: u32 = 3;

impl RecordingBuilder {
    pub fn new(version: Version, global_max_timestamp: u64, max_node_id: u32) -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"NIR\x01");
        for part in [version.major, version.minor, version.maintenance, version.build] {
            buf.extend_from_slice(&part.to_le_bytes());
        }
        buf.extend_from_slice(&global_max_timestamp.to_le_bytes());
        buf.extend_from_slice(&max_node_id.to_le_bytes());
        assert_eq!(buf.len(), nirplay::HEADER_SIZE);

        let layout = Layout::new(version < nirplay::header::FIRST_FILESIZE64BIT_VERSION);
        Self {
            buf,
            layout,
            config_id: 1,
            prop_undo: HashMap::new(),
            data_undo: HashMap::new(),
            tables: HashMap::new(),
        }
    }

    pub fn set_configuration_id(&mut self, config_id: u32) {
        self.config_id = config_id;
    }

    pub fn position(&self) -> u64 {
        self.buf.len() as u64
    }

    fn push_pos_field(buf: &mut Vec<u8>, layout: Layout, value: u64) {
        if layout.is_32bit {
            buf.extend_from_slice(&(value as u32).to_le_bytes());
        } else {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }

    fn push_str(body: &mut Vec<u8>, s: &str) {
        body.extend_from_slice(&(s.len() as u32).to_le_bytes());
        body.extend_from_slice(s.as_bytes());
    }

    /// Append one record; returns its start offset.
    pub fn write_record(
        &mut self,
        record_type: RecordType,
        node_id: u32,
        undo_pos: u64,
        body: &[u8],
        payload: &[u8],
    ) -> u64 {
        let pos = self.buf.len() as u64;
        let size = (self.layout.header_size() + body.len()) as u64;

        self.buf.extend_from_slice(RECORD_MAGIC);
        self.buf.extend_from_slice(&(record_type as u32).to_le_bytes());
        self.buf.extend_from_slice(&node_id.to_le_bytes());
        Self::push_pos_field(&mut self.buf, self.layout, size);
        Self::push_pos_field(&mut self.buf, self.layout, undo_pos);
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(payload);
        pos
    }

    // ── Node registration ────────────────────────────────────────────────────

    /// Modern `NodeAdded`.  With `with_table`, a seek table is accumulated
    /// from the node's data records, appended at `finish()`, and the record
    /// written here is patched to point at it.
    #[allow(clippy::too_many_arguments)]
    pub fn node_added(
        &mut self,
        node_id: u32,
        name: &str,
        node_type: u32,
        codec: u32,
        frames: u32,
        min_ts: u64,
        max_ts: u64,
        with_table: bool,
    ) {
        let mut body = Vec::new();
        Self::push_str(&mut body, name);
        body.extend_from_slice(&node_type.to_le_bytes());
        body.extend_from_slice(&codec.to_le_bytes());
        body.extend_from_slice(&frames.to_le_bytes());
        body.extend_from_slice(&min_ts.to_le_bytes());
        body.extend_from_slice(&max_ts.to_le_bytes());
        let seek_field_offset = body.len();
        Self::push_pos_field(&mut body, self.layout, 0); // patched at finish()

        let pos = self.write_record(RecordType::NodeAdded, node_id, 0, &body, &[]);

        if with_table {
            self.tables.insert(
                node_id,
                TableState {
                    entries: vec![SeekIndexEntry::default()],
                    patch_offset: Some(
                        pos as usize + self.layout.header_size() + seek_field_offset,
                    ),
                    frames,
                },
            );
        }
    }

    pub fn node_added_1_0_0_5(
        &mut self,
        node_id: u32,
        name: &str,
        node_type: u32,
        codec: u32,
        frames: u32,
        min_ts: u64,
        max_ts: u64,
    ) {
        let mut body = Vec::new();
        Self::push_str(&mut body, name);
        body.extend_from_slice(&node_type.to_le_bytes());
        body.extend_from_slice(&codec.to_le_bytes());
        body.extend_from_slice(&frames.to_le_bytes());
        body.extend_from_slice(&min_ts.to_le_bytes());
        body.extend_from_slice(&max_ts.to_le_bytes());
        self.write_record(RecordType::NodeAdded1_0_0_5, node_id, 0, &body, &[]);
    }

    pub fn node_added_1_0_0_4(&mut self, node_id: u32, name: &str, node_type: u32, codec: u32) {
        let mut body = Vec::new();
        Self::push_str(&mut body, name);
        body.extend_from_slice(&node_type.to_le_bytes());
        body.extend_from_slice(&codec.to_le_bytes());
        self.write_record(RecordType::NodeAdded1_0_0_4, node_id, 0, &body, &[]);
    }

    pub fn node_removed(&mut self, node_id: u32) {
        self.write_record(RecordType::NodeRemoved, node_id, 0, &[], &[]);
    }

    pub fn state_ready(&mut self, node_id: u32) {
        self.write_record(RecordType::NodeStateReady, node_id, 0, &[], &[]);
    }

    pub fn data_begin(&mut self, node_id: u32, frames: u32, max_ts: u64) {
        let mut body = Vec::new();
        body.extend_from_slice(&frames.to_le_bytes());
        body.extend_from_slice(&max_ts.to_le_bytes());
        self.write_record(RecordType::NodeDataBegin, node_id, 0, &body, &[]);
    }

    // ── Properties ───────────────────────────────────────────────────────────

    fn take_prop_undo(&mut self, node_id: u32, prop: &str) -> u64 {
        self.prop_undo.get(&(node_id, prop.to_owned())).copied().unwrap_or(0)
    }

    fn put_prop_undo(&mut self, node_id: u32, prop: &str, pos: u64) {
        self.prop_undo.insert((node_id, prop.to_owned()), pos);
    }

    pub fn int_prop(&mut self, node_id: u32, prop: &str, value: u64) -> u64 {
        let undo = self.take_prop_undo(node_id, prop);
        let mut body = Vec::new();
        Self::push_str(&mut body, prop);
        body.extend_from_slice(&value.to_le_bytes());
        let pos = self.write_record(RecordType::IntProperty, node_id, undo, &body, &[]);
        self.put_prop_undo(node_id, prop, pos);
        pos
    }

    pub fn real_prop(&mut self, node_id: u32, prop: &str, value: f64) -> u64 {
        let undo = self.take_prop_undo(node_id, prop);
        let mut body = Vec::new();
        Self::push_str(&mut body, prop);
        body.extend_from_slice(&value.to_le_bytes());
        let pos = self.write_record(RecordType::RealProperty, node_id, undo, &body, &[]);
        self.put_prop_undo(node_id, prop, pos);
        pos
    }

    pub fn string_prop(&mut self, node_id: u32, prop: &str, value: &str) -> u64 {
        let undo = self.take_prop_undo(node_id, prop);
        let mut body = Vec::new();
        Self::push_str(&mut body, prop);
        Self::push_str(&mut body, value);
        let pos = self.write_record(RecordType::StringProperty, node_id, undo, &body, &[]);
        self.put_prop_undo(node_id, prop, pos);
        pos
    }

    pub fn general_prop(&mut self, node_id: u32, prop: &str, data: &[u8]) -> u64 {
        let undo = self.take_prop_undo(node_id, prop);
        let mut body = Vec::new();
        Self::push_str(&mut body, prop);
        body.extend_from_slice(&(data.len() as u32).to_le_bytes());
        let pos = self.write_record(RecordType::GeneralProperty, node_id, undo, &body, data);
        self.put_prop_undo(node_id, prop, pos);
        pos
    }

    // ── Frame data ───────────────────────────────────────────────────────────

    pub fn new_data(&mut self, node_id: u32, frame: u32, timestamp: u64, payload: &[u8]) -> u64 {
        let undo = self.data_undo.get(&node_id).copied().unwrap_or(0);
        let pos = self.new_data_with_undo(node_id, frame, timestamp, payload, undo);
        self.data_undo.insert(node_id, pos);

        if let Some(table) = self.tables.get_mut(&node_id) {
            table.entries.push(SeekIndexEntry {
                seek_pos: pos,
                timestamp,
                configuration_id: self.config_id,
            });
        }
        pos
    }

    /// Low-level variant with an explicit undo pointer, for corruption
    /// fixtures.  Does not touch the undo or seek-table bookkeeping.
    pub fn new_data_with_undo(
        &mut self,
        node_id: u32,
        frame: u32,
        timestamp: u64,
        payload: &[u8],
        undo_pos: u64,
    ) -> u64 {
        let mut body = Vec::new();
        body.extend_from_slice(&frame.to_le_bytes());
        body.extend_from_slice(&timestamp.to_le_bytes());
        body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.write_record(RecordType::NewData, node_id, undo_pos, &body, payload)
    }

    pub fn end(&mut self) {
        self.write_record(RecordType::End, nirplay::record::NO_NODE_ID, 0, &[], &[]);
    }

    /// Append the accumulated seek tables, patch the node-added records that
    /// reference them, and return the finished recording.
    pub fn finish(mut self) -> Vec<u8> {
        let mut node_ids: Vec<u32> = self.tables.keys().copied().collect();
        node_ids.sort_unstable();

        for node_id in node_ids {
            let table = self.tables.remove(&node_id).unwrap();
            assert_eq!(
                table.entries.len(),
                table.frames as usize + 1,
                "fixture bug: node {node_id} table entries do not match its frames"
            );

            let mut payload = Vec::new();
            for entry in &table.entries {
                if self.layout.is_32bit {
                    payload.extend_from_slice(&(entry.seek_pos as u32).to_le_bytes());
                } else {
                    payload.extend_from_slice(&entry.seek_pos.to_le_bytes());
                }
                payload.extend_from_slice(&entry.timestamp.to_le_bytes());
                payload.extend_from_slice(&entry.configuration_id.to_le_bytes());
            }

            let body = (table.entries.len() as u32).to_le_bytes().to_vec();
            let table_pos = self.write_record(RecordType::SeekTable, node_id, 0, &body, &payload);

            if let Some(offset) = table.patch_offset {
                if self.layout.is_32bit {
                    self.buf[offset..offset + 4]
                        .copy_from_slice(&(table_pos as u32).to_le_bytes());
                } else {
                    self.buf[offset..offset + 8].copy_from_slice(&table_pos.to_le_bytes());
                }
            }
        }

        self.buf
    }
}

// ── Standard fixtures ────────────────────────────────────────────────────────

pub const DEPTH: u32 = 0;
pub const IMAGE: u32 = 1;

/// The canonical two-generator recording: depth (id 0) and image (id 1),
/// five frames each at timestamps {100..500} and {110..510}, uncompressed,
/// single configuration.  Seek tables are optional so the same content can
/// exercise both seek paths.
pub fn two_node_recording(with_tables: bool) -> Vec<u8> {
    let mut b = RecordingBuilder::new(nirplay::CURRENT_VERSION, 510, 1);

    b.node_added(DEPTH, "depth", TYPE_DEPTH, FOURCC_NONE, 5, 100, 500, with_tables);
    b.int_prop(DEPTH, "xnGain", 50);
    b.state_ready(DEPTH);

    b.node_added(IMAGE, "image", TYPE_IMAGE, FOURCC_NONE, 5, 110, 510, with_tables);
    b.state_ready(IMAGE);

    // Each stream marks its data begin right before its first frame, so the
    // open sequence stops just short of depth's first data record.
    b.data_begin(DEPTH, 5, 500);
    b.new_data(DEPTH, 1, 100, &depth_frame(1));
    b.data_begin(IMAGE, 5, 510);
    b.new_data(IMAGE, 1, 110, &image_frame(1));
    for i in 1u32..5 {
        let frame = i + 1;
        b.new_data(DEPTH, frame, u64::from(frame) * 100, &depth_frame(frame));
        b.new_data(IMAGE, frame, u64::from(frame) * 100 + 10, &image_frame(frame));
    }

    b.end();
    b.finish()
}

pub fn depth_frame(frame: u32) -> Vec<u8> {
    vec![0xD0 + frame as u8; 16]
}

pub fn image_frame(frame: u32) -> Vec<u8> {
    vec![0x10 + frame as u8; 24]
}
