//! The replay engine: record dispatch, lifecycle, and the public facade.
//!
//! # Dispatch
//! [`Player::read_next`] reads one record from the current stream position,
//! routes it to a typed handler, mutates the node table, and forwards the
//! resulting notifications before returning.  The seek engine (`seek`
//! submodule) drives the same dispatcher with payload emission suppressed to
//! apply bookkeeping without re-delivering frames.
//!
//! # Buffers
//! One `RECORD_MAX_SIZE` record buffer and one `DATA_MAX_SIZE` decompression
//! scratch buffer are allocated at open and reused for every record.  Byte
//! slices handed to the notification sink borrow these buffers and are valid
//! only for the duration of the callback.
//!
//! # Backward compatibility
//! Three fix-ups are applied to old recordings as data transformations, not
//! options: `xnRealWorldTranslationData` is translated to `xnFieldOfView`
//! using the cached `xnMapOutputMode` resolution, `xnIsGenerating = 0` on a
//! node with frames is rewritten to 1, and pre-1.0.0.5 recordings recover
//! their frame counts from the matching `NodeDataBegin` record.

mod seek;

use std::io::{Read, Seek};

use byteorder::{ByteOrder, LittleEndian};

use crate::codec::{CodecFactory, CodecId, CODEC_UNCOMPRESSED};
use crate::error::{Error, Result};
use crate::header::{RecordingHeader, HEADER_SIZE};
use crate::nodes::{NodeTable, NodeType, UndoInfo};
use crate::notify::{EofHandle, EofRegistry, NodeNotifications};
use crate::record::{
    decode_data_begin, decode_general_prop, decode_int_prop, decode_new_data, decode_real_prop,
    decode_seek_table, decode_string_prop, parse_seek_index, Layout, NodeAddedBody, RecordHeader,
    RecordType, SeekIndexEntry, DATA_MAX_SIZE, RECORD_MAX_SIZE,
};
use crate::stream::StreamAdapter;

// Property names fixed by old recorders; these are wire data, not API.
const PROP_MAP_OUTPUT_MODE: &str = "xnMapOutputMode";
const PROP_REAL_WORLD_TRANSLATION_DATA: &str = "xnRealWorldTranslationData";
const PROP_FIELD_OF_VIEW: &str = "xnFieldOfView";
const PROP_IS_GENERATING: &str = "xnIsGenerating";

/// Resolution cached from the most recent `xnMapOutputMode` property,
/// consumed by the field-of-view translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapOutputMode {
    pub x_res: u32,
    pub y_res: u32,
    pub fps: u32,
}

/// Owned copy of a node-added body, detached from the record buffer so the
/// handler can keep dispatching while it drives the node to readiness.
#[derive(Debug, Clone)]
struct NodeAddedInfo {
    name: String,
    node_type: NodeType,
    codec_id: CodecId,
    frames: u32,
    max_timestamp: u64,
    seek_table_pos: u64,
}

impl NodeAddedInfo {
    fn from_body(body: &NodeAddedBody<'_>) -> Self {
        Self {
            name: body.name.to_owned(),
            node_type: NodeType::from_u32(body.node_type),
            codec_id: CodecId(body.codec_id),
            frames: body.frames,
            max_timestamp: body.max_timestamp,
            seek_table_pos: body.seek_table_pos,
        }
    }
}

// ── Player ───────────────────────────────────────────────────────────────────

impl<S, N: NodeNotifications> std::fmt::Debug for Player<S, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player").finish_non_exhaustive()
    }
}

pub struct Player<S, N: NodeNotifications> {
    stream: StreamAdapter<S>,
    notify: N,
    factory: Box<dyn CodecFactory>,

    header: RecordingHeader,
    layout: Layout,
    nodes: NodeTable,
    eof_event: EofRegistry,

    repeat: bool,
    data_begun: bool,
    eof: bool,
    timestamp: u64,
    last_output_mode: MapOutputMode,

    record_buffer: Vec<u8>,
    scratch: Vec<u8>,
    /// Fast-seek staging: one slot per node, filled by the seek engine.
    seek_targets: Vec<Option<SeekIndexEntry>>,
}

impl<S: Read + Seek, N: NodeNotifications> Player<S, N> {
    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Open a recording: validate the header, allocate the node table and
    /// buffers, then replay configuration until the first data marker so
    /// every initially present node is announced to the sink.
    pub fn open(stream: S, notifications: N, factory: Box<dyn CodecFactory>) -> Result<Self> {
        let mut stream = StreamAdapter::new(stream);

        let mut header_buf = [0u8; HEADER_SIZE];
        stream.read_exact(&mut header_buf)?;
        let header = RecordingHeader::parse(&header_buf)?;

        let max_nodes = header.max_node_id + 1;
        let mut player = Self {
            stream,
            notify: notifications,
            factory,
            layout: Layout::new(header.is_32bit()),
            nodes: NodeTable::new(max_nodes),
            eof_event: EofRegistry::default(),
            repeat: true,
            data_begun: false,
            eof: false,
            timestamp: 0,
            last_output_mode: MapOutputMode::default(),
            record_buffer: vec![0u8; RECORD_MAX_SIZE],
            scratch: vec![0u8; DATA_MAX_SIZE],
            seek_targets: vec![None; max_nodes as usize],
            header,
        };

        player.process_until_first_data()?;
        Ok(player)
    }

    /// Reposition to the first record and replay configuration again.  Every
    /// node row is cleared first; the sink sees the same announcement
    /// sequence the original open produced.
    pub fn rewind(&mut self) -> Result<()> {
        self.stream.seek_to(HEADER_SIZE as u64)?;
        self.nodes.reset_all();
        self.data_begun = false;
        self.timestamp = 0;
        self.eof = false;
        self.process_until_first_data()
    }

    /// Close the underlying stream.  Further reads fail with
    /// `InvalidOperation`.  Idempotent.
    pub fn close(&mut self) {
        self.stream.close();
    }

    fn process_until_first_data(&mut self) -> Result<()> {
        while !self.data_begun {
            self.process_record(true)?;
        }
        Ok(())
    }

    // ── Facade ───────────────────────────────────────────────────────────────

    /// Process the next record, emitting its notifications.
    pub fn read_next(&mut self) -> Result<()> {
        if !self.stream.is_open() {
            return Err(Error::InvalidOperation("player is closed"));
        }
        self.process_record(true)
    }

    /// Timestamp of the most recently delivered frame.
    pub fn tell_timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Current frame number of a node; 0 before any data.
    pub fn tell_frame(&self, node_name: &str) -> Result<u32> {
        self.valid_row(node_name).map(|row| row.cur_frame)
    }

    /// Total frames recorded for a node.
    pub fn num_frames(&self, node_name: &str) -> Result<u32> {
        self.valid_row(node_name).map(|row| row.frames)
    }

    fn valid_row(&self, node_name: &str) -> Result<&crate::nodes::NodeInfo> {
        let id = self
            .nodes
            .find_by_name(node_name)
            .ok_or_else(|| Error::BadNodeName(node_name.to_owned()))?;
        self.nodes.get(id).filter(|row| row.valid).ok_or_else(|| {
            Error::BadNodeName(node_name.to_owned())
        })
    }

    /// Loop back to the start instead of stopping at the next `End` record.
    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn version(&self) -> crate::header::Version {
        self.header.version
    }

    pub fn global_max_timestamp(&self) -> u64 {
        self.header.global_max_timestamp
    }

    /// Absolute stream position (diagnostics).
    pub fn stream_position(&mut self) -> Result<u64> {
        self.stream.tell()
    }

    pub fn register_eof(&mut self, callback: Box<dyn FnMut()>) -> EofHandle {
        self.eof_event.register(callback)
    }

    pub fn unregister_eof(&mut self, handle: EofHandle) {
        self.eof_event.unregister(handle);
    }

    /// The notification sink, for consumers that own state inside it.
    pub fn notifications(&self) -> &N {
        &self.notify
    }

    pub fn notifications_mut(&mut self) -> &mut N {
        &mut self.notify
    }

    /// Per-node summaries for inspection tooling.
    pub fn node_summaries(&self) -> Vec<NodeSummary> {
        self.nodes
            .iter()
            .filter(|(_, row)| row.valid)
            .map(|(id, row)| NodeSummary {
                id,
                name: row.name.clone(),
                node_type: row.node_type,
                codec: row.compression,
                is_generator: row.is_generator,
                frames: row.frames,
                cur_frame: row.cur_frame,
                has_seek_table: row.data_index.is_some(),
            })
            .collect()
    }

    // ── Record input ─────────────────────────────────────────────────────────

    fn read_record_header(&mut self) -> Result<RecordHeader> {
        let header_size = self.layout.header_size();
        let mut buf = [0u8; 28];
        self.stream.read_exact(&mut buf[..header_size])?;
        RecordHeader::parse(&buf[..header_size], self.layout)
    }

    /// Read the record body into the shared buffer.
    fn read_record_body(&mut self, header: &RecordHeader) -> Result<()> {
        let body_size = header.body_size(self.layout);
        if body_size > self.record_buffer.len() {
            return Err(Error::InternalBufferTooSmall(header.size));
        }
        let buf = &mut self.record_buffer[..body_size];
        self.stream.read_exact(buf)
    }

    fn body(&self, header: &RecordHeader) -> &[u8] {
        &self.record_buffer[..header.body_size(self.layout)]
    }

    /// Payload length following the body, derived per record type.  The
    /// body must already be in the record buffer.
    fn payload_size(&self, header: &RecordHeader) -> Result<u64> {
        Ok(match header.record_type {
            RecordType::NewData => u64::from(decode_new_data(self.body(header))?.payload_size),
            RecordType::GeneralProperty => {
                u64::from(decode_general_prop(self.body(header))?.1)
            }
            RecordType::SeekTable => {
                u64::from(decode_seek_table(self.body(header))?)
                    * self.layout.index_entry_size() as u64
            }
            _ => 0,
        })
    }

    // ── Dispatcher ───────────────────────────────────────────────────────────

    /// Read and handle one record.  `process_payload = false` applies all
    /// bookkeeping (undo links, frame counters, property state) but skips
    /// frame payload delivery; it is the seek engine's replay mode.
    pub(crate) fn process_record(&mut self, process_payload: bool) -> Result<()> {
        let header = self.read_record_header()?;
        self.read_record_body(&header)?;
        self.handle_record(header, process_payload)
    }

    fn handle_record(&mut self, header: RecordHeader, process_payload: bool) -> Result<()> {
        match header.record_type {
            RecordType::NodeAdded => self.handle_node_added(header),
            RecordType::NodeAdded1_0_0_5 => self.handle_node_added_1_0_0_5(header),
            RecordType::NodeAdded1_0_0_4 => self.handle_node_added_1_0_0_4(header),
            RecordType::IntProperty => self.handle_int_prop(header),
            RecordType::RealProperty => self.handle_real_prop(header),
            RecordType::StringProperty => self.handle_string_prop(header),
            RecordType::GeneralProperty => self.handle_general_prop(header),
            RecordType::NodeRemoved => self.handle_node_removed(header),
            RecordType::NodeStateReady => self.handle_node_state_ready(header),
            RecordType::NodeDataBegin => self.handle_node_data_begin(header),
            RecordType::NewData => self.handle_new_data(header, process_payload),
            // Seek tables are ingested out-of-band while handling the node
            // registration; inline occurrences are skipped.
            RecordType::SeekTable => self.skip_payload(&header),
            RecordType::End => self.handle_end(),
        }
    }

    fn skip_payload(&mut self, header: &RecordHeader) -> Result<()> {
        let payload = self.payload_size(header)?;
        if payload > 0 {
            self.stream.skip(payload)?;
        }
        Ok(())
    }

    // ── Node registration ────────────────────────────────────────────────────

    fn handle_node_added(&mut self, header: RecordHeader) -> Result<()> {
        let added = {
            let body = NodeAddedBody::decode(RecordType::NodeAdded, self.body(&header), self.layout)?;
            NodeAddedInfo::from_body(&body)
        };
        self.handle_node_added_impl(header.node_id, &added)?;

        // Ingest the node's seek table, if the recorder wrote one.
        if added.frames > 0 && added.seek_table_pos != 0 {
            let resume_pos = self.stream.tell()?;
            self.stream.seek_to(added.seek_table_pos)?;

            let table_header = self.read_record_header()?;
            if table_header.record_type != RecordType::SeekTable {
                return Err(Error::corrupt(format!(
                    "expected a seek table at {}, found {:?}",
                    added.seek_table_pos, table_header.record_type
                )));
            }
            self.read_record_body(&table_header)?;
            self.ingest_seek_table(&table_header)?;

            self.stream.seek_to(resume_pos)?;
        }

        Ok(())
    }

    fn handle_node_added_1_0_0_5(&mut self, header: RecordHeader) -> Result<()> {
        let added = {
            let body = NodeAddedBody::decode(
                RecordType::NodeAdded1_0_0_5,
                self.body(&header),
                self.layout,
            )?;
            NodeAddedInfo::from_body(&body)
        };
        self.handle_node_added_impl(header.node_id, &added)
    }

    /// Pre-1.0.0.5 registrations carry no frame count; recover it from the
    /// node's `NodeDataBegin` record (and the minimum timestamp from its
    /// first data record) by scanning ahead.  Absence is not an error.
    fn handle_node_added_1_0_0_4(&mut self, header: RecordHeader) -> Result<()> {
        let mut added = {
            let body = NodeAddedBody::decode(
                RecordType::NodeAdded1_0_0_4,
                self.body(&header),
                self.layout,
            )?;
            NodeAddedInfo::from_body(&body)
        };

        if added.node_type.is_generator() {
            let resume_pos = self.stream.tell()?;
            match self.seek_to_record_by_type(header.node_id, RecordType::NodeDataBegin) {
                Ok(()) => {
                    let begin_header = self.read_record_header()?;
                    self.read_record_body(&begin_header)?;
                    let begin = decode_data_begin(self.body(&begin_header))?;
                    added.frames = begin.frames;
                    added.max_timestamp = begin.max_timestamp;

                    if self.seek_to_record_by_type(header.node_id, RecordType::NewData).is_ok() {
                        let data_header = self.read_record_header()?;
                        self.read_record_body(&data_header)?;
                        // Decoded for its timestamp; registration does not
                        // retain the minimum, so validation is all we need.
                        decode_new_data(self.body(&data_header))?;
                    }

                    self.stream.seek_to(resume_pos)?;
                }
                Err(Error::NoMatch) => {}
                Err(other) => return Err(other),
            }
        }

        self.handle_node_added_impl(header.node_id, &added)
    }

    fn handle_node_added_impl(&mut self, node_id: u32, added: &NodeAddedInfo) -> Result<()> {
        if self.nodes.get(node_id).is_none() {
            return Err(Error::corrupt(format!("node id {node_id} out of range")));
        }

        self.notify.on_node_added(&added.name, added.node_type, added.codec_id, added.frames)?;

        {
            let row = self
                .nodes
                .get_mut(node_id)
                .ok_or_else(|| Error::corrupt(format!("node id {node_id} out of range")))?;
            row.name = added.name.clone();
            row.node_type = added.node_type;
            row.compression = added.codec_id;
            if added.node_type.is_generator() {
                row.is_generator = true;
                row.frames = added.frames;
                row.max_timestamp = added.max_timestamp;
            }
            row.valid = true;
        }

        // Replay until this node's configuration is complete.
        loop {
            match self.nodes.get(node_id) {
                Some(row) if row.state_ready => break,
                Some(_) => {}
                None => return Err(Error::corrupt(format!("node id {node_id} out of range"))),
            }
            if let Err(err) = self.process_record(true) {
                if let Some(row) = self.nodes.get_mut(node_id) {
                    row.valid = false;
                }
                return Err(err);
            }
        }

        Ok(())
    }

    /// Scan forward for the next record of `wanted` type for `node_id`,
    /// leaving the stream positioned at its first byte.  Restores the start
    /// position and returns `NoMatch` if `End` arrives first; restores and
    /// propagates on any read failure.
    fn seek_to_record_by_type(&mut self, node_id: u32, wanted: RecordType) -> Result<()> {
        let start_pos = self.stream.tell()?;

        let result = loop {
            let pos_before = match self.stream.tell() {
                Ok(p) => p,
                Err(err) => break Err(err),
            };

            let header = match self.read_record_header() {
                Ok(h) => h,
                Err(err) => break Err(err),
            };
            if let Err(err) = self.read_record_body(&header) {
                break Err(err);
            }

            if header.record_type == wanted && header.node_id == node_id {
                break self.stream.seek_to(pos_before).map(|_| ());
            }
            if header.record_type == RecordType::End {
                break Err(Error::NoMatch);
            }
            if let Err(err) = self.skip_payload(&header) {
                break Err(err);
            }
        };

        if result.is_err() {
            self.stream.seek_to(start_pos)?;
        }
        result
    }

    fn ingest_seek_table(&mut self, header: &RecordHeader) -> Result<()> {
        let node_id = header.node_id;
        let frames = {
            let row = self
                .nodes
                .get(node_id)
                .filter(|row| row.valid)
                .ok_or_else(|| Error::corrupt(format!("seek table for unknown node {node_id}")))?;
            row.frames
        };

        let entry_count = decode_seek_table(self.body(header))?;
        let payload_size = u64::from(entry_count) * self.layout.index_entry_size() as u64;
        if header.size + payload_size > RECORD_MAX_SIZE as u64 {
            return Err(Error::InternalBufferTooSmall(header.size + payload_size));
        }

        let payload = payload_size as usize;
        self.stream.read_exact(&mut self.record_buffer[..payload])?;
        let entries = parse_seek_index(&self.record_buffer[..payload], frames, self.layout)?;

        if let Some(row) = self.nodes.get_mut(node_id) {
            row.data_index = Some(entries);
        }
        Ok(())
    }

    // ── Node state ───────────────────────────────────────────────────────────

    fn handle_node_removed(&mut self, header: RecordHeader) -> Result<()> {
        let valid = self.nodes.get(header.node_id).map(|row| row.valid).unwrap_or(false);
        if !valid {
            return Err(Error::corrupt(format!(
                "removal record for non-existing node {}",
                header.node_id
            )));
        }
        self.nodes.remove(header.node_id, &mut self.notify)
    }

    fn handle_node_state_ready(&mut self, header: RecordHeader) -> Result<()> {
        let row = self
            .nodes
            .get_mut(header.node_id)
            .filter(|row| row.valid)
            .ok_or_else(|| {
                Error::corrupt(format!("state-ready record for non-existing node {}", header.node_id))
            })?;

        // After a repeat wrap-around the node may already be ready; the sink
        // is only told the first time.
        if !row.state_ready {
            self.notify.on_node_state_ready(&row.name)?;
        }

        if row.is_generator && !row.compression.is_null() && row.codec.is_none() {
            row.codec = Some(self.factory.create(&row.name, row.compression)?);
        }

        row.state_ready = true;
        Ok(())
    }

    fn handle_node_data_begin(&mut self, header: RecordHeader) -> Result<()> {
        decode_data_begin(self.body(&header))?;

        let row = self
            .nodes
            .get(header.node_id)
            .filter(|row| row.valid)
            .ok_or_else(|| {
                Error::corrupt(format!("data-begin record for non-existing node {}", header.node_id))
            })?;
        if !row.is_generator {
            return Err(Error::corrupt(format!("got data for non-generator node '{}'", row.name)));
        }

        self.data_begun = true;
        Ok(())
    }

    fn handle_end(&mut self) -> Result<()> {
        if !self.data_begun {
            return Err(Error::corrupt("recording does not contain any data"));
        }

        self.eof = !self.repeat;
        self.eof_event.raise();

        if self.repeat {
            self.rewind()
        } else {
            self.close();
            Ok(())
        }
    }

    // ── Properties ───────────────────────────────────────────────────────────

    fn handle_int_prop(&mut self, header: RecordHeader) -> Result<()> {
        let record_pos = self.stream.tell()? - header.size;
        // Borrow the record buffer alone so the name can stay alive across
        // the notification call.
        let body = &self.record_buffer[..header.body_size(self.layout)];
        let (prop_name, mut value) = decode_int_prop(body)?;

        let row = self
            .nodes
            .get(header.node_id)
            .filter(|row| row.valid)
            .ok_or_else(|| {
                Error::corrupt(format!("property record for non-existing node {}", header.node_id))
            })?;

        // Some old recorders marked generating nodes as stopped even though
        // they carry frames; replaying that would freeze consumers.
        if prop_name == PROP_IS_GENERATING && value == 0 && row.frames > 0 {
            value = 1;
        }

        self.notify.on_node_int_prop_changed(&row.name, prop_name, value)?;

        if let Some(row) = self.nodes.get_mut(header.node_id) {
            row.save_prop_undo(prop_name, UndoInfo::new(record_pos, header.undo_record_pos));
        }
        Ok(())
    }

    fn handle_real_prop(&mut self, header: RecordHeader) -> Result<()> {
        let record_pos = self.stream.tell()? - header.size;
        let body = &self.record_buffer[..header.body_size(self.layout)];
        let (prop_name, value) = decode_real_prop(body)?;

        let row = self
            .nodes
            .get(header.node_id)
            .filter(|row| row.valid)
            .ok_or_else(|| {
                Error::corrupt(format!("property record for non-existing node {}", header.node_id))
            })?;
        self.notify.on_node_real_prop_changed(&row.name, prop_name, value)?;

        if let Some(row) = self.nodes.get_mut(header.node_id) {
            row.save_prop_undo(prop_name, UndoInfo::new(record_pos, header.undo_record_pos));
        }
        Ok(())
    }

    fn handle_string_prop(&mut self, header: RecordHeader) -> Result<()> {
        let record_pos = self.stream.tell()? - header.size;
        let body = &self.record_buffer[..header.body_size(self.layout)];
        let (prop_name, value) = decode_string_prop(body)?;

        let row = self
            .nodes
            .get(header.node_id)
            .filter(|row| row.valid)
            .ok_or_else(|| {
                Error::corrupt(format!("property record for non-existing node {}", header.node_id))
            })?;
        self.notify.on_node_string_prop_changed(&row.name, prop_name, value)?;

        if let Some(row) = self.nodes.get_mut(header.node_id) {
            row.save_prop_undo(prop_name, UndoInfo::new(record_pos, header.undo_record_pos));
        }
        Ok(())
    }

    fn handle_general_prop(&mut self, header: RecordHeader) -> Result<()> {
        let record_pos = self.stream.tell()? - header.size;
        let body = &self.record_buffer[..header.body_size(self.layout)];
        let (prop_name, data_size) = decode_general_prop(body)?;
        let data_len = data_size as usize;

        if header.size + u64::from(data_size) > RECORD_MAX_SIZE as u64
            || data_len > self.scratch.len()
        {
            return Err(Error::InternalBufferTooSmall(header.size + u64::from(data_size)));
        }

        // The value always travels to the scratch buffer so property state
        // can be applied even while frame payloads are being suppressed.
        self.stream.read_exact(&mut self.scratch[..data_len])?;

        {
            let row = self
                .nodes
                .get(header.node_id)
                .filter(|row| row.valid)
                .ok_or_else(|| {
                    Error::corrupt(format!(
                        "property record for non-existing node {}",
                        header.node_id
                    ))
                })?;

            if prop_name == PROP_MAP_OUTPUT_MODE {
                if data_len != 12 {
                    return Err(Error::corrupt("malformed xnMapOutputMode property"));
                }
                self.last_output_mode = MapOutputMode {
                    x_res: LittleEndian::read_u32(&self.scratch[0..4]),
                    y_res: LittleEndian::read_u32(&self.scratch[4..8]),
                    fps: LittleEndian::read_u32(&self.scratch[8..12]),
                };
            }

            if prop_name == PROP_REAL_WORLD_TRANSLATION_DATA {
                // Recordings predating the field-of-view API carry the raw
                // translation triple; translate it before forwarding.
                if data_len != 24 {
                    return Err(Error::corrupt("malformed xnRealWorldTranslationData property"));
                }
                let zero_plane = LittleEndian::read_f64(&self.scratch[0..8]);
                let pixel_size = LittleEndian::read_f64(&self.scratch[8..16]);
                let ratio = LittleEndian::read_f64(&self.scratch[16..24]);

                let hfov = 2.0
                    * (pixel_size * ratio * f64::from(self.last_output_mode.x_res)
                        / 2.0
                        / zero_plane)
                        .atan();
                let vfov = 2.0
                    * (pixel_size * ratio * f64::from(self.last_output_mode.y_res)
                        / 2.0
                        / zero_plane)
                        .atan();

                let mut fov = [0u8; 16];
                fov[0..8].copy_from_slice(&hfov.to_le_bytes());
                fov[8..16].copy_from_slice(&vfov.to_le_bytes());

                self.notify.on_node_general_prop_changed(&row.name, PROP_FIELD_OF_VIEW, &fov)?;
            } else {
                self.notify.on_node_general_prop_changed(
                    &row.name,
                    prop_name,
                    &self.scratch[..data_len],
                )?;
            }
        }

        if let Some(row) = self.nodes.get_mut(header.node_id) {
            row.save_prop_undo(prop_name, UndoInfo::new(record_pos, header.undo_record_pos));
        }
        Ok(())
    }

    // ── Frame data ───────────────────────────────────────────────────────────

    fn handle_new_data(&mut self, header: RecordHeader, process_payload: bool) -> Result<()> {
        let data = decode_new_data(self.body(&header))?;
        let payload_size = u64::from(data.payload_size);

        if header.size + payload_size > RECORD_MAX_SIZE as u64 {
            return Err(Error::InternalBufferTooSmall(header.size + payload_size));
        }

        let record_pos = self.stream.tell()? - header.size;
        {
            let row = self
                .nodes
                .get_mut(header.node_id)
                .filter(|row| row.valid)
                .ok_or_else(|| {
                    Error::corrupt(format!("data record for non-existing node {}", header.node_id))
                })?;

            row.last_data_pos = record_pos;
            row.new_data_undo = UndoInfo::new(record_pos, header.undo_record_pos);

            if data.frame_number > row.frames {
                return Err(Error::corrupt(format!(
                    "frame number {} exceeds the node's {} recorded frames",
                    data.frame_number, row.frames
                )));
            }
            row.cur_frame = data.frame_number;
        }

        if data.timestamp > self.header.global_max_timestamp {
            return Err(Error::corrupt(format!(
                "timestamp of the record at {record_pos} exceeds the recording's maximum"
            )));
        }
        self.timestamp = data.timestamp;

        if !process_payload {
            self.stream.skip(payload_size)?;
            return Ok(());
        }

        let payload = data.payload_size as usize;
        self.stream.read_exact(&mut self.record_buffer[..payload])?;

        let codec_id = match self.nodes.get(header.node_id).and_then(|row| row.codec.as_ref()) {
            Some(codec) => codec.codec_id(),
            None => CODEC_UNCOMPRESSED,
        };

        if codec_id == CODEC_UNCOMPRESSED {
            let row = self.nodes.get(header.node_id).ok_or_else(|| {
                Error::corrupt(format!("data record for non-existing node {}", header.node_id))
            })?;
            self.notify.on_node_new_data(
                &row.name,
                data.timestamp,
                data.frame_number,
                &self.record_buffer[..payload],
            )?;
        } else {
            let row = self.nodes.get_mut(header.node_id).ok_or_else(|| {
                Error::corrupt(format!("data record for non-existing node {}", header.node_id))
            })?;
            let codec = row.codec.as_mut().ok_or_else(|| {
                Error::corrupt(format!("compressed data for codec-less node '{}'", row.name))
            })?;
            let decompressed = codec.decompress(&self.record_buffer[..payload], &mut self.scratch)?;
            self.notify.on_node_new_data(
                &row.name,
                data.timestamp,
                data.frame_number,
                &self.scratch[..decompressed],
            )?;
        }

        Ok(())
    }
}

// ── Summaries ────────────────────────────────────────────────────────────────

/// Snapshot of one node row for inspection tooling.
#[derive(Debug, Clone)]
pub struct NodeSummary {
    pub id: u32,
    pub name: String,
    pub node_type: NodeType,
    pub codec: CodecId,
    pub is_generator: bool,
    pub frames: u32,
    pub cur_frame: u32,
    pub has_seek_table: bool,
}
