//! Random access: frame seek (fast and slow paths) and timestamp seek.
//!
//! The invariant every path preserves is that there exists a point in the
//! original recording at which every generator was simultaneously at its
//! emitted frame.  The fast path proves it by matching configuration ids
//! across all generators' seek tables; the slow path proves it by exhaustive
//! replay — forward by re-dispatching records with payload emission
//! suppressed, backward by walking the undo chains every mutating record
//! carries.
//!
//! Both slow directions finish the same way: every generator's most recent
//! data record is re-emitted with payload, the seeking node last, so the
//! stream ends positioned directly after the primary node's frame.

use std::io::{Read, Seek};

use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::nodes::UndoInfo;
use crate::notify::NodeNotifications;
use crate::record::{decode_new_data, RecordHeader, RecordType, SeekIndexEntry};
use crate::stream::SeekOrigin;

use super::Player;

impl<S: Read + Seek, N: NodeNotifications> Player<S, N> {
    // ── Frame seek ───────────────────────────────────────────────────────────

    /// Seek a node to `origin + frame_offset`, clamped to `[1, frames]`.
    /// Every other generator is brought to the frame it was at when the
    /// target frame was recorded, and its frame is re-delivered to the sink;
    /// the target node's frame is delivered last.
    pub fn seek_to_frame(
        &mut self,
        node_name: &str,
        frame_offset: i64,
        origin: SeekOrigin,
    ) -> Result<()> {
        let node_id = self
            .nodes
            .find_by_name(node_name)
            .ok_or_else(|| Error::BadNodeName(node_name.to_owned()))?;
        let (cur_frame, frames) = match self.nodes.get(node_id) {
            Some(row) => (row.cur_frame, row.frames),
            None => return Err(Error::BadNodeName(node_name.to_owned())),
        };
        if frames == 0 {
            return Err(Error::BadParam(format!("node '{node_name}' has no recorded frames")));
        }

        let origin_frame: i64 = match origin {
            SeekOrigin::Set => 0,
            SeekOrigin::Cur => i64::from(cur_frame),
            SeekOrigin::End => i64::from(frames),
        };
        let dest_frame = (origin_frame + frame_offset).clamp(1, i64::from(frames)) as u32;

        self.seek_to_frame_absolute(node_id, dest_frame)
    }

    fn seek_to_frame_absolute(&mut self, node_id: u32, dest_frame: u32) -> Result<()> {
        let (cur_frame, last_data_pos) = match self.nodes.get(node_id) {
            Some(row) => (row.cur_frame, row.last_data_pos),
            None => return Err(Error::corrupt(format!("node id {node_id} out of range"))),
        };

        if dest_frame == cur_frame {
            // Already there: re-deliver the current frame.
            self.stream.seek_to(last_data_pos)?;
            return self.process_record(true);
        }

        if self.stage_fast_seek(node_id, dest_frame)? {
            // Move each staged node to its data record and read it, the
            // seeking node last; track the furthest position so the stream
            // ends after the latest consumed frame.
            let max_nodes = self.seek_targets.len();
            let primary = node_id as usize;
            let mut last_pos = 0u64;
            for i in 0..max_nodes {
                let it = if i == primary {
                    max_nodes - 1
                } else if i == max_nodes - 1 {
                    primary
                } else {
                    i
                };
                if let Some(entry) = self.seek_targets[it] {
                    self.stream.seek_to(entry.seek_pos)?;
                    self.process_record(true)?;
                    let pos = self.stream.tell()?;
                    if pos > last_pos {
                        last_pos = pos;
                    }
                }
            }
            self.stream.seek_to(last_pos)?;
            return Ok(());
        }

        let start_pos = self.stream.tell()?;
        if dest_frame < cur_frame + 1 {
            self.slow_seek_backward(node_id, dest_frame, start_pos)
        } else {
            // Forward: replay with payloads suppressed until the node
            // reaches the target frame, handling any properties on the way.
            loop {
                match self.nodes.get(node_id) {
                    Some(row) if row.cur_frame >= dest_frame => break,
                    Some(_) => self.process_record(false)?,
                    None => {
                        return Err(Error::corrupt(format!("node id {node_id} out of range")))
                    }
                }
            }
            self.process_each_node_last_data(node_id)
        }
    }

    // ── Fast path ────────────────────────────────────────────────────────────

    /// Fill `seek_targets` with each generator's seek-table entry for the
    /// destination, or return `false` when the fast path cannot prove
    /// cross-node consistency (missing tables or a configuration change).
    fn stage_fast_seek(&mut self, node_id: u32, dest_frame: u32) -> Result<bool> {
        for target in self.seek_targets.iter_mut() {
            *target = None;
        }

        let (cur_frame, cur_entry, dest_entry) = {
            let row = self
                .nodes
                .get(node_id)
                .ok_or_else(|| Error::corrupt(format!("node id {node_id} out of range")))?;
            let Some(index) = row.data_index.as_deref() else {
                debug!("slow seek: recording has no seek tables");
                return Ok(false);
            };
            (row.cur_frame, index[row.cur_frame as usize], index[dest_frame as usize])
        };

        if cur_entry.configuration_id != dest_entry.configuration_id {
            debug!(
                from = cur_frame,
                to = dest_frame,
                "slow seek: configuration changed between source and destination frames"
            );
            return Ok(false);
        }

        self.seek_targets[node_id as usize] = Some(dest_entry);

        // Find the frame every other generator was at by the destination
        // timestamp, and require it to be in the same configuration.
        for (i, row) in self.nodes.iter() {
            if i == node_id || !row.is_generator {
                continue;
            }
            let Some(index) = row.data_index.as_deref() else {
                debug!(node = i, "slow seek: node has no seek table");
                self.seek_targets[node_id as usize] = None;
                return Ok(false);
            };
            let entry = highest_entry_at_or_before(index, row.frames, dest_entry.timestamp);
            if entry.configuration_id != cur_entry.configuration_id {
                debug!(
                    from = cur_frame,
                    to = dest_frame,
                    node = i,
                    "slow seek: configuration changed on another node"
                );
                self.seek_targets[node_id as usize] = None;
                return Ok(false);
            }
            self.seek_targets[i as usize] = Some(entry);
        }

        Ok(true)
    }

    // ── Undo walker ──────────────────────────────────────────────────────────

    /// Walk an undo chain backwards until a record at or before `dest_pos`
    /// is found, dispatch it with payload suppressed, and report success.
    /// When the chain ends first, the stream position is restored and the
    /// walked-forward link state is returned with `false`.
    ///
    /// Offsets along the chain must strictly decrease; a hop that does not
    /// is corruption (a crafted back-pointer cycle would otherwise spin
    /// forever).
    fn undo_record(&mut self, mut undo: UndoInfo, dest_pos: u64) -> Result<(UndoInfo, bool)> {
        let original_pos = self.stream.tell()?;
        let mut last_header: Option<RecordHeader> = None;

        while undo.record_pos > dest_pos && undo.undo_record_pos != 0 {
            if undo.undo_record_pos >= undo.record_pos {
                return Err(Error::corrupt("undo chain does not strictly descend"));
            }
            self.stream.seek_to(undo.undo_record_pos)?;
            let header = self.read_record_header()?;
            undo.record_pos = undo.undo_record_pos;
            undo.undo_record_pos = header.undo_record_pos;
            last_header = Some(header);
        }

        if undo.record_pos <= dest_pos {
            // This record was in force at the destination; apply it.
            let header = last_header
                .ok_or_else(|| Error::corrupt("undo chain terminated without a record"))?;
            self.read_record_body(&header)?;
            self.handle_record(header, false)?;
            Ok((undo, true))
        } else {
            self.stream.seek_to(original_pos)?;
            Ok((undo, false))
        }
    }

    // ── Slow path, backward ──────────────────────────────────────────────────

    fn slow_seek_backward(&mut self, node_id: u32, dest_frame: u32, start_pos: u64) -> Result<()> {
        let (mut dest_record_pos, mut undo_pos) = match self.nodes.get(node_id) {
            Some(row) => (row.new_data_undo.record_pos, row.new_data_undo.undo_record_pos),
            None => return Err(Error::corrupt(format!("node id {node_id} out of range"))),
        };

        // Scan back through the frames' undo chain until a frame number at
        // or below the destination.
        let found_header = loop {
            if undo_pos == 0 {
                // This data frame cannot be the node's first, so the chain
                // is broken.
                return Err(Error::corrupt(format!(
                    "undo frame not found for frame at position {dest_record_pos}"
                )));
            }
            if undo_pos >= dest_record_pos {
                return Err(Error::corrupt("undo chain does not strictly descend"));
            }

            self.stream.seek_to(undo_pos)?;
            let header = self.read_record_header()?;
            if header.record_type != RecordType::NewData {
                return Err(Error::corrupt(format!(
                    "unexpected record type {:?} in a data undo chain",
                    header.record_type
                )));
            }
            if header.node_id != node_id {
                return Err(Error::corrupt(format!(
                    "unexpected node id {} in a data undo chain",
                    header.node_id
                )));
            }
            self.read_record_body(&header)?;
            let body = decode_new_data(self.body(&header))?;

            dest_record_pos = undo_pos;
            undo_pos = header.undo_record_pos;

            if body.frame_number <= dest_frame {
                break header;
            }
        };

        // Apply the found frame's bookkeeping (payload stays skipped).
        self.handle_new_data(found_header, false)?;

        for k in 0..self.nodes.len() {
            // Roll back every property set between the destination and the
            // start position.
            let touched: Vec<(String, UndoInfo)> = match self.nodes.get(k) {
                Some(row) => row
                    .prop_undo
                    .iter()
                    .filter(|(_, u)| u.record_pos > dest_record_pos && u.record_pos < start_pos)
                    .map(|(name, u)| (name.clone(), *u))
                    .collect(),
                None => continue,
            };
            for (prop_name, info) in touched {
                let (walked, undone) = self.undo_record(info, dest_record_pos)?;
                if !undone {
                    // Chain exhausted: the property had no value at the
                    // destination.  Keep the walked link state.
                    if let Some(row) = self.nodes.get_mut(k) {
                        row.save_prop_undo(&prop_name, walked);
                    }
                }
            }

            // Roll back the other generators' data records.
            let (is_generator, data_undo) = match self.nodes.get(k) {
                Some(row) => (row.is_generator, row.new_data_undo),
                None => continue,
            };
            if k != node_id
                && is_generator
                && data_undo.record_pos > dest_record_pos
                && data_undo.record_pos < start_pos
            {
                let (_, undone) = self.undo_record(data_undo, dest_record_pos)?;
                if !undone {
                    // No data frame for this node before the destination.
                    if let Some(row) = self.nodes.get_mut(k) {
                        row.last_data_pos = 0;
                        row.new_data_undo.reset();
                    }
                }
            }
        }

        self.process_each_node_last_data(node_id)
    }

    // ── Final frame delivery ─────────────────────────────────────────────────

    /// Emit every generator's last data record with payload, the primary
    /// node last so the stream ends right after its frame.  A generator
    /// with no data at this position gets a synthesized zero frame.
    fn process_each_node_last_data(&mut self, primary: u32) -> Result<()> {
        let max_nodes = self.nodes.len();
        for i in 0..max_nodes {
            // Swap `primary` with the final slot so it is handled last.
            let it = if i == primary {
                max_nodes - 1
            } else if i == max_nodes - 1 {
                primary
            } else {
                i
            };

            let (is_generator, valid, last_data_pos) = match self.nodes.get(it) {
                Some(row) => (row.is_generator, row.valid, row.last_data_pos),
                None => continue,
            };
            if !is_generator {
                continue;
            }
            if !valid {
                error!(node = it, "generator node is not valid");
                return Err(Error::corrupt(format!("node with id {it} is not valid")));
            }

            if last_data_pos == 0 {
                // The node had produced nothing by this position; push a
                // zero frame so consumers do not keep stale data.
                self.record_buffer.fill(0);
                let name = match self.nodes.get(it) {
                    Some(row) => &row.name,
                    None => continue,
                };
                self.notify.on_node_new_data(name, 0, 0, &self.record_buffer)?;
            } else {
                self.stream.seek_to(last_data_pos)?;
                self.process_record(true)?;
            }
        }
        Ok(())
    }

    // ── Timestamp seek ───────────────────────────────────────────────────────

    /// Seek to a timestamp.  `Set` takes `time_offset` as an absolute
    /// timestamp, `Cur` is relative to the last delivered frame, and `End`
    /// goes to the recording's global maximum.
    pub fn seek_to_timestamp(&mut self, time_offset: i64, origin: SeekOrigin) -> Result<()> {
        match origin {
            SeekOrigin::Set => {
                if time_offset < 0 {
                    return Err(Error::BadParam("absolute timestamp cannot be negative".into()));
                }
                self.seek_to_timestamp_absolute(time_offset as u64)
            }
            SeekOrigin::Cur => {
                self.seek_to_timestamp_absolute(self.timestamp.saturating_add_signed(time_offset))
            }
            SeekOrigin::End => self.seek_to_timestamp_absolute(self.header.global_max_timestamp),
        }
    }

    fn seek_to_timestamp_absolute(&mut self, mut dest_timestamp: u64) -> Result<()> {
        let start_pos = self.stream.tell()?;

        if dest_timestamp < self.timestamp {
            self.rewind()?;
        } else if dest_timestamp == self.timestamp {
            return Ok(());
        }
        if dest_timestamp > self.header.global_max_timestamp {
            dest_timestamp = self.header.global_max_timestamp;
        }

        // Scan forward reading only data headers; everything else is
        // processed normally on the way.
        let mut record_timestamp = 0u64;
        let mut ended = false;
        while record_timestamp < dest_timestamp && !ended {
            let header = self.read_record_header()?;
            match header.record_type {
                RecordType::NewData => {
                    self.read_record_body(&header)?;
                    let body = decode_new_data(self.body(&header))?;
                    record_timestamp = body.timestamp;

                    if record_timestamp >= dest_timestamp {
                        // Done: back up to the start of this record so the
                        // next read delivers it.
                        self.stream.seek(SeekOrigin::Cur, -(header.size as i64))?;
                    } else {
                        self.stream.skip(u64::from(body.payload_size))?;
                    }
                }
                RecordType::End => {
                    ended = true;
                }
                _ => {
                    self.read_record_body(&header)?;
                    self.handle_record(header, true)?;
                }
            }
        }

        if ended {
            self.stream.seek_to(start_pos)?;
            return Err(Error::IllegalPosition);
        }
        Ok(())
    }
}

/// Binary search for the highest entry with `timestamp ≤ target`.  Returns
/// the sentinel entry 0 when every recorded frame is later than the target.
fn highest_entry_at_or_before(
    index: &[SeekIndexEntry],
    frames: u32,
    timestamp: u64,
) -> SeekIndexEntry {
    let mut first = 1usize;
    let mut last = frames as usize;
    while first <= last {
        let mid = (first + last) / 2;
        if index[mid].timestamp > timestamp {
            last = mid - 1;
        } else {
            first = mid + 1;
        }
    }
    index[first - 1]
}
