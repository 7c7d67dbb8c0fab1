//! Notification contract between the player and its consumer.
//!
//! Every record the dispatcher processes produces its notifications before
//! the dispatch call returns, in record order.  Byte-buffer arguments
//! (`on_node_general_prop_changed`, `on_node_new_data`) are borrowed from
//! the player's reusable record buffer and are valid only for the duration
//! of the call — a sink that needs them afterwards must copy.
//!
//! Any error returned by a sink aborts the current dispatch call and
//! propagates unchanged to the player's caller.

use crate::codec::CodecId;
use crate::error::Result;
use crate::nodes::NodeType;

/// Receives replayed events.  All methods default to a no-op so sinks only
/// implement what they observe.
#[allow(unused_variables)]
pub trait NodeNotifications {
    fn on_node_added(
        &mut self,
        name: &str,
        node_type: NodeType,
        codec: CodecId,
        frames: u32,
    ) -> Result<()> {
        Ok(())
    }

    fn on_node_removed(&mut self, name: &str) -> Result<()> {
        Ok(())
    }

    fn on_node_state_ready(&mut self, name: &str) -> Result<()> {
        Ok(())
    }

    fn on_node_int_prop_changed(&mut self, name: &str, prop: &str, value: u64) -> Result<()> {
        Ok(())
    }

    fn on_node_real_prop_changed(&mut self, name: &str, prop: &str, value: f64) -> Result<()> {
        Ok(())
    }

    fn on_node_string_prop_changed(&mut self, name: &str, prop: &str, value: &str) -> Result<()> {
        Ok(())
    }

    fn on_node_general_prop_changed(&mut self, name: &str, prop: &str, data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn on_node_new_data(
        &mut self,
        name: &str,
        timestamp: u64,
        frame_number: u32,
        data: &[u8],
    ) -> Result<()> {
        Ok(())
    }
}

// ── End-of-file registry ─────────────────────────────────────────────────────

/// Handle returned by [`EofRegistry::register`]; pass it back to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EofHandle(u64);

/// Multicast registry raised by the `End` handler, once per `End` record,
/// before any rewind or close.
#[derive(Default)]
pub struct EofRegistry {
    next_handle: u64,
    callbacks: Vec<(u64, Box<dyn FnMut()>)>,
}

impl EofRegistry {
    pub fn register(&mut self, callback: Box<dyn FnMut()>) -> EofHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.callbacks.push((handle, callback));
        EofHandle(handle)
    }

    pub fn unregister(&mut self, handle: EofHandle) {
        self.callbacks.retain(|(h, _)| *h != handle.0);
    }

    /// Invoke every live callback in registration order.
    pub fn raise(&mut self) {
        for (_, callback) in &mut self.callbacks {
            callback();
        }
    }
}
