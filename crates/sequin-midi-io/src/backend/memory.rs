//! In-process backend that records every byte sent and replays fed input.
//!
//! Cheap to clone; clones share state, so a test can keep one handle while
//! the router owns another.

use super::{MidiBackend, PortIo};
use crate::bridge::InputFrame;
use crate::port::{PortDescriptor, PortDirection, PortId, PortKind};
use crate::{Error, Result};
use parking_lot::Mutex;
use sequin_core::SequencerConfig;
use sequin_midi::WireBytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

const VIRTUAL_CLIENT: u32 = 128;

#[derive(Default)]
struct MemoryState {
    ports: Vec<PortDescriptor>,
    sent: Vec<(PortId, Vec<u8>)>,
    flushes: usize,
    inputs: HashMap<PortId, VecDeque<InputFrame>>,
    failing: HashSet<PortId>,
    next_virtual: u32,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, name: &str, direction: PortDirection, kind: PortKind) -> PortId {
        let mut st = self.state.lock();
        let id = PortId::new(st.ports.len() as u32 + 1, 0);
        st.ports
            .push(PortDescriptor::new(id, "memory", name, direction).with_kind(kind));
        if direction == PortDirection::Input {
            st.inputs.entry(id).or_default();
        }
        id
    }

    pub fn add_output(&self, name: &str) -> PortId {
        self.add(name, PortDirection::Output, PortKind::Normal)
    }

    pub fn add_input(&self, name: &str) -> PortId {
        self.add(name, PortDirection::Input, PortKind::Normal)
    }

    pub fn add_system_input(&self, name: &str) -> PortId {
        self.add(name, PortDirection::Input, PortKind::System)
    }

    pub fn with_outputs(self, count: usize) -> Self {
        for i in 0..count {
            self.add_output(&format!("out {}", i));
        }
        self
    }

    pub fn with_inputs(self, count: usize) -> Self {
        for i in 0..count {
            self.add_input(&format!("in {}", i));
        }
        self
    }

    /// Makes every later `open` of `id` fail, as if the device vanished.
    pub fn fail_open(&self, id: PortId) {
        self.state.lock().failing.insert(id);
    }

    /// Queues one received message on an input endpoint.
    pub fn feed(&self, id: PortId, delta_us: u64, bytes: &[u8]) {
        let frame = InputFrame {
            delta_us,
            bytes: WireBytes::from_slice(bytes),
        };
        self.state
            .lock()
            .inputs
            .entry(id)
            .or_default()
            .push_back(frame);
    }

    pub fn sent(&self) -> Vec<(PortId, Vec<u8>)> {
        self.state.lock().sent.clone()
    }

    pub fn sent_to(&self, id: PortId) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|(p, _)| *p == id)
            .map(|(_, b)| b.clone())
            .collect()
    }

    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    pub fn flush_count(&self) -> usize {
        self.state.lock().flushes
    }
}

impl MidiBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn enumerate(&self) -> Result<Vec<PortDescriptor>> {
        Ok(self.state.lock().ports.clone())
    }

    fn open(&self, port: &PortDescriptor, _config: &SequencerConfig) -> Result<Box<dyn PortIo>> {
        if self.state.lock().failing.contains(&port.id) {
            return Err(Error::MidiPort(format!(
                "cannot open {}:{}",
                port.client_name, port.port_name
            )));
        }
        tracing::debug!("Opened memory port {} ({})", port.id, port.port_name);
        Ok(Box::new(MemoryIo {
            id: port.id,
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }

    fn create_virtual(
        &self,
        name: &str,
        direction: PortDirection,
        _config: &SequencerConfig,
    ) -> Result<(PortDescriptor, Box<dyn PortIo>)> {
        let mut st = self.state.lock();
        let id = PortId::new(VIRTUAL_CLIENT, st.next_virtual);
        st.next_virtual += 1;
        if direction == PortDirection::Input {
            st.inputs.entry(id).or_default();
        }
        let desc = PortDescriptor::new(id, "sequin", name, direction).with_kind(PortKind::Virtual);
        let io = MemoryIo {
            id,
            state: Arc::clone(&self.state),
            closed: false,
        };
        Ok((desc, Box::new(io)))
    }
}

struct MemoryIo {
    id: PortId,
    state: Arc<Mutex<MemoryState>>,
    closed: bool,
}

impl PortIo for MemoryIo {
    fn send(&mut self, bytes: &[u8]) -> bool {
        if self.closed {
            return false;
        }
        self.state.lock().sent.push((self.id, bytes.to_vec()));
        true
    }

    fn flush(&mut self) -> bool {
        self.state.lock().flushes += 1;
        !self.closed
    }

    fn poll_input(&mut self) -> Option<InputFrame> {
        if self.closed {
            return None;
        }
        self.state.lock().inputs.get_mut(&self.id)?.pop_front()
    }

    fn pending_input(&self) -> usize {
        self.state
            .lock()
            .inputs
            .get(&self.id)
            .map_or(0, VecDeque::len)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
