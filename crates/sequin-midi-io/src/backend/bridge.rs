//! Backend for audio servers that move MIDI inside a periodic process callback.
//!
//! Control threads only ever write to or read from the bridge rings. The
//! callback halves are collected in an [`RtCallback`] which the host's
//! process function owns and drives once per period.

use super::{MidiBackend, PortIo};
use crate::bridge::{
    frame_ring, input_queue, BridgeStats, BridgeStatsSnapshot, FrameReader, FrameWriter,
    InputFrame, InputOutcome, InputQueue, PeriodBuffer, RtInput,
};
use crate::port::{PortDescriptor, PortDirection, PortId, PortKind};
use crate::{Error, Result};
use parking_lot::Mutex;
use sequin_core::SequencerConfig;
use std::sync::Arc;

/// Events one output port may emit per period.
pub const PERIOD_MAX_EVENTS: usize = 1024;

const SERVER_CLIENT: u32 = 0;
const OWN_CLIENT: u32 = 1;

struct RtOutput {
    id: PortId,
    reader: FrameReader,
    period: PeriodBuffer,
}

/// Real-time halves of every port opened on a [`BridgeBackend`].
///
/// Owned by the process callback. Nothing here locks or allocates once built.
#[derive(Default)]
pub struct RtCallback {
    outputs: Vec<RtOutput>,
    inputs: Vec<(PortId, RtInput)>,
}

impl RtCallback {
    /// One period of output: refills each port buffer from its ring.
    ///
    /// Returns the total number of events placed in port buffers.
    pub fn process(&mut self) -> usize {
        let mut total = 0;
        for out in &mut self.outputs {
            out.period.clear();
            total += out.reader.drain_into(&mut out.period);
        }
        total
    }

    /// Events written to `id`'s port buffer by the last [`process`](Self::process).
    pub fn output_buffer(&self, id: PortId) -> Option<&PeriodBuffer> {
        self.outputs
            .iter()
            .find(|o| o.id == id)
            .map(|o| &o.period)
    }

    /// Hands one frame received on input port `id` to the record queue.
    pub fn receive(&mut self, id: PortId, now_us: u64, frame: &[u8]) -> Option<InputOutcome> {
        self.inputs
            .iter_mut()
            .find(|(p, _)| *p == id)
            .map(|(_, rt)| rt.push(now_us, frame))
    }

    /// Next input frame gets a zero delta, as after a server restart.
    pub fn cold_start(&mut self) {
        for (_, rt) in &mut self.inputs {
            rt.cold_start();
        }
    }

    /// Takes over the halves of ports opened after this callback was built.
    pub fn absorb(&mut self, other: RtCallback) {
        self.outputs.extend(other.outputs);
        self.inputs.extend(other.inputs);
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }
}

#[derive(Default)]
struct BridgeState {
    ports: Vec<PortDescriptor>,
    pending: RtCallback,
    next_virtual: u32,
}

#[derive(Clone, Default)]
pub struct BridgeBackend {
    state: Arc<Mutex<BridgeState>>,
}

impl BridgeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, name: &str, direction: PortDirection) -> PortId {
        let mut st = self.state.lock();
        let id = PortId::new(SERVER_CLIENT, st.ports.len() as u32);
        st.ports
            .push(PortDescriptor::new(id, "server", name, direction));
        id
    }

    /// Registers a server port that playback can be routed to.
    pub fn add_output(&self, name: &str) -> PortId {
        self.add(name, PortDirection::Output)
    }

    pub fn add_input(&self, name: &str) -> PortId {
        self.add(name, PortDirection::Input)
    }

    /// Real-time halves of everything opened since the last call.
    pub fn take_callback(&self) -> RtCallback {
        std::mem::take(&mut self.state.lock().pending)
    }

    fn attach(&self, id: PortId, direction: PortDirection, config: &SequencerConfig) -> Box<dyn PortIo> {
        let mut st = self.state.lock();
        match direction {
            PortDirection::Output => {
                let stats = Arc::new(BridgeStats::default());
                let (writer, reader) = frame_ring(config.ring_buffer_size, Arc::clone(&stats));
                st.pending.outputs.push(RtOutput {
                    id,
                    reader,
                    period: PeriodBuffer::new(config.ring_buffer_size, PERIOD_MAX_EVENTS),
                });
                Box::new(BridgeOutputIo { id, writer, stats })
            }
            PortDirection::Input => {
                let (rt, queue) = input_queue(config.input_queue_size);
                st.pending.inputs.push((id, rt));
                Box::new(BridgeInputIo { queue })
            }
        }
    }
}

impl MidiBackend for BridgeBackend {
    fn name(&self) -> &str {
        "bridge"
    }

    fn enumerate(&self) -> Result<Vec<PortDescriptor>> {
        Ok(self.state.lock().ports.clone())
    }

    fn open(&self, port: &PortDescriptor, config: &SequencerConfig) -> Result<Box<dyn PortIo>> {
        let known = self.state.lock().ports.iter().any(|p| p.id == port.id);
        if !known {
            return Err(Error::MidiPort(format!("no server port {}", port.id)));
        }
        tracing::debug!("Opened bridge port {} ({})", port.id, port.port_name);
        Ok(self.attach(port.id, port.direction, config))
    }

    fn create_virtual(
        &self,
        name: &str,
        direction: PortDirection,
        config: &SequencerConfig,
    ) -> Result<(PortDescriptor, Box<dyn PortIo>)> {
        let id = {
            let mut st = self.state.lock();
            let id = PortId::new(OWN_CLIENT, st.next_virtual);
            st.next_virtual += 1;
            id
        };
        let desc = PortDescriptor::new(id, config.client_name.as_str(), name, direction)
            .with_kind(PortKind::Virtual);
        tracing::debug!("Created bridge virtual port {} ({})", id, name);
        Ok((desc, self.attach(id, direction, config)))
    }

    fn take_rt_callback(&self) -> Option<RtCallback> {
        Some(self.take_callback())
    }
}

struct BridgeOutputIo {
    id: PortId,
    writer: FrameWriter,
    stats: Arc<BridgeStats>,
}

impl PortIo for BridgeOutputIo {
    fn send(&mut self, bytes: &[u8]) -> bool {
        let ok = self.writer.write(bytes, 0);
        if !ok {
            tracing::debug!(
                "Bridge port {}: output ring full, dropped {} bytes",
                self.id,
                bytes.len()
            );
        }
        ok
    }

    fn stats(&self) -> Option<BridgeStatsSnapshot> {
        Some(self.stats.snapshot())
    }
}

struct BridgeInputIo {
    queue: InputQueue,
}

impl PortIo for BridgeInputIo {
    fn send(&mut self, _bytes: &[u8]) -> bool {
        false
    }

    fn poll_input(&mut self) -> Option<InputFrame> {
        self.queue.pop()
    }

    fn pending_input(&self) -> usize {
        self.queue.pending()
    }

    fn stats(&self) -> Option<BridgeStatsSnapshot> {
        Some(self.queue.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_reaches_period_buffer() {
        let backend = BridgeBackend::new();
        let id = backend.add_output("playback");
        let desc = backend.enumerate().unwrap().remove(0);
        let mut io = backend.open(&desc, &SequencerConfig::default()).unwrap();
        let mut callback = backend.take_callback();

        assert!(io.send(&[0x90, 60, 100]));
        assert!(io.send(&[0xF8]));
        assert_eq!(callback.process(), 2);

        let buffer = callback.output_buffer(id).unwrap();
        let frames: Vec<&[u8]> = buffer.frames().collect();
        assert_eq!(frames, vec![&[0x90, 60, 100][..], &[0xF8][..]]);

        // Next period starts empty.
        assert_eq!(callback.process(), 0);
        assert!(callback.output_buffer(id).unwrap().is_empty());
    }

    #[test]
    fn test_input_through_callback() {
        let backend = BridgeBackend::new();
        let id = backend.add_input("capture");
        let desc = backend.enumerate().unwrap().remove(0);
        let mut io = backend.open(&desc, &SequencerConfig::default()).unwrap();
        let mut callback = backend.take_callback();

        assert_eq!(callback.receive(id, 1_000, &[0x90, 60, 100]), Some(InputOutcome::Queued));
        assert_eq!(callback.receive(id, 1_500, &[0xFE]), Some(InputOutcome::Filtered));
        assert_eq!(callback.receive(PortId::new(9, 9), 0, &[0x90, 1, 1]), None);

        assert_eq!(io.pending_input(), 1);
        let frame = io.poll_input().unwrap();
        assert_eq!(frame.delta_us, 0);
        assert_eq!(io.stats().unwrap().filtered, 1);
    }

    #[test]
    fn test_unknown_port_rejected() {
        let backend = BridgeBackend::new();
        let desc = PortDescriptor::new(PortId::new(5, 5), "x", "y", PortDirection::Output);
        assert!(backend.open(&desc, &SequencerConfig::default()).is_err());
    }

    #[test]
    fn test_virtual_ports_register_callback_halves() {
        let backend = BridgeBackend::new();
        let config = SequencerConfig::default();
        backend
            .create_virtual("out", PortDirection::Output, &config)
            .unwrap();
        let mut callback = backend.take_callback();
        assert_eq!(callback.output_count(), 1);

        backend
            .create_virtual("in", PortDirection::Input, &config)
            .unwrap();
        callback.absorb(backend.take_callback());
        assert_eq!(callback.input_count(), 1);
    }
}
