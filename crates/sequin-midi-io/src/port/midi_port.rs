//! A single MIDI endpoint.
//!
//! Every operation takes the port's mutex for its whole duration, so a
//! port is safe to drive from several control threads. The real-time side
//! of a backend never sees this lock; it talks to the bridge rings only.

use super::clock::{song_position_bytes, ClockState};
use super::{PortDescriptor, PortDirection, PortId, PortInfo, PortKind};
use crate::backend::PortIo;
use crate::bridge::{BridgeStatsSnapshot, InputFrame};
use parking_lot::Mutex;
use sequin_core::{ClockMode, Pulse, SequencerConfig};
use sequin_midi::{status, TimedEvent};

struct PortState {
    clock_mode: ClockMode,
    enabled: bool,
    available: bool,
    bpm: f64,
    clock: ClockState,
    io: Option<Box<dyn PortIo>>,
}

impl PortState {
    fn send(&mut self, bytes: &[u8]) -> bool {
        if !self.enabled {
            return false;
        }
        match self.io.as_mut() {
            Some(io) => io.send(bytes),
            None => false,
        }
    }

    fn clocking(&self) -> bool {
        self.enabled && self.available && self.clock_mode.is_clocking()
    }

    fn start(&mut self) {
        self.clock.reset();
        if self.clocking() {
            self.send(&[status::START]);
        }
    }

    fn continue_from(&mut self, tick: Pulse) {
        let beats = self.clock.continue_from(tick);
        if self.clocking() {
            self.send(&song_position_bytes(beats));
            self.send(&[status::CONTINUE]);
        }
    }
}

pub struct Port {
    bus: usize,
    id: PortId,
    direction: PortDirection,
    kind: PortKind,
    client_name: String,
    port_name: String,
    bus_name: Option<String>,
    max_ex_data_len: usize,
    init_disabled_ports: bool,
    state: Mutex<PortState>,
}

impl Port {
    /// A closed port; attach a backend endpoint with [`with_io`](Self::with_io).
    pub fn new(bus: usize, descriptor: &PortDescriptor, config: &SequencerConfig) -> Self {
        let enabled = descriptor.kind == PortKind::System;
        Self {
            bus,
            id: descriptor.id,
            direction: descriptor.direction,
            kind: descriptor.kind,
            client_name: descriptor.client_name.clone(),
            port_name: descriptor.port_name.clone(),
            bus_name: None,
            max_ex_data_len: config.max_ex_data_len,
            init_disabled_ports: config.init_disabled_ports,
            state: Mutex::new(PortState {
                clock_mode: ClockMode::Off,
                enabled,
                available: false,
                bpm: config.bpm,
                clock: ClockState::new(config.ppqn, config.clock_mod),
                io: None,
            }),
        }
    }

    pub fn with_io(self, io: Box<dyn PortIo>) -> Self {
        {
            let mut st = self.state.lock();
            st.io = Some(io);
            st.available = true;
        }
        self
    }

    pub fn with_bus_name(mut self, name: Option<String>) -> Self {
        self.bus_name = name.filter(|n| !n.is_empty());
        self
    }

    // Identity

    #[inline]
    pub fn bus(&self) -> usize {
        self.bus
    }

    #[inline]
    pub fn id(&self) -> PortId {
        self.id
    }

    #[inline]
    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    #[inline]
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    #[inline]
    pub fn is_virtual(&self) -> bool {
        self.kind == PortKind::Virtual
    }

    #[inline]
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// `"client:port"` as the backend names it.
    pub fn connect_name(&self) -> String {
        format!("{}:{}", self.client_name, self.port_name)
    }

    /// User bus name if one is set, else the connect name.
    pub fn name(&self) -> String {
        self.bus_name.clone().unwrap_or_else(|| self.connect_name())
    }

    /// `"[bus] client:port name"`.
    pub fn display_name(&self) -> String {
        format!("[{}] {} {}", self.bus, self.id, self.name())
    }

    // Status

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn is_available(&self) -> bool {
        self.state.lock().available
    }

    /// Virtual ports are never connected by the backend.
    pub fn is_port_connectable(&self) -> bool {
        !self.is_virtual() && (self.state.lock().enabled || self.init_disabled_ports)
    }

    pub fn info(&self) -> PortInfo {
        let st = self.state.lock();
        PortInfo {
            bus: self.bus,
            id: self.id,
            display_name: self.display_name(),
            connect_name: self.connect_name(),
            direction: self.direction,
            kind: self.kind,
            clock: st.clock_mode,
            enabled: st.enabled,
            available: st.available,
        }
    }

    /// Marks the endpoint as gone and releases the backend connection.
    pub fn mark_unavailable(&self) {
        let mut st = self.state.lock();
        st.available = false;
        if let Some(mut io) = st.io.take() {
            io.close();
        }
    }

    pub fn close(&self) {
        self.mark_unavailable();
    }

    // Output

    /// Sends `event` with its voice channel replaced by `channel`.
    pub fn play(&self, event: &TimedEvent, channel: u8) -> bool {
        if event.is_sysex() {
            return self.sysex(event);
        }
        if !event.is_playable() {
            return false;
        }
        let bytes = event.wire_bytes_on(channel);
        self.state.lock().send(&bytes)
    }

    pub fn sysex(&self, event: &TimedEvent) -> bool {
        if !event.is_sysex() {
            return false;
        }
        let len = event.ex_data().len();
        if len > self.max_ex_data_len {
            tracing::warn!(
                "{}: dropping {}-byte SysEx (limit {})",
                self.display_name(),
                len,
                self.max_ex_data_len
            );
            return false;
        }
        self.state.lock().send(event.ex_data())
    }

    pub fn flush(&self) -> bool {
        let mut st = self.state.lock();
        match st.io.as_mut() {
            Some(io) => io.flush(),
            None => false,
        }
    }

    // Clock

    pub fn clock_mode(&self) -> ClockMode {
        self.state.lock().clock_mode
    }

    /// Changes the clock policy. `Disabled` takes an output port out of use.
    pub fn set_clock(&self, mode: ClockMode) {
        let mut st = self.state.lock();
        st.clock_mode = mode;
        if self.direction == PortDirection::Output {
            st.enabled = mode.is_port_enabled();
        }
        if let Some(io) = st.io.as_mut() {
            io.set_clock_mode(mode);
        }
    }

    pub fn last_tick(&self) -> Pulse {
        self.state.lock().clock.last_tick()
    }

    pub fn ppqn(&self) -> u32 {
        self.state.lock().clock.ppqn()
    }

    pub fn set_ppqn(&self, ppqn: u32) {
        self.state.lock().clock.set_ppqn(ppqn);
    }

    pub fn bpm(&self) -> f64 {
        self.state.lock().bpm
    }

    pub fn set_bpm(&self, bpm: f64) {
        self.state.lock().bpm = bpm;
    }

    /// Resets the clock and sends Start if this port emits clock.
    pub fn start(&self) {
        self.state.lock().start();
    }

    pub fn stop(&self) {
        let mut st = self.state.lock();
        st.clock.reset();
        if st.clocking() {
            st.send(&[status::STOP]);
        }
    }

    /// Repositions the clock to the 16th note at or after `tick`. A clocking
    /// port also sends Song Position and Continue.
    pub fn continue_from(&self, tick: Pulse) {
        self.state.lock().continue_from(tick);
    }

    /// Prepares the clock for playback starting at `tick`, according to the clock mode.
    pub fn init_clock(&self, tick: Pulse) {
        let mut st = self.state.lock();
        if !st.clocking() {
            return;
        }
        match st.clock_mode {
            ClockMode::Pos if tick != 0 => st.continue_from(tick),
            ClockMode::Mod => {
                st.start();
                st.clock.align_to_modulo(tick);
            }
            _ => {
                st.start();
                if tick != 0 {
                    st.clock.resume_at(tick);
                }
            }
        }
    }

    /// Emits every clock pulse between the last emitted tick and `tick`.
    pub fn clock(&self, tick: Pulse) -> usize {
        let mut st = self.state.lock();
        if !st.clocking() {
            return 0;
        }
        let PortState { clock, io, .. } = &mut *st;
        let Some(io) = io.as_mut() else {
            return 0;
        };
        let pulses = clock.advance(tick, || {
            io.send(&[status::CLOCK]);
        });
        if pulses > 0 {
            io.flush();
        }
        pulses
    }

    // Input

    /// Enables or disables recording from an input port. System inputs stay enabled.
    pub fn set_input(&self, enable: bool) -> bool {
        if self.direction != PortDirection::Input {
            return false;
        }
        self.state.lock().enabled = enable || self.kind == PortKind::System;
        true
    }

    pub fn pending_input(&self) -> usize {
        let st = self.state.lock();
        if !st.enabled || !st.available {
            return 0;
        }
        st.io.as_ref().map_or(0, |io| io.pending_input())
    }

    /// Takes the next received frame. Frames arriving while disabled are discarded.
    pub fn poll_input(&self) -> Option<InputFrame> {
        let mut st = self.state.lock();
        let enabled = st.enabled;
        let io = st.io.as_mut()?;
        if !enabled {
            while io.poll_input().is_some() {}
            return None;
        }
        io.poll_input()
    }

    pub fn stats(&self) -> Option<BridgeStatsSnapshot> {
        self.state.lock().io.as_ref().and_then(|io| io.stats())
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("bus", &self.bus)
            .field("id", &self.id)
            .field("direction", &self.direction)
            .field("kind", &self.kind)
            .field("name", &self.connect_name())
            .finish()
    }
}
