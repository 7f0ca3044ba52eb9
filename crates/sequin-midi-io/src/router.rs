//! Port router: all output and input ports behind one lock.
//!
//! Transport broadcasts (start, stop, continue, clock) reach every output
//! port inside a single acquisition of the router lock. Recorded input is
//! fanned out to armed [`RecordTarget`]s after the lock is released, so a
//! target may call back into the router.
//!
//! Per-bus clock and input settings are kept in [`StatusList`](crate::StatusList)s
//! that outlive the ports themselves.

use crate::backend::MidiBackend;
use crate::bridge::BridgeStatsSnapshot;
use crate::port::{Port, PortDescriptor, PortDirection, PortId, PortInfo};
use crate::status::{ClockList, InputList};
use crate::{Error, Result};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use sequin_core::config::{MAX_BPM, MAX_PPQN, MIN_BPM, MIN_PPQN};
use sequin_core::{AtomicFlag, ClockMode, Pulse, RecordMode, SequencerConfig};
use sequin_midi::{ByteContext, TimedEvent};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound on ports per direction.
pub const MAX_BUSES: usize = 48;

const PANIC_CHANNELS: u8 = 16;
const PANIC_NOTES: u8 = 128;

/// One received message, tagged with the input bus it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub bus: usize,
    /// Microseconds since the previous frame on the same input.
    pub delta_us: u64,
    pub event: TimedEvent,
}

/// Something that can receive recorded events, typically a pattern.
pub trait RecordTarget: Send + Sync {
    /// Stable identity; arming the same id twice is idempotent.
    fn target_id(&self) -> u64;

    /// Channel this target records in by-channel mode. `None` takes any channel.
    fn record_channel(&self) -> Option<u8> {
        None
    }

    /// Input bus this target records in by-buss mode. `None` takes any bus.
    fn record_bus(&self) -> Option<usize> {
        None
    }

    /// Returns true if the event was accepted.
    fn deliver(&self, event: &InboundEvent) -> bool;
}

/// Human-readable names for output buses.
pub trait PortNaming {
    fn bus_name(&self, bus: usize) -> Option<String>;
}

impl PortNaming for SequencerConfig {
    fn bus_name(&self, bus: usize) -> Option<String> {
        SequencerConfig::bus_name(self, bus).map(str::to_string)
    }
}

/// Read-only view of router state for displays and persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterSnapshot {
    pub outputs: Vec<PortInfo>,
    pub inputs: Vec<PortInfo>,
    pub clocks: ClockList,
    pub input_status: InputList,
    pub record_mode: RecordMode,
}

struct RouterInner {
    outputs: Vec<Port>,
    inputs: Vec<Port>,
    clocks: ClockList,
    input_status: InputList,
    record_mode: RecordMode,
    targets: Vec<Arc<dyn RecordTarget>>,
    next_input: usize,
    ppqn: u32,
    bpm: f64,
}

impl RouterInner {
    fn add_output(&mut self, port: Port) {
        let bus = port.bus();
        self.clocks.set_available(bus, port.is_available());
        self.clocks.set_name(bus, port.name());
        debug!("Added MIDI output {}", port.display_name());
        self.outputs.push(port);
    }

    fn add_input(&mut self, port: Port) {
        let bus = port.bus();
        self.input_status.set_available(bus, port.is_available());
        self.input_status.set_name(bus, port.name());
        debug!("Added MIDI input {}", port.display_name());
        self.inputs.push(port);
    }

    /// Applies the persisted clock mode of `port`'s bus, saving the default if there is none.
    fn restore_clock(&mut self, port: &Port) {
        let bus = port.bus();
        let mode = self.clocks.get(bus).unwrap_or_else(|| {
            self.clocks.save(bus, ClockMode::Off);
            ClockMode::Off
        });
        port.set_clock(mode);
    }

    fn restore_input(&mut self, port: &Port) {
        let bus = port.bus();
        let enabled = self.input_status.get(bus).unwrap_or_else(|| {
            self.input_status.save(bus, true);
            true
        });
        port.set_input(enabled);
    }

    fn snapshot(&self) -> RouterSnapshot {
        RouterSnapshot {
            outputs: self.outputs.iter().map(Port::info).collect(),
            inputs: self.inputs.iter().map(Port::info).collect(),
            clocks: self.clocks.clone(),
            input_status: self.input_status.clone(),
            record_mode: self.record_mode,
        }
    }
}

pub struct PortRouter {
    inner: Mutex<RouterInner>,
    dumping: AtomicFlag,
    snapshot: ArcSwap<RouterSnapshot>,
}

impl PortRouter {
    /// Discovers and opens the backend's ports, applying the persisted status in `config`.
    ///
    /// Virtual ports take the lowest bus numbers. A port that fails to open
    /// is kept, marked unavailable.
    pub fn new(config: &SequencerConfig, backend: &dyn MidiBackend) -> Result<Self> {
        config.validate()?;
        if config.virtual_outputs > MAX_BUSES || config.virtual_inputs > MAX_BUSES {
            return Err(Error::PortLimit(MAX_BUSES));
        }

        let mut inner = RouterInner {
            outputs: Vec::new(),
            inputs: Vec::new(),
            clocks: ClockList::from_values(&config.clocks),
            input_status: InputList::from_values(&config.inputs),
            record_mode: config.record_mode,
            targets: Vec::new(),
            next_input: 0,
            ppqn: config.ppqn,
            bpm: config.bpm,
        };

        for i in 0..config.virtual_outputs {
            let (desc, io) =
                backend.create_virtual(&format!("out {}", i), PortDirection::Output, config)?;
            let bus = inner.outputs.len();
            let port = Port::new(bus, &desc, config)
                .with_bus_name(PortNaming::bus_name(config, bus))
                .with_io(io);
            inner.restore_clock(&port);
            inner.add_output(port);
        }
        for i in 0..config.virtual_inputs {
            let (desc, io) =
                backend.create_virtual(&format!("in {}", i), PortDirection::Input, config)?;
            let port = Port::new(inner.inputs.len(), &desc, config).with_io(io);
            inner.restore_input(&port);
            inner.add_input(port);
        }

        for desc in backend.enumerate()? {
            match desc.direction {
                PortDirection::Output => {
                    let bus = inner.outputs.len();
                    if bus >= MAX_BUSES {
                        warn!("Ignoring MIDI output {}: bus limit {}", desc.id, MAX_BUSES);
                        continue;
                    }
                    let port = Port::new(bus, &desc, config)
                        .with_bus_name(PortNaming::bus_name(config, bus));
                    inner.restore_clock(&port);
                    let port = Self::connect(port, &desc, config, backend);
                    inner.add_output(port);
                }
                PortDirection::Input => {
                    let bus = inner.inputs.len();
                    if bus >= MAX_BUSES {
                        warn!("Ignoring MIDI input {}: bus limit {}", desc.id, MAX_BUSES);
                        continue;
                    }
                    let port = Port::new(bus, &desc, config);
                    inner.restore_input(&port);
                    let port = Self::connect(port, &desc, config, backend);
                    inner.add_input(port);
                }
            }
        }

        debug!(
            "Port router ready on '{}': {} outputs, {} inputs",
            backend.name(),
            inner.outputs.len(),
            inner.inputs.len()
        );

        let snapshot = ArcSwap::from_pointee(inner.snapshot());
        Ok(Self {
            inner: Mutex::new(inner),
            dumping: AtomicFlag::new(false),
            snapshot,
        })
    }

    fn connect(
        port: Port,
        desc: &PortDescriptor,
        config: &SequencerConfig,
        backend: &dyn MidiBackend,
    ) -> Port {
        if !port.is_port_connectable() {
            debug!("{} left closed", port.display_name());
            return port;
        }
        match backend.open(desc, config) {
            Ok(io) => port.with_io(io),
            Err(e) => {
                warn!("{} unavailable: {}", port.display_name(), e);
                port
            }
        }
    }

    fn publish(&self, inner: &RouterInner) {
        self.snapshot.store(Arc::new(inner.snapshot()));
    }

    // Output

    pub fn play(&self, bus: usize, event: &TimedEvent, channel: u8) -> bool {
        let inner = self.inner.lock();
        inner
            .outputs
            .get(bus)
            .is_some_and(|p| p.play(event, channel))
    }

    pub fn play_and_flush(&self, bus: usize, event: &TimedEvent, channel: u8) -> bool {
        let inner = self.inner.lock();
        inner.outputs.get(bus).is_some_and(|p| {
            let sent = p.play(event, channel);
            p.flush();
            sent
        })
    }

    pub fn sysex(&self, bus: usize, event: &TimedEvent) -> bool {
        let inner = self.inner.lock();
        inner.outputs.get(bus).is_some_and(|p| p.sysex(event))
    }

    pub fn flush(&self) {
        let inner = self.inner.lock();
        for port in &inner.outputs {
            port.flush();
        }
    }

    /// Sends Start on every clocking output.
    pub fn start(&self) {
        let inner = self.inner.lock();
        for port in &inner.outputs {
            port.start();
        }
    }

    pub fn stop(&self) {
        let inner = self.inner.lock();
        for port in &inner.outputs {
            port.stop();
        }
    }

    pub fn continue_from(&self, tick: Pulse) {
        let inner = self.inner.lock();
        for port in &inner.outputs {
            port.continue_from(tick);
        }
    }

    pub fn init_clock(&self, tick: Pulse) {
        let inner = self.inner.lock();
        for port in &inner.outputs {
            port.init_clock(tick);
        }
    }

    /// Emits clock up to `tick` on every output; returns the pulses sent.
    pub fn emit_clock(&self, tick: Pulse) -> usize {
        let inner = self.inner.lock();
        inner.outputs.iter().map(|p| p.clock(tick)).sum()
    }

    /// Note-Off, velocity 0, for every note on every channel of every output
    /// except `excluded`. Returns the number of messages sent.
    pub fn panic(&self, excluded: Option<usize>) -> usize {
        let inner = self.inner.lock();
        let mut sent = 0;
        for port in inner.outputs.iter().filter(|p| Some(p.bus()) != excluded) {
            for channel in 0..PANIC_CHANNELS {
                for note in 0..PANIC_NOTES {
                    let off = TimedEvent::note_off(0, channel, note, 0);
                    if port.play(&off, channel) {
                        sent += 1;
                    }
                }
            }
            port.flush();
        }
        debug!("Panic: {} note-offs sent", sent);
        sent
    }

    // Clock and input settings

    pub fn set_clock(&self, bus: usize, mode: ClockMode) -> bool {
        let mut inner = self.inner.lock();
        let Some(port) = inner.outputs.get(bus) else {
            return false;
        };
        port.set_clock(mode);
        inner.clocks.save(bus, mode);
        self.publish(&inner);
        true
    }

    /// Live mode of the port on `bus`, else its persisted mode, else `Disabled`.
    pub fn get_clock(&self, bus: usize) -> ClockMode {
        let inner = self.inner.lock();
        inner
            .outputs
            .get(bus)
            .map(Port::clock_mode)
            .or_else(|| inner.clocks.get(bus))
            .unwrap_or(ClockMode::Disabled)
    }

    pub fn set_input(&self, bus: usize, enable: bool) -> bool {
        let mut inner = self.inner.lock();
        let Some(port) = inner.inputs.get(bus) else {
            return false;
        };
        port.set_input(enable);
        inner.input_status.save(bus, enable);
        self.publish(&inner);
        true
    }

    pub fn get_input(&self, bus: usize) -> bool {
        let inner = self.inner.lock();
        inner
            .inputs
            .get(bus)
            .map(Port::is_enabled)
            .or_else(|| inner.input_status.get(bus))
            .unwrap_or(false)
    }

    /// Records a clock mode for `bus` without touching any port.
    pub fn save_clock(&self, bus: usize, mode: ClockMode) {
        let mut inner = self.inner.lock();
        inner.clocks.save(bus, mode);
        self.publish(&inner);
    }

    pub fn save_input(&self, bus: usize, enable: bool) {
        let mut inner = self.inner.lock();
        inner.input_status.save(bus, enable);
        self.publish(&inner);
    }

    pub fn clock_list(&self) -> ClockList {
        self.inner.lock().clocks.clone()
    }

    pub fn input_list(&self) -> InputList {
        self.inner.lock().input_status.clone()
    }

    pub fn ppqn(&self) -> u32 {
        self.inner.lock().ppqn
    }

    pub fn set_ppqn(&self, ppqn: u32) -> bool {
        if !(MIN_PPQN..=MAX_PPQN).contains(&ppqn) {
            return false;
        }
        let mut inner = self.inner.lock();
        inner.ppqn = ppqn;
        for port in &inner.outputs {
            port.set_ppqn(ppqn);
        }
        true
    }

    pub fn bpm(&self) -> f64 {
        self.inner.lock().bpm
    }

    pub fn set_bpm(&self, bpm: f64) -> bool {
        if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            return false;
        }
        let mut inner = self.inner.lock();
        inner.bpm = bpm;
        for port in &inner.outputs {
            port.set_bpm(bpm);
        }
        true
    }

    // Backend churn

    /// The backend reports `client:port` gone. Persisted settings are kept.
    pub fn port_exit(&self, client: u32, port: u32) -> bool {
        let id = PortId::new(client, port);
        let mut inner = self.inner.lock();
        let RouterInner {
            outputs,
            inputs,
            clocks,
            input_status,
            ..
        } = &mut *inner;

        let mut found = false;
        for p in outputs.iter().filter(|p| p.id() == id) {
            p.mark_unavailable();
            clocks.set_available(p.bus(), false);
            debug!("MIDI output exited: {}", p.display_name());
            found = true;
        }
        for p in inputs.iter().filter(|p| p.id() == id) {
            p.mark_unavailable();
            input_status.set_available(p.bus(), false);
            debug!("MIDI input exited: {}", p.display_name());
            found = true;
        }
        if found {
            self.publish(&inner);
        }
        found
    }

    // Input

    /// Frames waiting across all enabled inputs.
    pub fn poll_for_midi(&self) -> usize {
        let inner = self.inner.lock();
        inner.inputs.iter().map(Port::pending_input).sum()
    }

    /// Next received event, taking inputs in turn. Active Sense and Reset are skipped.
    pub fn get_midi_event(&self) -> Option<InboundEvent> {
        let mut inner = self.inner.lock();
        let count = inner.inputs.len();
        for step in 0..count {
            let bus = (inner.next_input + step) % count;
            while let Some(frame) = inner.inputs[bus].poll_input() {
                match TimedEvent::from_bytes(0, &frame.bytes, ByteContext::Live) {
                    Ok(event) if event.is_sense_or_reset() => continue,
                    Ok(event) => {
                        inner.next_input = (bus + 1) % count;
                        return Some(InboundEvent {
                            bus,
                            delta_us: frame.delta_us,
                            event,
                        });
                    }
                    Err(e) => warn!(
                        "{}: undecodable input {:02X?}: {}",
                        inner.inputs[bus].display_name(),
                        frame.bytes.as_slice(),
                        e
                    ),
                }
            }
        }
        None
    }

    // Recording

    /// Arms (`state == true`) or disarms `target` for recording.
    ///
    /// In single mode a second distinct target is refused and `false` is
    /// returned. Disarming with `None` clears every armed target.
    pub fn set_sequence_input(&self, state: bool, target: Option<Arc<dyn RecordTarget>>) -> bool {
        let mut inner = self.inner.lock();
        let result = match inner.record_mode {
            RecordMode::Single => match (state, target) {
                (true, Some(target)) => match inner.targets.first() {
                    Some(armed) if armed.target_id() != target.target_id() => {
                        debug!(
                            "Record target {} refused: {} already armed",
                            target.target_id(),
                            armed.target_id()
                        );
                        false
                    }
                    Some(_) => true,
                    None => {
                        inner.targets.push(target);
                        true
                    }
                },
                (true, None) => false,
                (false, _) => {
                    inner.targets.clear();
                    true
                }
            },
            RecordMode::ByChannel | RecordMode::ByBuss => match target {
                Some(target) => {
                    let id = target.target_id();
                    if state {
                        if !inner.targets.iter().any(|t| t.target_id() == id) {
                            inner.targets.push(target);
                        }
                    } else {
                        inner.targets.retain(|t| t.target_id() != id);
                    }
                    true
                }
                None if !state => {
                    inner.targets.clear();
                    true
                }
                None => false,
            },
        };
        self.dumping.set(!inner.targets.is_empty());
        result
    }

    /// Fans `event` out to the armed targets. Returns true if any accepted it.
    pub fn dump_input(&self, event: &InboundEvent) -> bool {
        if !self.dumping.get() {
            return false;
        }
        let (mode, targets) = {
            let inner = self.inner.lock();
            let targets: SmallVec<[Arc<dyn RecordTarget>; 4]> =
                inner.targets.iter().cloned().collect();
            (inner.record_mode, targets)
        };

        match mode {
            RecordMode::Single => targets.first().is_some_and(|t| t.deliver(event)),
            RecordMode::ByChannel => {
                let channel = event.event.channel();
                let mut accepted = false;
                for target in &targets {
                    let wanted = target.record_channel();
                    if wanted.is_some() && wanted != channel {
                        continue;
                    }
                    if target.deliver(event) {
                        accepted = true;
                        if wanted.is_some() {
                            break;
                        }
                    }
                }
                accepted
            }
            RecordMode::ByBuss => {
                let mut accepted = false;
                for target in targets
                    .iter()
                    .filter(|t| t.record_bus().map_or(true, |b| b == event.bus))
                {
                    accepted |= target.deliver(event);
                }
                accepted
            }
        }
    }

    pub fn is_dumping(&self) -> bool {
        self.dumping.get()
    }

    pub fn record_mode(&self) -> RecordMode {
        self.inner.lock().record_mode
    }

    /// Switches the fan-out mode. Armed targets are disarmed.
    pub fn set_record_mode(&self, mode: RecordMode) {
        let mut inner = self.inner.lock();
        if inner.record_mode != mode {
            inner.targets.clear();
            self.dumping.set(false);
        }
        inner.record_mode = mode;
        self.publish(&inner);
    }

    // Info

    pub fn output_count(&self) -> usize {
        self.inner.lock().outputs.len()
    }

    pub fn input_count(&self) -> usize {
        self.inner.lock().inputs.len()
    }

    pub fn output_port_info(&self) -> Vec<PortInfo> {
        self.inner.lock().outputs.iter().map(Port::info).collect()
    }

    pub fn input_port_info(&self) -> Vec<PortInfo> {
        self.inner.lock().inputs.iter().map(Port::info).collect()
    }

    /// Status as of the last change, without taking the router lock.
    pub fn snapshot(&self) -> Arc<RouterSnapshot> {
        self.snapshot.load_full()
    }

    /// Bridge counters summed over every port that has them.
    pub fn bridge_stats(&self) -> BridgeStatsSnapshot {
        let inner = self.inner.lock();
        inner
            .outputs
            .iter()
            .chain(inner.inputs.iter())
            .filter_map(Port::stats)
            .fold(BridgeStatsSnapshot::default(), |acc, s| acc + s)
    }

    pub fn close_all(&self) {
        let inner = self.inner.lock();
        for port in inner.outputs.iter().chain(inner.inputs.iter()) {
            port.close();
        }
        self.publish(&inner);
    }
}

impl std::fmt::Debug for PortRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("PortRouter")
            .field("outputs", &inner.outputs.len())
            .field("inputs", &inner.inputs.len())
            .field("record_mode", &inner.record_mode)
            .field("dumping", &self.dumping.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use sequin_midi::status;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Sink {
        id: u64,
        channel: Option<u8>,
        bus: Option<usize>,
        got: AtomicUsize,
    }

    impl Sink {
        fn new(id: u64) -> Arc<Self> {
            Arc::new(Self {
                id,
                channel: None,
                bus: None,
                got: AtomicUsize::new(0),
            })
        }

        fn on_channel(id: u64, channel: u8) -> Arc<Self> {
            Arc::new(Self {
                id,
                channel: Some(channel),
                bus: None,
                got: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.got.load(Ordering::SeqCst)
        }
    }

    impl RecordTarget for Sink {
        fn target_id(&self) -> u64 {
            self.id
        }

        fn record_channel(&self) -> Option<u8> {
            self.channel
        }

        fn record_bus(&self) -> Option<usize> {
            self.bus
        }

        fn deliver(&self, _event: &InboundEvent) -> bool {
            self.got.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn config() -> SequencerConfig {
        SequencerConfig::default().with_backend("memory")
    }

    fn inbound(channel: u8) -> InboundEvent {
        InboundEvent {
            bus: 0,
            delta_us: 0,
            event: TimedEvent::note_on(0, channel, 60, 100),
        }
    }

    #[test]
    fn test_discovers_and_opens_ports() {
        let backend = MemoryBackend::new().with_outputs(2).with_inputs(1);
        let router = PortRouter::new(&config(), &backend).unwrap();

        assert_eq!(router.output_count(), 2);
        assert_eq!(router.input_count(), 1);
        assert!(router.output_port_info().iter().all(|p| p.available && p.enabled));
        assert_eq!(router.clock_list().values(), vec![ClockMode::Off, ClockMode::Off]);
        assert_eq!(router.input_list().values(), vec![true]);
    }

    #[test]
    fn test_disabled_port_not_opened() {
        let backend = MemoryBackend::new().with_outputs(2);
        let cfg = SequencerConfig {
            clocks: vec![ClockMode::Disabled],
            ..config()
        };
        let router = PortRouter::new(&cfg, &backend).unwrap();
        let info = router.output_port_info();
        assert!(!info[0].available);
        assert!(!info[0].enabled);
        assert!(info[1].available);
    }

    #[test]
    fn test_open_failure_leaves_port_unavailable() {
        let backend = MemoryBackend::new();
        let id = backend.add_output("flaky");
        backend.fail_open(id);
        let router = PortRouter::new(&config(), &backend).unwrap();
        assert_eq!(router.output_count(), 1);
        assert!(!router.output_port_info()[0].available);
        assert!(!router.play(0, &TimedEvent::note_on(0, 0, 60, 1), 0));
    }

    #[test]
    fn test_virtual_port_limit() {
        let cfg = config().with_virtual_ports(MAX_BUSES + 1, 0);
        let err = PortRouter::new(&cfg, &MemoryBackend::new()).err().unwrap();
        assert!(matches!(err, Error::PortLimit(MAX_BUSES)));
    }

    #[test]
    fn test_transport_only_on_clocking_ports() {
        let backend = MemoryBackend::new().with_outputs(2);
        let router = PortRouter::new(&config(), &backend).unwrap();
        assert!(router.set_clock(1, ClockMode::On));

        router.start();
        router.stop();
        let ports = backend.enumerate().unwrap();
        assert!(backend.sent_to(ports[0].id).is_empty());
        assert_eq!(
            backend.sent_to(ports[1].id),
            vec![vec![status::START], vec![status::STOP]]
        );
    }

    #[test]
    fn test_single_mode_first_writer_wins() {
        let router = PortRouter::new(&config(), &MemoryBackend::new()).unwrap();
        let a = Sink::new(1);
        let b = Sink::new(2);

        assert!(router.set_sequence_input(true, Some(a.clone())));
        assert!(router.set_sequence_input(true, Some(a.clone())));
        assert!(!router.set_sequence_input(true, Some(b.clone())));
        assert!(router.is_dumping());

        assert!(router.dump_input(&inbound(0)));
        assert_eq!(a.count(), 1);
        assert_eq!(b.count(), 0);

        assert!(router.set_sequence_input(false, None));
        assert!(!router.is_dumping());
        assert!(router.set_sequence_input(true, Some(b.clone())));
    }

    #[test]
    fn test_by_channel_stops_at_first_match() {
        let router = PortRouter::new(
            &config().with_record_mode(RecordMode::ByChannel),
            &MemoryBackend::new(),
        )
        .unwrap();
        let ch2 = Sink::on_channel(1, 2);
        let ch2_again = Sink::on_channel(2, 2);
        let ch5 = Sink::on_channel(3, 5);
        for t in [&ch2, &ch2_again, &ch5] {
            assert!(router.set_sequence_input(true, Some(t.clone())));
        }

        assert!(router.dump_input(&inbound(2)));
        assert_eq!((ch2.count(), ch2_again.count(), ch5.count()), (1, 0, 0));

        assert!(router.dump_input(&inbound(5)));
        assert_eq!(ch5.count(), 1);

        assert!(!router.dump_input(&inbound(9)));
    }

    #[test]
    fn test_by_buss_reaches_everyone() {
        let router = PortRouter::new(
            &config().with_record_mode(RecordMode::ByBuss),
            &MemoryBackend::new(),
        )
        .unwrap();
        let a = Sink::new(1);
        let b = Sink::on_channel(2, 7);
        router.set_sequence_input(true, Some(a.clone()));
        router.set_sequence_input(true, Some(b.clone()));

        assert!(router.dump_input(&inbound(0)));
        assert_eq!((a.count(), b.count()), (1, 1));

        router.set_sequence_input(false, Some(a.clone()));
        router.dump_input(&inbound(0));
        assert_eq!((a.count(), b.count()), (1, 2));
    }

    #[test]
    fn test_switching_record_mode_disarms() {
        let router = PortRouter::new(&config(), &MemoryBackend::new()).unwrap();
        router.set_sequence_input(true, Some(Sink::new(1)));
        router.set_record_mode(RecordMode::ByChannel);
        assert!(!router.is_dumping());
        assert_eq!(router.snapshot().record_mode, RecordMode::ByChannel);
    }

    #[test]
    fn test_get_midi_event_round_robin() {
        let backend = MemoryBackend::new().with_inputs(2);
        let router = PortRouter::new(&config(), &backend).unwrap();
        let ids: Vec<_> = backend.enumerate().unwrap().iter().map(|d| d.id).collect();

        backend.feed(ids[0], 0, &[0x90, 60, 100]);
        backend.feed(ids[0], 10, &[0xFE]);
        backend.feed(ids[0], 10, &[0x80, 60, 0]);
        backend.feed(ids[1], 0, &[0x91, 64, 90]);
        assert_eq!(router.poll_for_midi(), 4);

        let first = router.get_midi_event().unwrap();
        let second = router.get_midi_event().unwrap();
        let third = router.get_midi_event().unwrap();
        assert_eq!((first.bus, second.bus, third.bus), (0, 1, 0));
        assert!(third.event.is_note_off());
        assert!(router.get_midi_event().is_none());
    }

    #[test]
    fn test_disabled_input_discards() {
        let backend = MemoryBackend::new().with_inputs(1);
        let router = PortRouter::new(&config(), &backend).unwrap();
        let id = backend.enumerate().unwrap()[0].id;
        assert!(router.set_input(0, false));
        backend.feed(id, 0, &[0x90, 60, 100]);
        assert!(router.get_midi_event().is_none());
        assert!(!router.get_input(0));
    }

    #[test]
    fn test_port_exit_keeps_settings() {
        let backend = MemoryBackend::new().with_outputs(1);
        let router = PortRouter::new(&config(), &backend).unwrap();
        router.set_clock(0, ClockMode::Pos);
        let id = backend.enumerate().unwrap()[0].id;

        assert!(router.port_exit(id.client, id.port));
        assert!(!router.output_port_info()[0].available);
        assert_eq!(router.clock_list().get(0), Some(ClockMode::Pos));
        assert!(!router.snapshot().clocks.entry(0).unwrap().available);
        assert!(!router.port_exit(99, 99));
    }

    #[test]
    fn test_tempo_bounds() {
        let router = PortRouter::new(&config(), &MemoryBackend::new()).unwrap();
        assert!(router.set_bpm(140.0));
        assert!(!router.set_bpm(0.5));
        assert_eq!(router.bpm(), 140.0);
        assert!(!router.set_ppqn(1));
        assert!(router.set_ppqn(96));
        assert_eq!(router.ppqn(), 96);
    }
}
