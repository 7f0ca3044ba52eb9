//! Sequencer configuration context.
//!
//! One [`SequencerConfig`] is built at startup and passed by reference into
//! the port router, which threads the relevant values down to each port.
//! Nothing in the transport layer reads configuration from globals.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PPQN: u32 = 192;
pub const DEFAULT_BPM: f64 = 120.0;
/// Modulo-sync interval in 16th notes (four measures of 4/4).
pub const DEFAULT_CLOCK_MOD: u32 = 64;

pub const MIN_PPQN: u32 = 32;
pub const MAX_PPQN: u32 = 19200;
pub const MIN_BPM: f64 = 2.0;
pub const MAX_BPM: f64 = 600.0;

/// Clock-generation policy of an output port.
///
/// `Disabled` ports are not used at all; `Off` ports play events but never
/// emit realtime clock; the remaining three emit MIDI clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ClockMode {
    Disabled,
    #[default]
    Off,
    /// Free-running: clock starts from wherever playback starts.
    On,
    /// Position-aware: sends Song Position + Continue when starting mid-song.
    Pos,
    /// Modulo-synced: clock starts on the next `clock_mod` boundary.
    Mod,
}

impl ClockMode {
    /// True for the modes that emit realtime clock pulses.
    #[inline]
    pub fn is_clocking(self) -> bool {
        matches!(self, ClockMode::On | ClockMode::Pos | ClockMode::Mod)
    }

    /// True unless the port is disabled outright.
    #[inline]
    pub fn is_port_enabled(self) -> bool {
        self != ClockMode::Disabled
    }
}

/// How recorded input is distributed to target patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecordMode {
    /// One armed target at a time; first writer wins.
    #[default]
    Single,
    /// Candidates are matched against the event channel.
    ByChannel,
    /// Every armed target receives every event.
    ByBuss,
}

/// Configuration for the sequencer transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub client_name: String,
    /// Registry key of the backend to use (`"midir"`, `"bridge"`, `"memory"`).
    pub backend: String,
    pub ppqn: u32,
    pub bpm: f64,
    pub clock_mod: u32,
    pub link_wraparound: bool,
    pub record_mode: RecordMode,
    /// Persisted clock mode per logical output bus.
    pub clocks: Vec<ClockMode>,
    /// Persisted enabled flag per logical input bus.
    pub inputs: Vec<bool>,
    /// User display names per output bus.
    pub bus_names: Vec<String>,
    pub virtual_outputs: usize,
    pub virtual_inputs: usize,
    pub init_disabled_ports: bool,
    /// Real-time priority requested by dedicated I/O threads, `None` to stay normal.
    pub io_thread_priority: Option<u8>,
    pub poll_sleep_us: u64,
    pub ring_buffer_size: usize,
    pub input_queue_size: usize,
    pub max_ex_data_len: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            client_name: "sequin".to_string(),
            backend: "midir".to_string(),
            ppqn: DEFAULT_PPQN,
            bpm: DEFAULT_BPM,
            clock_mod: DEFAULT_CLOCK_MOD,
            link_wraparound: false,
            record_mode: RecordMode::Single,
            clocks: Vec::new(),
            inputs: Vec::new(),
            bus_names: Vec::new(),
            virtual_outputs: 0,
            virtual_inputs: 0,
            init_disabled_ports: false,
            io_thread_priority: Some(1),
            poll_sleep_us: 1000,
            ring_buffer_size: 16384,
            input_queue_size: 4096,
            max_ex_data_len: 65536,
        }
    }
}

impl SequencerConfig {
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn with_ppqn(mut self, ppqn: u32) -> Self {
        self.ppqn = ppqn;
        self
    }

    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.bpm = bpm;
        self
    }

    pub fn with_clock_mod(mut self, clock_mod: u32) -> Self {
        self.clock_mod = clock_mod;
        self
    }

    pub fn with_record_mode(mut self, mode: RecordMode) -> Self {
        self.record_mode = mode;
        self
    }

    pub fn with_link_wraparound(mut self, wrap: bool) -> Self {
        self.link_wraparound = wrap;
        self
    }

    pub fn with_virtual_ports(mut self, outputs: usize, inputs: usize) -> Self {
        self.virtual_outputs = outputs;
        self.virtual_inputs = inputs;
        self
    }

    pub fn with_io_thread_priority(mut self, priority: Option<u8>) -> Self {
        self.io_thread_priority = priority;
        self
    }

    /// User-assigned display name for a bus, if any.
    pub fn bus_name(&self, bus: usize) -> Option<&str> {
        self.bus_names
            .get(bus)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_PPQN..=MAX_PPQN).contains(&self.ppqn) {
            return Err(Error::InvalidPpqn(self.ppqn));
        }
        if !(MIN_BPM..=MAX_BPM).contains(&self.bpm) {
            return Err(Error::InvalidTempo(self.bpm));
        }
        if self.clock_mod == 0 {
            return Err(Error::InvalidConfig(
                "clock_mod must be at least one 16th note".to_string(),
            ));
        }
        if self.ring_buffer_size < 64 {
            return Err(Error::InvalidConfig(format!(
                "ring_buffer_size {} too small (minimum 64 bytes)",
                self.ring_buffer_size
            )));
        }
        if self.input_queue_size < 64 {
            return Err(Error::InvalidConfig(format!(
                "input_queue_size {} too small (minimum 64 bytes)",
                self.input_queue_size
            )));
        }
        if self.backend.is_empty() {
            return Err(Error::InvalidConfig("backend name is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SequencerConfig::default();
        assert_eq!(config.ppqn, 192);
        assert_eq!(config.bpm, 120.0);
        assert_eq!(config.clock_mod, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_ppqn() {
        let config = SequencerConfig::default().with_ppqn(8);
        assert!(matches!(config.validate(), Err(Error::InvalidPpqn(8))));
    }

    #[test]
    fn test_invalid_tempo() {
        let config = SequencerConfig::default().with_bpm(1000.0);
        assert!(matches!(config.validate(), Err(Error::InvalidTempo(_))));
    }

    #[test]
    fn test_zero_clock_mod_rejected() {
        let config = SequencerConfig::default().with_clock_mod(0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_clock_mode_predicates() {
        assert!(!ClockMode::Disabled.is_clocking());
        assert!(!ClockMode::Off.is_clocking());
        assert!(ClockMode::On.is_clocking());
        assert!(ClockMode::Pos.is_clocking());
        assert!(ClockMode::Mod.is_clocking());
        assert!(!ClockMode::Disabled.is_port_enabled());
        assert!(ClockMode::Off.is_port_enabled());
    }

    #[test]
    fn test_bus_names() {
        let mut config = SequencerConfig::default();
        config.bus_names = vec!["Synth".to_string(), String::new()];

        assert_eq!(config.bus_name(0), Some("Synth"));
        assert_eq!(config.bus_name(1), None);
    }

    #[test]
    fn test_config_survives_serialization() {
        let config = SequencerConfig::default()
            .with_record_mode(RecordMode::ByChannel)
            .with_virtual_ports(2, 1);
        let bytes = bincode::serialize(&config).unwrap();
        let back: SequencerConfig = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, config);
    }
}
