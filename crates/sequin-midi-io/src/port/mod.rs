//! MIDI ports: one endpoint of a backend, with its clock generator.

mod clock;
mod midi_port;

pub use clock::{song_position_bytes, ClockState, BEFORE_START, CLOCKS_PER_QUARTER};
pub use midi_port::Port;

use sequin_core::ClockMode;
use serde::{Deserialize, Serialize};

/// Backend-assigned identity of an endpoint: two small integers whose exact
/// meaning depends on the backend (client/port, device index, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PortId {
    pub client: u32,
    pub port: u32,
}

impl PortId {
    pub const fn new(client: u32, port: u32) -> Self {
        Self { client, port }
    }
}

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.client, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PortKind {
    /// An endpoint discovered through the backend.
    #[default]
    Normal,
    /// Created by this application; never connected by the backend.
    Virtual,
    /// Reserved by the backend itself (announce/timer ports). Inputs stay enabled.
    System,
}

/// What a backend reports about one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    pub id: PortId,
    pub client_name: String,
    pub port_name: String,
    pub direction: PortDirection,
    pub kind: PortKind,
}

impl PortDescriptor {
    pub fn new(
        id: PortId,
        client_name: impl Into<String>,
        port_name: impl Into<String>,
        direction: PortDirection,
    ) -> Self {
        Self {
            id,
            client_name: client_name.into(),
            port_name: port_name.into(),
            direction,
            kind: PortKind::Normal,
        }
    }

    pub fn with_kind(mut self, kind: PortKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Read-only snapshot of a port for status displays and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortInfo {
    pub bus: usize,
    pub id: PortId,
    pub display_name: String,
    pub connect_name: String,
    pub direction: PortDirection,
    pub kind: PortKind,
    pub clock: ClockMode,
    pub enabled: bool,
    pub available: bool,
}
