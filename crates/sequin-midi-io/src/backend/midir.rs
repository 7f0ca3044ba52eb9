//! Hardware MIDI through midir.
//!
//! midir exposes plain device lists, so endpoints are identified by their
//! position in the list: client 0 for outputs, 1 for inputs. Opening looks
//! the device up again by name, since indices shift as devices come and go.

use super::{MidiBackend, PortIo};
use crate::bridge::{input_queue, BridgeStatsSnapshot, InputFrame, InputQueue, RtInput};
use crate::port::{PortDescriptor, PortDirection, PortId, PortKind};
use crate::{Error, Result};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use sequin_core::SequencerConfig;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

const OUTPUT_CLIENT: u32 = 0;
const INPUT_CLIENT: u32 = 1;
const VIRTUAL_CLIENT: u32 = 2;

pub struct MidirBackend {
    client_name: String,
    next_virtual: AtomicU32,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            next_virtual: AtomicU32::new(0),
        }
    }

    fn open_output(&self, desc: &PortDescriptor) -> Result<MidiOutputConnection> {
        let output = MidiOutput::new(&self.client_name)?;
        let ports = output.ports();
        let port = ports
            .iter()
            .find(|p| output.port_name(p).is_ok_and(|n| n == desc.port_name))
            .ok_or_else(|| {
                Error::MidiDevice(format!("MIDI output device '{}' not found", desc.port_name))
            })?;
        Ok(output.connect(port, &format!("{} out", self.client_name))?)
    }

    fn open_input(
        &self,
        desc: &PortDescriptor,
        rt: RtInput,
    ) -> Result<MidiInputConnection<RtInput>> {
        let mut input = MidiInput::new(&self.client_name)?;
        input.ignore(Ignore::None);
        let ports = input.ports();
        let port = ports
            .iter()
            .find(|p| input.port_name(p).is_ok_and(|n| n == desc.port_name))
            .ok_or_else(|| {
                Error::MidiDevice(format!("MIDI input device '{}' not found", desc.port_name))
            })?
            .clone();
        Ok(input.connect(
            &port,
            &format!("{} in", self.client_name),
            |stamp, bytes, rt: &mut RtInput| {
                rt.push(stamp, bytes);
            },
            rt,
        )?)
    }
}

impl MidiBackend for MidirBackend {
    fn name(&self) -> &str {
        "midir"
    }

    fn enumerate(&self) -> Result<Vec<PortDescriptor>> {
        let mut found = Vec::new();

        let output = MidiOutput::new(&self.client_name)?;
        for (index, port) in output.ports().iter().enumerate() {
            let name = output
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {}", index));
            found.push(PortDescriptor::new(
                PortId::new(OUTPUT_CLIENT, index as u32),
                "midir",
                name,
                PortDirection::Output,
            ));
        }

        let input = MidiInput::new(&self.client_name)?;
        for (index, port) in input.ports().iter().enumerate() {
            let name = input
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {}", index));
            found.push(PortDescriptor::new(
                PortId::new(INPUT_CLIENT, index as u32),
                "midir",
                name,
                PortDirection::Input,
            ));
        }

        debug!("midir reports {} endpoints", found.len());
        Ok(found)
    }

    fn open(&self, port: &PortDescriptor, config: &SequencerConfig) -> Result<Box<dyn PortIo>> {
        match port.direction {
            PortDirection::Output => {
                let conn = self.open_output(port)?;
                debug!("Connected MIDI output {}: {}", port.id, port.port_name);
                Ok(Box::new(MidirOutputIo { conn: Some(conn) }))
            }
            PortDirection::Input => {
                let (rt, queue) = input_queue(config.input_queue_size);
                let conn = self.open_input(port, rt)?;
                debug!("Connected MIDI input {}: {}", port.id, port.port_name);
                Ok(Box::new(MidirInputIo {
                    conn: Some(conn),
                    queue,
                }))
            }
        }
    }

    #[cfg(unix)]
    fn create_virtual(
        &self,
        name: &str,
        direction: PortDirection,
        config: &SequencerConfig,
    ) -> Result<(PortDescriptor, Box<dyn PortIo>)> {
        use midir::os::unix::{VirtualInput, VirtualOutput};

        let index = self.next_virtual.fetch_add(1, Ordering::Relaxed);
        let id = PortId::new(VIRTUAL_CLIENT, index);
        let desc = PortDescriptor::new(id, config.client_name.as_str(), name, direction)
            .with_kind(PortKind::Virtual);

        let io: Box<dyn PortIo> = match direction {
            PortDirection::Output => {
                let conn = MidiOutput::new(&self.client_name)?.create_virtual(name)?;
                Box::new(MidirOutputIo { conn: Some(conn) })
            }
            PortDirection::Input => {
                let (rt, queue) = input_queue(config.input_queue_size);
                let mut input = MidiInput::new(&self.client_name)?;
                input.ignore(Ignore::None);
                let conn = input.create_virtual(
                    name,
                    |stamp, bytes, rt: &mut RtInput| {
                        rt.push(stamp, bytes);
                    },
                    rt,
                )?;
                Box::new(MidirInputIo {
                    conn: Some(conn),
                    queue,
                })
            }
        };
        debug!("Created virtual MIDI port {}: {}", id, name);
        Ok((desc, io))
    }

    #[cfg(not(unix))]
    fn create_virtual(
        &self,
        name: &str,
        _direction: PortDirection,
        _config: &SequencerConfig,
    ) -> Result<(PortDescriptor, Box<dyn PortIo>)> {
        Err(Error::Backend(format!(
            "virtual port '{}' not supported on this platform",
            name
        )))
    }
}

struct MidirOutputIo {
    conn: Option<MidiOutputConnection>,
}

impl PortIo for MidirOutputIo {
    fn send(&mut self, bytes: &[u8]) -> bool {
        match self.conn.as_mut() {
            Some(conn) => match conn.send(bytes) {
                Ok(()) => true,
                Err(e) => {
                    debug!("MIDI send failed: {}", e);
                    false
                }
            },
            None => false,
        }
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
        }
    }
}

struct MidirInputIo {
    conn: Option<MidiInputConnection<RtInput>>,
    queue: InputQueue,
}

impl PortIo for MidirInputIo {
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

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
        }
    }
}
