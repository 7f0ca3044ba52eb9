//! Timed MIDI events as stored in a pattern.
//!
//! A [`TimedEvent`] keeps the status byte with the channel nibble stripped
//! and the channel in a separate byte. For meta events that channel byte
//! holds the meta sub-type instead.

use crate::status::{self, meta};
use crate::{Error, EventRef, Result};
use midi_msg::MidiMsg;
use sequin_core::Pulse;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Sanity limit for SysEx and meta payloads built by the constructors.
pub const MAX_EX_DATA_LEN: usize = 65536;

/// Encoded bytes of one event. Short messages stay inline.
pub type WireBytes = SmallVec<[u8; 4]>;

/// Where the bytes of an event came from.
///
/// `0xFF` means "meta event" in a stored stream and "reset" on the wire;
/// the byte alone cannot tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ByteContext {
    #[default]
    Stored,
    Live,
}

/// Decoded Time Signature meta payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    /// Actual note value (4 = quarter), not the stored power of two.
    pub denominator: u32,
    pub clocks_per_metronome: u8,
    pub thirty_seconds_per_quarter: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    timestamp: Pulse,
    status: u8,
    channel: u8,
    data: [u8; 2],
    ex_data: Vec<u8>,
    #[serde(skip)]
    link: Option<EventRef>,
    selected: bool,
    marked: bool,
    painted: bool,
    context: ByteContext,
}

/// Converts beats per minute to the microseconds-per-quarter value of Set Tempo.
pub fn tempo_us_from_bpm(bpm: f64) -> u32 {
    if bpm <= 0.0 {
        return 0x00FF_FFFF;
    }
    ((60_000_000.0 / bpm).round() as u32).min(0x00FF_FFFF)
}

pub fn bpm_from_tempo_us(us: u32) -> f64 {
    if us == 0 {
        0.0
    } else {
        60_000_000.0 / us as f64
    }
}

/// Reads a variable-length quantity, returning `(value, bytes consumed)`.
pub fn read_vlq(bytes: &[u8]) -> Option<(usize, usize)> {
    let mut value = 0usize;
    for (i, &b) in bytes.iter().enumerate().take(4) {
        value = (value << 7) | (b & 0x7F) as usize;
        if b & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

pub fn write_vlq(mut value: usize, out: &mut WireBytes) {
    let mut buf = [0u8; 5];
    let mut n = 0;
    loop {
        buf[n] = (value & 0x7F) as u8;
        value >>= 7;
        n += 1;
        if value == 0 || n == buf.len() {
            break;
        }
    }
    for i in (0..n).rev() {
        let cont = if i > 0 { 0x80 } else { 0x00 };
        out.push(buf[i] | cont);
    }
}

fn check_len(len: usize) -> Result<()> {
    if len > MAX_EX_DATA_LEN {
        tracing::warn!(
            "Rejecting {}-byte payload (limit {})",
            len,
            MAX_EX_DATA_LEN
        );
        return Err(Error::PayloadTooLarge {
            len,
            limit: MAX_EX_DATA_LEN,
        });
    }
    Ok(())
}

impl TimedEvent {
    fn short(timestamp: Pulse, status: u8, d0: u8, d1: u8, context: ByteContext) -> Self {
        let (status, channel) = if status::is_channel_msg(status) {
            let kind = status & status::STATUS_MASK;
            let kind = if Self::is_note_off_recorded(kind, d1) {
                status::NOTE_OFF
            } else {
                kind
            };
            (kind, status & status::CHANNEL_MASK)
        } else {
            (status, status::NO_CHANNEL)
        };
        Self {
            timestamp,
            status,
            channel,
            data: [d0 & 0x7F, d1 & 0x7F],
            ex_data: Vec::new(),
            link: None,
            selected: false,
            marked: false,
            painted: false,
            context,
        }
    }

    /// Builds a short message from a full status byte (channel included).
    pub fn new(timestamp: Pulse, status: u8, d0: u8, d1: u8) -> Self {
        Self::short(timestamp, status, d0, d1, ByteContext::Stored)
    }

    /// Decodes one complete message.
    ///
    /// In [`ByteContext::Stored`] a leading `0xFF` is parsed as
    /// `FF type VLQ-length payload`; in [`ByteContext::Live`] it is a Reset.
    pub fn from_bytes(timestamp: Pulse, bytes: &[u8], context: ByteContext) -> Result<Self> {
        let Some(&first) = bytes.first() else {
            return Err(Error::Truncated {
                expected: 1,
                got: 0,
            });
        };
        if !status::is_status(first) {
            return Err(Error::InvalidStatus(first));
        }

        match first {
            status::SYSEX => {
                let mut ev = Self::sysex(timestamp, bytes)?;
                ev.context = context;
                Ok(ev)
            }
            status::META if context == ByteContext::Stored => {
                if bytes.len() < 3 {
                    return Err(Error::Truncated {
                        expected: 3,
                        got: bytes.len(),
                    });
                }
                let (len, used) = read_vlq(&bytes[2..]).ok_or(Error::Truncated {
                    expected: bytes.len() + 1,
                    got: bytes.len(),
                })?;
                let payload = &bytes[2 + used..];
                if payload.len() < len {
                    return Err(Error::Truncated {
                        expected: 2 + used + len,
                        got: bytes.len(),
                    });
                }
                Self::meta(timestamp, bytes[1], &payload[..len])
            }
            s => {
                let need = status::message_len(s).ok_or(Error::InvalidStatus(s))?;
                if bytes.len() < need {
                    return Err(Error::Truncated {
                        expected: need,
                        got: bytes.len(),
                    });
                }
                let d0 = if need > 1 { bytes[1] } else { 0 };
                let d1 = if need > 2 { bytes[2] } else { 0 };
                Ok(Self::short(timestamp, s, d0, d1, context))
            }
        }
    }

    pub fn note_on(timestamp: Pulse, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(timestamp, status::NOTE_ON | (channel & 0x0F), note, velocity)
    }

    pub fn note_off(timestamp: Pulse, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(timestamp, status::NOTE_OFF | (channel & 0x0F), note, velocity)
    }

    pub fn control_change(timestamp: Pulse, channel: u8, control: u8, value: u8) -> Self {
        Self::new(
            timestamp,
            status::CONTROL_CHANGE | (channel & 0x0F),
            control,
            value,
        )
    }

    pub fn program_change(timestamp: Pulse, channel: u8, program: u8) -> Self {
        Self::new(timestamp, status::PROGRAM_CHANGE | (channel & 0x0F), program, 0)
    }

    /// `bend` is the 14-bit value, 0x2000 being center.
    pub fn pitch_bend(timestamp: Pulse, channel: u8, bend: u16) -> Self {
        Self::new(
            timestamp,
            status::PITCH_WHEEL | (channel & 0x0F),
            (bend & 0x7F) as u8,
            ((bend >> 7) & 0x7F) as u8,
        )
    }

    /// System realtime byte (0xF8..=0xFF), taken as received live.
    pub fn realtime(timestamp: Pulse, byte: u8) -> Result<Self> {
        if !status::is_realtime(byte) {
            return Err(Error::InvalidStatus(byte));
        }
        Ok(Self::short(timestamp, byte, 0, 0, ByteContext::Live))
    }

    /// Complete SysEx message, `0xF0` through `0xF7`.
    pub fn sysex(timestamp: Pulse, bytes: &[u8]) -> Result<Self> {
        match bytes.first() {
            Some(&status::SYSEX) => {}
            Some(&b) => return Err(Error::InvalidStatus(b)),
            None => {
                return Err(Error::Truncated {
                    expected: 1,
                    got: 0,
                })
            }
        }
        check_len(bytes.len())?;
        let mut ev = Self::short(timestamp, status::SYSEX, 0, 0, ByteContext::Stored);
        ev.ex_data = bytes.to_vec();
        Ok(ev)
    }

    pub fn meta(timestamp: Pulse, meta_type: u8, payload: &[u8]) -> Result<Self> {
        check_len(payload.len())?;
        let mut ev = Self::short(timestamp, status::META, 0, 0, ByteContext::Stored);
        ev.channel = meta_type & 0x7F;
        ev.ex_data = payload.to_vec();
        Ok(ev)
    }

    /// Set Tempo meta event for the given BPM.
    pub fn tempo(timestamp: Pulse, bpm: f64) -> Self {
        let us = tempo_us_from_bpm(bpm);
        let mut ev = Self::short(timestamp, status::META, 0, 0, ByteContext::Stored);
        ev.channel = meta::SET_TEMPO;
        ev.ex_data = vec![(us >> 16) as u8, (us >> 8) as u8, us as u8];
        ev
    }

    /// Time Signature meta event; `denominator` is the note value (4, 8, ...).
    pub fn time_signature(
        timestamp: Pulse,
        numerator: u8,
        denominator: u32,
        clocks_per_metronome: u8,
        thirty_seconds_per_quarter: u8,
    ) -> Self {
        let mut ev = Self::short(timestamp, status::META, 0, 0, ByteContext::Stored);
        ev.channel = meta::TIME_SIGNATURE;
        ev.ex_data = vec![
            numerator,
            denominator.max(1).ilog2() as u8,
            clocks_per_metronome,
            thirty_seconds_per_quarter,
        ];
        ev
    }

    /// Key Signature meta event; negative `sharps_flats` counts flats.
    pub fn key_signature(timestamp: Pulse, sharps_flats: i8, minor: bool) -> Self {
        let mut ev = Self::short(timestamp, status::META, 0, 0, ByteContext::Stored);
        ev.channel = meta::KEY_SIGNATURE;
        ev.ex_data = vec![sharps_flats as u8, minor as u8];
        ev
    }

    /// A Note-On with velocity zero is a Note-Off in disguise.
    #[inline]
    pub fn is_note_off_recorded(status: u8, velocity: u8) -> bool {
        status & status::STATUS_MASK == status::NOTE_ON && velocity == 0
    }

    #[inline]
    pub fn timestamp(&self) -> Pulse {
        self.timestamp
    }

    #[inline]
    pub fn set_timestamp(&mut self, timestamp: Pulse) {
        self.timestamp = timestamp;
    }

    /// Wraps the timestamp into `0..length`. No-op when `length <= 0`.
    pub fn mod_timestamp(&mut self, length: Pulse) {
        if length > 0 {
            self.timestamp = self.timestamp.rem_euclid(length);
        }
    }

    /// Status byte as stored, channel nibble stripped for voice messages.
    #[inline]
    pub fn status(&self) -> u8 {
        self.status
    }

    #[inline]
    pub fn normalized_status(&self) -> u8 {
        status::normalize(self.status)
    }

    /// Status byte for playback with the voice channel replaced by `channel`.
    pub fn get_status(&self, channel: u8) -> u8 {
        if self.has_channel() {
            self.status | (channel & status::CHANNEL_MASK)
        } else {
            self.status
        }
    }

    pub fn channel(&self) -> Option<u8> {
        self.has_channel().then_some(self.channel)
    }

    pub fn meta_type(&self) -> Option<u8> {
        self.is_meta().then_some(self.channel)
    }

    #[inline]
    pub fn data(&self) -> [u8; 2] {
        self.data
    }

    #[inline]
    pub fn note(&self) -> u8 {
        self.data[0]
    }

    #[inline]
    pub fn velocity(&self) -> u8 {
        self.data[1]
    }

    pub fn set_data(&mut self, d0: u8, d1: u8) {
        self.data = [d0 & 0x7F, d1 & 0x7F];
    }

    #[inline]
    pub fn ex_data(&self) -> &[u8] {
        &self.ex_data
    }

    #[inline]
    pub fn context(&self) -> ByteContext {
        self.context
    }

    /// Ordering key within a timestamp: Note-Off, Note-On, other voice, meta, rest.
    pub fn rank(&self) -> u8 {
        match self.status {
            status::NOTE_OFF => 0,
            status::NOTE_ON => 1,
            s if status::is_channel_msg(s) => 2,
            _ if self.is_meta() => 3,
            _ => 4,
        }
    }

    #[inline]
    pub fn sort_key(&self) -> (Pulse, u8) {
        (self.timestamp, self.rank())
    }

    // Classification

    #[inline]
    pub fn has_channel(&self) -> bool {
        status::is_channel_msg(self.status)
    }

    #[inline]
    pub fn is_channel_msg(&self) -> bool {
        self.has_channel()
    }

    #[inline]
    pub fn is_note_on(&self) -> bool {
        self.status == status::NOTE_ON
    }

    #[inline]
    pub fn is_note_off(&self) -> bool {
        self.status == status::NOTE_OFF
    }

    /// Note-On or Note-Off only.
    #[inline]
    pub fn is_strict_note(&self) -> bool {
        self.is_note_on() || self.is_note_off()
    }

    /// Any message addressing a note, polyphonic aftertouch included.
    #[inline]
    pub fn is_note(&self) -> bool {
        self.is_strict_note() || self.status == status::AFTERTOUCH
    }

    #[inline]
    pub fn is_controller(&self) -> bool {
        self.status == status::CONTROL_CHANGE
    }

    #[inline]
    pub fn is_program_change(&self) -> bool {
        self.status == status::PROGRAM_CHANGE
    }

    #[inline]
    pub fn is_pitchbend(&self) -> bool {
        self.status == status::PITCH_WHEEL
    }

    #[inline]
    pub fn is_one_byte(&self) -> bool {
        status::is_one_byte_msg(self.status)
    }

    #[inline]
    pub fn is_two_bytes(&self) -> bool {
        self.has_channel() && !self.is_one_byte()
    }

    #[inline]
    pub fn is_sysex(&self) -> bool {
        self.status == status::SYSEX
    }

    #[inline]
    pub fn is_system_common(&self) -> bool {
        status::is_system_common(self.status)
    }

    /// Realtime transport byte. A stored `0xFF` is meta, not realtime.
    #[inline]
    pub fn is_system_realtime(&self) -> bool {
        status::is_realtime(self.status) && !self.is_meta()
    }

    #[inline]
    pub fn is_meta(&self) -> bool {
        self.status == status::META && self.context == ByteContext::Stored
    }

    #[inline]
    pub fn is_reset(&self) -> bool {
        self.status == status::RESET && self.context == ByteContext::Live
    }

    #[inline]
    pub fn is_sense_or_reset(&self) -> bool {
        self.status == status::ACTIVE_SENSE || self.is_reset()
    }

    #[inline]
    pub fn is_tempo(&self) -> bool {
        self.is_meta() && self.channel == meta::SET_TEMPO
    }

    #[inline]
    pub fn is_time_signature(&self) -> bool {
        self.is_meta() && self.channel == meta::TIME_SIGNATURE
    }

    #[inline]
    pub fn is_key_signature(&self) -> bool {
        self.is_meta() && self.channel == meta::KEY_SIGNATURE
    }

    #[inline]
    pub fn is_meta_text(&self) -> bool {
        self.is_meta() && (meta::TEXT..=meta::CUE_POINT).contains(&self.channel)
    }

    /// Can be sent to an output port as-is.
    #[inline]
    pub fn is_playable(&self) -> bool {
        self.has_channel() || self.is_sysex()
    }

    // Linking

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    /// A Note-On that still needs a partner.
    #[inline]
    pub fn on_linkable(&self) -> bool {
        self.is_note_on() && !self.is_linked()
    }

    /// A Note-Off still available as a partner.
    #[inline]
    pub fn off_linkable(&self) -> bool {
        self.is_note_off() && !self.is_linked()
    }

    #[inline]
    pub fn is_note_unlinked(&self) -> bool {
        self.is_strict_note() && !self.is_linked()
    }

    #[inline]
    pub fn linked(&self) -> Option<EventRef> {
        self.link
    }

    /// Records `partner` as this event's link. Does not touch the partner.
    #[inline]
    pub fn link(&mut self, partner: EventRef) {
        self.link = Some(partner);
    }

    #[inline]
    pub fn unlink(&mut self) {
        self.link = None;
    }

    // Flags

    #[inline]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    #[inline]
    pub fn select(&mut self) {
        self.selected = true;
    }

    #[inline]
    pub fn unselect(&mut self) {
        self.selected = false;
    }

    #[inline]
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    #[inline]
    pub fn mark(&mut self) {
        self.marked = true;
    }

    #[inline]
    pub fn unmark(&mut self) {
        self.marked = false;
    }

    #[inline]
    pub fn is_painted(&self) -> bool {
        self.painted
    }

    #[inline]
    pub fn paint(&mut self) {
        self.painted = true;
    }

    #[inline]
    pub fn unpaint(&mut self) {
        self.painted = false;
    }

    // Meta payloads

    pub fn tempo_us(&self) -> Option<u32> {
        if !self.is_tempo() || self.ex_data.len() < 3 {
            return None;
        }
        let d = &self.ex_data;
        Some(((d[0] as u32) << 16) | ((d[1] as u32) << 8) | d[2] as u32)
    }

    /// BPM carried by a Set Tempo event.
    pub fn bpm(&self) -> Option<f64> {
        self.tempo_us().map(bpm_from_tempo_us)
    }

    pub fn time_signature_value(&self) -> Option<TimeSignature> {
        if !self.is_time_signature() || self.ex_data.len() < 4 {
            return None;
        }
        let d = &self.ex_data;
        Some(TimeSignature {
            numerator: d[0],
            denominator: 1u32.checked_shl(d[1] as u32)?,
            clocks_per_metronome: d[2],
            thirty_seconds_per_quarter: d[3],
        })
    }

    /// `(sharps_flats, minor)` of a Key Signature event.
    pub fn key_signature_value(&self) -> Option<(i8, bool)> {
        if !self.is_key_signature() || self.ex_data.len() < 2 {
            return None;
        }
        Some((self.ex_data[0] as i8, self.ex_data[1] != 0))
    }

    // Encoding

    /// Bytes to transmit, voice channel taken from the event.
    ///
    /// Meta events encode to their stored form `FF type VLQ-length payload`.
    pub fn wire_bytes(&self) -> WireBytes {
        self.wire_bytes_on(self.channel)
    }

    /// Bytes to transmit with the voice channel overridden.
    pub fn wire_bytes_on(&self, channel: u8) -> WireBytes {
        let mut out = WireBytes::new();
        if self.has_channel() {
            out.push(self.get_status(channel));
            out.push(self.data[0]);
            if !self.is_one_byte() {
                out.push(self.data[1]);
            }
        } else if self.is_sysex() {
            out.extend_from_slice(&self.ex_data);
        } else if self.is_meta() {
            out.push(status::META);
            out.push(self.channel);
            write_vlq(self.ex_data.len(), &mut out);
            out.extend_from_slice(&self.ex_data);
        } else {
            let len = status::message_len(self.status).unwrap_or(1);
            out.push(self.status);
            out.extend_from_slice(&self.data[..len - 1]);
        }
        out
    }

    /// Structured view through `midi-msg`. Meta events have none.
    pub fn to_midi_msg(&self) -> Result<MidiMsg> {
        if self.is_meta() {
            return Err(Error::InvalidStatus(status::META));
        }
        let (msg, _len) = MidiMsg::from_midi(&self.wire_bytes())?;
        Ok(msg)
    }

    pub fn from_midi_msg(timestamp: Pulse, msg: &MidiMsg) -> Result<Self> {
        Self::from_bytes(timestamp, &msg.to_midi(), ByteContext::Live)
    }
}
