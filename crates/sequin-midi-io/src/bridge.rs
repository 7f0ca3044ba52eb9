//! Real-time bridge between control threads and a backend's process callback.
//!
//! Each direction is a pair of SPSC rings: a byte ring with the encoded
//! messages and a header ring with one length record per message. The
//! writer checks room in both rings before touching either, so a rejected
//! frame never leaves a partial entry behind.
//!
//! - Output: control thread (writer) -> process callback (reader)
//! - Input: process callback (writer) -> input poller (reader)
//!
//! Nothing on the callback side allocates, blocks, or logs. Problems are
//! counted in [`BridgeStats`] and reported later from a normal thread.

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use sequin_core::AtomicCounter;
use sequin_midi::status;
use sequin_midi::WireBytes;
use std::sync::Arc;

/// Length record stored alongside each frame's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    pub len: u32,
    /// Microseconds since the previous input frame; zero for output frames.
    pub delta_us: u64,
}

/// Counters bumped from the real-time side.
#[derive(Debug, Default)]
pub struct BridgeStats {
    overflow: AtomicCounter,
    sysex_suppressed: AtomicCounter,
    dropped_outbound: AtomicCounter,
    filtered: AtomicCounter,
}

/// Point-in-time copy of [`BridgeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStatsSnapshot {
    /// Input frames lost because the record queue was full.
    pub overflow: u64,
    /// SysEx continuation fragments not queued.
    pub sysex_suppressed: u64,
    /// Output frames discarded because they exceed a whole period buffer.
    pub dropped_outbound: u64,
    /// Active Sense and Reset bytes filtered on input.
    pub filtered: u64,
}

impl BridgeStats {
    pub fn snapshot(&self) -> BridgeStatsSnapshot {
        BridgeStatsSnapshot {
            overflow: self.overflow.get(),
            sysex_suppressed: self.sysex_suppressed.get(),
            dropped_outbound: self.dropped_outbound.get(),
            filtered: self.filtered.get(),
        }
    }
}

impl std::ops::Add for BridgeStatsSnapshot {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            overflow: self.overflow + rhs.overflow,
            sysex_suppressed: self.sysex_suppressed + rhs.sysex_suppressed,
            dropped_outbound: self.dropped_outbound + rhs.dropped_outbound,
            filtered: self.filtered + rhs.filtered,
        }
    }
}

/// Creates a frame ring holding up to `byte_capacity` bytes of messages.
pub fn frame_ring(byte_capacity: usize, stats: Arc<BridgeStats>) -> (FrameWriter, FrameReader) {
    let byte_capacity = byte_capacity.max(1);
    // A MIDI message is at least one byte, so this many headers can never run out first.
    let (bytes_prod, bytes_cons) = HeapRb::<u8>::new(byte_capacity).split();
    let (headers_prod, headers_cons) = HeapRb::<FrameHeader>::new(byte_capacity).split();
    (
        FrameWriter {
            bytes: bytes_prod,
            headers: headers_prod,
        },
        FrameReader {
            bytes: bytes_cons,
            headers: headers_cons,
            pending: None,
            stats,
        },
    )
}

/// Producer half of a frame ring.
pub struct FrameWriter {
    bytes: HeapProd<u8>,
    headers: HeapProd<FrameHeader>,
}

impl FrameWriter {
    /// Queues one frame. Returns `false` without writing anything if it does not fit.
    pub fn write(&mut self, frame: &[u8], delta_us: u64) -> bool {
        if frame.is_empty() || frame.len() > u32::MAX as usize {
            return false;
        }
        if self.bytes.vacant_len() < frame.len() || self.headers.vacant_len() == 0 {
            return false;
        }
        let written = self.bytes.push_slice(frame);
        debug_assert_eq!(written, frame.len());
        self.headers
            .try_push(FrameHeader {
                len: frame.len() as u32,
                delta_us,
            })
            .is_ok()
    }

    pub fn vacant_bytes(&self) -> usize {
        self.bytes.vacant_len()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity().get()
    }
}

/// A backend-owned destination for one processing period's output events.
pub trait EventSink {
    /// Reserves a slot of exactly `len` bytes, or `None` if the period is full.
    fn reserve(&mut self, len: usize) -> Option<&mut [u8]>;

    /// Bytes an empty sink can hold. Larger frames can never be delivered.
    fn capacity(&self) -> usize;
}

/// Consumer half of a frame ring.
pub struct FrameReader {
    bytes: HeapCons<u8>,
    headers: HeapCons<FrameHeader>,
    /// Header popped in an earlier period whose bytes are still queued.
    pending: Option<FrameHeader>,
    stats: Arc<BridgeStats>,
}

impl FrameReader {
    fn next_header(&mut self) -> Option<FrameHeader> {
        self.pending.take().or_else(|| self.headers.try_pop())
    }

    /// Moves queued frames into `sink`, reading exactly the declared length each time.
    ///
    /// Stops at the first frame the sink has no room for; that frame is
    /// delivered first on the next call. Only a frame larger than the whole
    /// sink is discarded and counted. Returns the number of frames delivered.
    pub fn drain_into<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> usize {
        let mut delivered = 0;
        while let Some(header) = self.next_header() {
            let len = header.len as usize;
            if len > sink.capacity() {
                self.bytes.skip(len);
                self.stats.dropped_outbound.incr();
                continue;
            }
            match sink.reserve(len) {
                Some(slot) => {
                    self.bytes.pop_slice(slot);
                    delivered += 1;
                }
                None => {
                    self.pending = Some(header);
                    break;
                }
            }
        }
        delivered
    }

    /// Pops one frame into `out`. A frame larger than `out` is discarded and counted.
    pub fn read_frame(&mut self, out: &mut [u8]) -> Option<FrameHeader> {
        let header = self.next_header()?;
        let len = header.len as usize;
        if len > out.len() {
            self.bytes.skip(len);
            self.stats.dropped_outbound.incr();
            return None;
        }
        self.bytes.pop_slice(&mut out[..len]);
        Some(header)
    }

    /// Pops one frame into an owned buffer. Not for use on the real-time side.
    pub fn pop_frame(&mut self) -> Option<(FrameHeader, WireBytes)> {
        let header = self.next_header()?;
        let mut bytes = WireBytes::from_elem(0, header.len as usize);
        self.bytes.pop_slice(&mut bytes[..]);
        Some((header, bytes))
    }

    pub fn pending_frames(&self) -> usize {
        self.headers.occupied_len() + usize::from(self.pending.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none() && self.headers.is_empty()
    }
}

/// Pre-sized storage for one processing period of output events.
///
/// Stands in for the port buffer an audio server hands its process callback.
#[derive(Debug)]
pub struct PeriodBuffer {
    data: Vec<u8>,
    used: usize,
    frames: Vec<(usize, usize)>,
    max_frames: usize,
}

impl PeriodBuffer {
    pub fn new(byte_capacity: usize, max_frames: usize) -> Self {
        Self {
            data: vec![0; byte_capacity],
            used: 0,
            frames: Vec::with_capacity(max_frames),
            max_frames,
        }
    }

    /// Empties the buffer at the start of a period.
    pub fn clear(&mut self) {
        self.used = 0;
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&[u8]> {
        self.frames
            .get(index)
            .map(|&(start, len)| &self.data[start..start + len])
    }

    pub fn frames(&self) -> impl Iterator<Item = &[u8]> {
        self.frames
            .iter()
            .map(|&(start, len)| &self.data[start..start + len])
    }
}

impl EventSink for PeriodBuffer {
    fn reserve(&mut self, len: usize) -> Option<&mut [u8]> {
        let start = self.used;
        if self.frames.len() >= self.max_frames || start + len > self.data.len() {
            return None;
        }
        self.used += len;
        self.frames.push((start, len));
        Some(&mut self.data[start..start + len])
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// What happened to one frame handed to [`RtInput::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Queued,
    /// Active Sense or Reset, dropped on purpose.
    Filtered,
    /// SysEx continuation fragment, dropped on purpose.
    Suppressed,
    /// The record queue was full; counted as overflow.
    Overflow,
}

/// Real-time side of the input direction.
pub struct RtInput {
    writer: FrameWriter,
    stats: Arc<BridgeStats>,
    last_us: Option<u64>,
    in_sysex: bool,
}

impl RtInput {
    pub fn new(writer: FrameWriter, stats: Arc<BridgeStats>) -> Self {
        Self {
            writer,
            stats,
            last_us: None,
            in_sysex: false,
        }
    }

    /// Forgets the previous frame time, so the next frame gets a zero delta.
    pub fn cold_start(&mut self) {
        self.last_us = None;
        self.in_sysex = false;
    }

    /// Queues one native frame received at `now_us`.
    pub fn push(&mut self, now_us: u64, frame: &[u8]) -> InputOutcome {
        let Some(&first) = frame.first() else {
            return InputOutcome::Filtered;
        };
        let last = frame[frame.len() - 1];

        if first == status::ACTIVE_SENSE || first == status::RESET {
            self.stats.filtered.incr();
            return InputOutcome::Filtered;
        }
        if !status::is_status(first) || (self.in_sysex && first == status::SYSEX_END) {
            if self.in_sysex && last == status::SYSEX_END {
                self.in_sysex = false;
            }
            self.stats.sysex_suppressed.incr();
            return InputOutcome::Suppressed;
        }
        if first == status::SYSEX {
            self.in_sysex = last != status::SYSEX_END;
        } else if !status::is_realtime(first) {
            self.in_sysex = false;
        }

        let delta_us = match self.last_us {
            Some(prev) => now_us.saturating_sub(prev),
            None => 0,
        };
        if self.writer.write(frame, delta_us) {
            self.last_us = Some(now_us);
            InputOutcome::Queued
        } else {
            self.stats.overflow.incr();
            InputOutcome::Overflow
        }
    }

    pub fn stats(&self) -> &Arc<BridgeStats> {
        &self.stats
    }
}

/// One frame taken off the input queue by a non-real-time reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFrame {
    pub delta_us: u64,
    pub bytes: WireBytes,
}

/// Control side of the input direction.
pub struct InputQueue {
    reader: FrameReader,
}

impl InputQueue {
    pub fn new(reader: FrameReader) -> Self {
        Self { reader }
    }

    pub fn pop(&mut self) -> Option<InputFrame> {
        self.reader
            .pop_frame()
            .map(|(header, bytes)| InputFrame {
                delta_us: header.delta_us,
                bytes,
            })
    }

    pub fn pending(&self) -> usize {
        self.reader.pending_frames()
    }

    pub fn stats(&self) -> BridgeStatsSnapshot {
        self.reader.stats.snapshot()
    }
}

/// Builds both halves of an input queue of `byte_capacity` bytes.
pub fn input_queue(byte_capacity: usize) -> (RtInput, InputQueue) {
    let stats = Arc::new(BridgeStats::default());
    let (writer, reader) = frame_ring(byte_capacity, Arc::clone(&stats));
    (RtInput::new(writer, stats), InputQueue::new(reader))
}
