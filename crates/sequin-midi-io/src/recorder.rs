//! A [`RecordTarget`] that writes into an [`EventTimeline`].

use crate::router::{InboundEvent, RecordTarget};
use parking_lot::Mutex;
use sequin_core::{Pulse, SequencerConfig};
use sequin_midi::{EventTimeline, LinkReport, TimedEvent};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Records channel messages and SysEx at the current playback tick.
///
/// The tick is advanced by the sequencer with [`set_tick`](Self::set_tick);
/// recorded events wrap modulo the timeline length.
pub struct TimelineRecorder {
    id: u64,
    channel: Option<u8>,
    bus: Option<usize>,
    tick: AtomicI64,
    timeline: Mutex<EventTimeline>,
}

impl TimelineRecorder {
    pub fn new(length: Pulse) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            channel: None,
            bus: None,
            tick: AtomicI64::new(0),
            timeline: Mutex::new(EventTimeline::with_length(length)),
        }
    }

    /// Recorder whose timeline follows the linking policy in `config`.
    pub fn from_config(length: Pulse, config: &SequencerConfig) -> Self {
        Self::new(length).with_link_wraparound(config.link_wraparound)
    }

    /// Lets a note held across the pattern end link to its Note-Off near the start.
    pub fn with_link_wraparound(self, wrap: bool) -> Self {
        self.timeline.lock().set_link_wraparound(wrap);
        self
    }

    /// Only accept events on `channel`.
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = Some(channel & 0x0F);
        self
    }

    /// Only accept events from input `bus` in by-buss mode.
    pub fn with_bus(mut self, bus: usize) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn set_tick(&self, tick: Pulse) {
        self.tick.store(tick, Ordering::Release);
    }

    pub fn tick(&self) -> Pulse {
        self.tick.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.timeline.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.lock().is_empty()
    }

    pub fn events(&self) -> Vec<TimedEvent> {
        self.timeline.lock().events().to_vec()
    }

    /// Runs `f` with the timeline locked.
    pub fn with_timeline<R>(&self, f: impl FnOnce(&mut EventTimeline) -> R) -> R {
        f(&mut self.timeline.lock())
    }

    /// Pairs up recorded notes.
    pub fn finish(&self) -> LinkReport {
        let mut timeline = self.timeline.lock();
        let length = timeline.length();
        timeline.verify_and_link(length)
    }
}

impl RecordTarget for TimelineRecorder {
    fn target_id(&self) -> u64 {
        self.id
    }

    fn record_channel(&self) -> Option<u8> {
        self.channel
    }

    fn record_bus(&self) -> Option<usize> {
        self.bus
    }

    fn deliver(&self, inbound: &InboundEvent) -> bool {
        let event = &inbound.event;
        if !(event.has_channel() || event.is_sysex()) {
            return false;
        }
        if self.channel.is_some() && event.channel().is_some() && event.channel() != self.channel {
            return false;
        }

        let mut timeline = self.timeline.lock();
        let length = timeline.length();
        let tick = self.tick();
        let stamp = if length > 0 { tick.rem_euclid(length) } else { tick };

        let mut recorded = event.clone();
        recorded.set_timestamp(stamp);
        timeline.add(recorded);
        true
    }
}

impl std::fmt::Debug for TimelineRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineRecorder")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("bus", &self.bus)
            .field("tick", &self.tick())
            .finish()
    }
}
