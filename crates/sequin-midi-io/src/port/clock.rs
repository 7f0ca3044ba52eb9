//! MIDI clock generation state.
//!
//! Pure bookkeeping: which pulse boundaries a port has already emitted and
//! where the clock restarts after Start, Continue, or a modulo-synced start.
//! The owning [`Port`](super::Port) turns the results into bytes.

use sequin_core::Pulse;

/// Realtime clock pulses per quarter note.
pub const CLOCKS_PER_QUARTER: u32 = 24;

/// `last_tick` value meaning "nothing emitted since (re)start".
pub const BEFORE_START: Pulse = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockState {
    ppqn: u32,
    clock_mod: u32,
    last_tick: Pulse,
}

impl ClockState {
    pub fn new(ppqn: u32, clock_mod: u32) -> Self {
        Self {
            ppqn: ppqn.max(1),
            clock_mod: clock_mod.max(1),
            last_tick: BEFORE_START,
        }
    }

    #[inline]
    pub fn last_tick(&self) -> Pulse {
        self.last_tick
    }

    #[inline]
    pub fn ppqn(&self) -> u32 {
        self.ppqn
    }

    pub fn set_ppqn(&mut self, ppqn: u32) {
        self.ppqn = ppqn.max(1);
    }

    /// Ticks between two clock pulses.
    #[inline]
    pub fn ticks_per_clock(&self) -> Pulse {
        Pulse::from((self.ppqn / CLOCKS_PER_QUARTER).max(1))
    }

    /// Ticks per 16th note, the unit of Song Position.
    #[inline]
    pub fn ticks_per_sixteenth(&self) -> Pulse {
        Pulse::from((self.ppqn / 4).max(1))
    }

    /// Length of the modulo-sync interval in ticks.
    #[inline]
    pub fn clock_mod_ticks(&self) -> Pulse {
        self.ticks_per_sixteenth() * Pulse::from(self.clock_mod)
    }

    /// Back to the stopped state.
    pub fn reset(&mut self) {
        self.last_tick = BEFORE_START;
    }

    /// Positions the clock so the next pulse lands on `tick`'s 16th note.
    ///
    /// Returns the Song Position (16th notes, 14 bits) to announce.
    pub fn continue_from(&mut self, tick: Pulse) -> u16 {
        let tick = tick.max(0);
        let pp16th = self.ticks_per_sixteenth();
        let leftover = tick % pp16th;
        let beats = tick / pp16th;
        let mut starting = tick - leftover;
        if leftover > 0 {
            starting += pp16th;
        }
        self.last_tick = starting - 1;
        (beats & 0x3FFF) as u16
    }

    /// Aligns the clock to the nearest modulo boundary at or before `tick`.
    pub fn align_to_modulo(&mut self, tick: Pulse) {
        let tick = tick.max(0);
        let leftover = tick % self.clock_mod_ticks();
        self.last_tick = (tick - leftover) - 1;
    }

    /// Treats everything before `tick` as already emitted.
    pub fn resume_at(&mut self, tick: Pulse) {
        self.last_tick = tick.max(0) - 1;
    }

    /// Walks `last_tick` forward one tick at a time up to `tick`, calling
    /// `pulse` at every boundary crossed. Returns the number of pulses.
    pub fn advance(&mut self, tick: Pulse, mut pulse: impl FnMut()) -> usize {
        let ct = self.ticks_per_clock();
        let mut count = 0;
        while self.last_tick < tick {
            self.last_tick += 1;
            if self.last_tick.rem_euclid(ct) == 0 {
                pulse();
                count += 1;
            }
        }
        count
    }
}

/// Song Position Pointer bytes for a 14-bit 16th-note count.
pub fn song_position_bytes(beats: u16) -> [u8; 3] {
    [
        sequin_midi::status::SONG_POS,
        (beats & 0x7F) as u8,
        ((beats >> 7) & 0x7F) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_pulse_at_zero() {
        let mut clock = ClockState::new(192, 64);
        assert_eq!(clock.ticks_per_clock(), 8);
        assert_eq!(clock.advance(0, || {}), 1);
        assert_eq!(clock.advance(7, || {}), 0);
        assert_eq!(clock.advance(8, || {}), 1);
        assert_eq!(clock.last_tick(), 8);
    }

    #[test]
    fn test_jump_emits_every_pulse() {
        let mut clock = ClockState::new(192, 64);
        let mut seen = 0;
        let n = clock.advance(191, || seen += 1);
        assert_eq!(n, 24);
        assert_eq!(seen, 24);
    }

    #[test]
    fn test_backwards_tick_is_noop() {
        let mut clock = ClockState::new(192, 64);
        clock.advance(100, || {});
        assert_eq!(clock.advance(50, || {}), 0);
        assert_eq!(clock.last_tick(), 100);
    }

    #[test]
    fn test_continue_from_mid_sixteenth() {
        let mut clock = ClockState::new(192, 64);
        // 48 ticks per 16th; 100 = 2 sixteenths + 4.
        let beats = clock.continue_from(100);
        assert_eq!(beats, 2);
        assert_eq!(clock.last_tick(), 143);

        let beats = clock.continue_from(96);
        assert_eq!(beats, 2);
        assert_eq!(clock.last_tick(), 95);
    }

    #[test]
    fn test_modulo_alignment_rounds_back() {
        let mut clock = ClockState::new(192, 64);
        // 64 sixteenths = 3072 ticks.
        assert_eq!(clock.clock_mod_ticks(), 3072);
        clock.align_to_modulo(4000);
        assert_eq!(clock.last_tick(), 3071);
        clock.align_to_modulo(0);
        assert_eq!(clock.last_tick(), BEFORE_START);
    }

    #[test]
    fn test_song_position_bytes() {
        assert_eq!(song_position_bytes(0x1234 & 0x3FFF), [0xF2, 0x34, 0x24]);
    }
}
