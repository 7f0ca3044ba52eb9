//! Wire-level status bytes and meta-event sub-types.

// Channel voice messages (high nibble; low nibble is the channel).
pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const AFTERTOUCH: u8 = 0xA0;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_PRESSURE: u8 = 0xD0;
pub const PITCH_WHEEL: u8 = 0xE0;

// System common.
pub const SYSEX: u8 = 0xF0;
pub const QUARTER_FRAME: u8 = 0xF1;
pub const SONG_POS: u8 = 0xF2;
pub const SONG_SELECT: u8 = 0xF3;
pub const TUNE_SELECT: u8 = 0xF6;
pub const SYSEX_END: u8 = 0xF7;

// System realtime.
pub const CLOCK: u8 = 0xF8;
pub const START: u8 = 0xFA;
pub const CONTINUE: u8 = 0xFB;
pub const STOP: u8 = 0xFC;
pub const ACTIVE_SENSE: u8 = 0xFE;
/// Reset when received live, meta escape in a stored stream.
pub const RESET: u8 = 0xFF;
pub const META: u8 = 0xFF;

/// Marks an event that carries no channel.
pub const NO_CHANNEL: u8 = 0x80;

pub const STATUS_BIT: u8 = 0x80;
pub const CHANNEL_MASK: u8 = 0x0F;
pub const STATUS_MASK: u8 = 0xF0;

/// Meta-event sub-types.
pub mod meta {
    pub const SEQ_NUMBER: u8 = 0x00;
    pub const TEXT: u8 = 0x01;
    pub const COPYRIGHT: u8 = 0x02;
    pub const TRACK_NAME: u8 = 0x03;
    pub const INSTRUMENT: u8 = 0x04;
    pub const LYRIC: u8 = 0x05;
    pub const MARKER: u8 = 0x06;
    pub const CUE_POINT: u8 = 0x07;
    pub const END_OF_TRACK: u8 = 0x2F;
    pub const SET_TEMPO: u8 = 0x51;
    pub const TIME_SIGNATURE: u8 = 0x58;
    pub const KEY_SIGNATURE: u8 = 0x59;
    pub const SEQ_SPEC: u8 = 0x7F;
}

#[inline]
pub fn is_status(byte: u8) -> bool {
    byte & STATUS_BIT != 0
}

/// Channel voice range 0x80..=0xEF.
#[inline]
pub fn is_channel_msg(status: u8) -> bool {
    (NOTE_OFF..SYSEX).contains(&status)
}

#[inline]
pub fn is_system_common(status: u8) -> bool {
    (SYSEX..CLOCK).contains(&status)
}

#[inline]
pub fn is_realtime(status: u8) -> bool {
    status >= CLOCK
}

/// Strips the channel nibble from voice messages, leaves others untouched.
#[inline]
pub fn normalize(status: u8) -> u8 {
    if is_channel_msg(status) {
        status & STATUS_MASK
    } else {
        status
    }
}

/// Voice messages carrying a single data byte.
#[inline]
pub fn is_one_byte_msg(status: u8) -> bool {
    matches!(status & STATUS_MASK, PROGRAM_CHANGE | CHANNEL_PRESSURE)
}

/// Total wire length of a short (non-SysEx, non-meta) message, status included.
pub fn message_len(status: u8) -> Option<usize> {
    match status {
        s if is_channel_msg(s) => Some(if is_one_byte_msg(s) { 2 } else { 3 }),
        QUARTER_FRAME | SONG_SELECT => Some(2),
        SONG_POS => Some(3),
        TUNE_SELECT | SYSEX_END => Some(1),
        s if is_realtime(s) => Some(1),
        _ => None,
    }
}
