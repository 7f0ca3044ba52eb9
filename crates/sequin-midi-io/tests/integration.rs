//! Integration tests for sequin-midi-io.
//!
//! These tests drive the router end to end through the in-memory and
//! bridge backends; no hardware MIDI devices are needed.

use proptest::prelude::*;
use sequin_midi_io::{
    frame_ring, BridgeBackend, BridgeStats, ClockMode, InputOutcome, MemoryBackend, MidiBackend,
    PeriodBuffer, PortRouter, RecordMode, SequencerConfig, TimedEvent, TimelineRecorder,
};
use std::collections::HashSet;
use std::sync::Arc;

fn memory_config() -> SequencerConfig {
    SequencerConfig::default()
        .with_backend("memory")
        .with_io_thread_priority(None)
}

// ---------------------------------------------------------------------------
// 1. Panic
// ---------------------------------------------------------------------------

/// Every (port, channel, note) except the excluded port gets exactly one Note-Off.
#[test]
fn test_panic_completeness() {
    let backend = MemoryBackend::new().with_outputs(3);
    let router = PortRouter::new(&memory_config(), &backend).unwrap();
    let ids: Vec<_> = backend.enumerate().unwrap().iter().map(|d| d.id).collect();

    let sent = router.panic(Some(1));
    assert_eq!(sent, 2 * 16 * 128);

    assert!(backend.sent_to(ids[1]).is_empty());
    for id in [ids[0], ids[2]] {
        let messages = backend.sent_to(id);
        assert_eq!(messages.len(), 16 * 128);
        let unique: HashSet<Vec<u8>> = messages.iter().cloned().collect();
        assert_eq!(unique.len(), 16 * 128);
        for channel in 0..16u8 {
            for note in 0..128u8 {
                assert!(unique.contains(&vec![0x80 | channel, note, 0]));
            }
        }
    }
    assert!(backend.flush_count() >= 2);
}

/// Panic with no exclusion reaches every output.
#[test]
fn test_panic_all_ports() {
    let backend = MemoryBackend::new().with_outputs(2);
    let router = PortRouter::new(&memory_config(), &backend).unwrap();
    assert_eq!(router.panic(None), 2 * 16 * 128);
}

/// A panic larger than one period reaches the callback over several periods, nothing lost.
#[test]
fn test_panic_completeness_over_bridge() {
    let backend = BridgeBackend::new();
    let out = backend.add_output("system:playback_1");
    let router = PortRouter::new(&memory_config().with_backend("bridge"), &backend).unwrap();
    let mut callback = backend.take_callback();

    assert_eq!(router.panic(None), 16 * 128);

    let mut delivered = HashSet::new();
    for _ in 0..5 {
        callback.process();
        for frame in callback.output_buffer(out).unwrap().frames() {
            assert!(delivered.insert(frame.to_vec()));
        }
    }
    assert_eq!(delivered.len(), 16 * 128);
    assert_eq!(router.bridge_stats().dropped_outbound, 0);
}

// ---------------------------------------------------------------------------
// 2. Recording fan-out
// ---------------------------------------------------------------------------

/// Second distinct target is refused in single mode; state is unchanged.
#[test]
fn test_single_target_exclusivity() {
    let backend = MemoryBackend::new().with_inputs(1);
    let router = PortRouter::new(&memory_config(), &backend).unwrap();
    let id = backend.enumerate().unwrap()[0].id;

    let first = Arc::new(TimelineRecorder::new(768));
    let second = Arc::new(TimelineRecorder::new(768));
    assert!(router.set_sequence_input(true, Some(first.clone())));
    assert!(!router.set_sequence_input(true, Some(second.clone())));
    assert!(router.set_sequence_input(true, Some(first.clone())));

    backend.feed(id, 0, &[0x90, 60, 100]);
    let inbound = router.get_midi_event().unwrap();
    assert!(router.dump_input(&inbound));
    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
}

/// By-channel recording sends each channel to its own recorder.
#[test]
fn test_by_channel_recording() {
    let backend = MemoryBackend::new().with_inputs(1);
    let config = memory_config().with_record_mode(RecordMode::ByChannel);
    let router = PortRouter::new(&config, &backend).unwrap();
    let id = backend.enumerate().unwrap()[0].id;

    let drums = Arc::new(TimelineRecorder::new(768).with_channel(9));
    let bass = Arc::new(TimelineRecorder::new(768).with_channel(1));
    router.set_sequence_input(true, Some(drums.clone()));
    router.set_sequence_input(true, Some(bass.clone()));

    backend.feed(id, 0, &[0x99, 36, 120]);
    backend.feed(id, 0, &[0x91, 40, 80]);
    backend.feed(id, 0, &[0x89, 36, 0]);
    let mut tick = 0;
    while let Some(inbound) = router.get_midi_event() {
        drums.set_tick(tick);
        bass.set_tick(tick);
        router.dump_input(&inbound);
        tick += 48;
    }

    assert_eq!(drums.len(), 2);
    assert_eq!(bass.len(), 1);
    assert_eq!(drums.finish().linked, 1);
}

// ---------------------------------------------------------------------------
// 3. Status persistence
// ---------------------------------------------------------------------------

/// Saving past the end of the clock list fills the gap with placeholders.
#[test]
fn test_save_clock_gap_fill() {
    let backend = MemoryBackend::new().with_outputs(1);
    let router = PortRouter::new(&memory_config(), &backend).unwrap();

    router.save_clock(5, ClockMode::Pos);
    let clocks = router.clock_list();
    assert_eq!(clocks.len(), 6);
    assert_eq!(clocks.get(0), Some(ClockMode::Off));
    assert!(clocks.entry(0).unwrap().available);
    for bus in 1..5 {
        let entry = clocks.entry(bus).unwrap();
        assert_eq!(entry.value, ClockMode::Disabled);
        assert_eq!(entry.name, "Null clock");
    }
    assert_eq!(clocks.get(5), Some(ClockMode::Pos));
    assert_eq!(router.get_clock(5), ClockMode::Pos);
}

/// Persisted state is applied to ports found at startup.
#[test]
fn test_persisted_status_applied() {
    let backend = MemoryBackend::new().with_outputs(2).with_inputs(2);
    let config = SequencerConfig {
        clocks: vec![ClockMode::Pos, ClockMode::Disabled],
        inputs: vec![false, true],
        ..memory_config()
    };
    let router = PortRouter::new(&config, &backend).unwrap();

    assert_eq!(router.get_clock(0), ClockMode::Pos);
    assert_eq!(router.get_clock(1), ClockMode::Disabled);
    assert!(!router.get_input(0));
    assert!(router.get_input(1));

    let snapshot = router.snapshot();
    assert_eq!(snapshot.outputs.len(), 2);
    assert!(!snapshot.outputs[1].enabled);
}

/// Port exit marks the port unavailable; its settings stay put.
#[test]
fn test_port_exit() {
    let backend = MemoryBackend::new().with_outputs(2);
    let router = PortRouter::new(&memory_config(), &backend).unwrap();
    let ids: Vec<_> = backend.enumerate().unwrap().iter().map(|d| d.id).collect();
    router.set_clock(1, ClockMode::On);

    assert!(router.port_exit(ids[1].client, ids[1].port));
    let info = router.output_port_info();
    assert!(info[0].available);
    assert!(!info[1].available);
    assert_eq!(router.clock_list().get(1), Some(ClockMode::On));

    backend.clear_sent();
    router.start();
    assert!(backend.sent().is_empty());
}

// ---------------------------------------------------------------------------
// 4. Clock
// ---------------------------------------------------------------------------

/// Position-aware clock announces the song position before Continue.
#[test]
fn test_pos_clock_from_middle() {
    let backend = MemoryBackend::new().with_outputs(1);
    let router = PortRouter::new(&memory_config().with_ppqn(192), &backend).unwrap();
    router.set_clock(0, ClockMode::Pos);
    let id = backend.enumerate().unwrap()[0].id;

    // 100 ticks is 2 full 16th notes at 48 ticks each.
    router.init_clock(100);
    let sent = backend.sent_to(id);
    assert_eq!(sent, vec![vec![0xF2, 2, 0], vec![0xFB]]);

    backend.clear_sent();
    // Next 16th starts at 144; 144 and 152 are clock boundaries.
    assert_eq!(router.emit_clock(159), 2);
    assert_eq!(backend.sent_to(id), vec![vec![0xF8], vec![0xF8]]);
}

proptest! {
    /// Pulses are emitted once per boundary, never twice, whatever order the ticks arrive in.
    #[test]
    fn prop_clock_monotonic(ticks in prop::collection::vec(0i64..2000, 1..40)) {
        let backend = MemoryBackend::new().with_outputs(1);
        let router = PortRouter::new(&memory_config().with_ppqn(192), &backend).unwrap();
        router.set_clock(0, ClockMode::On);
        router.start();

        let mut total = 0;
        let mut high = -1i64;
        for &tick in &ticks {
            let pulses = router.emit_clock(tick);
            if tick <= high {
                prop_assert_eq!(pulses, 0);
            }
            high = high.max(tick);
            total += pulses;
        }
        // ppqn 192 gives one pulse every 8 ticks, the first at tick 0.
        prop_assert_eq!(total as i64, high / 8 + 1);
    }
}

// ---------------------------------------------------------------------------
// 5. Real-time bridge
// ---------------------------------------------------------------------------

/// Router output crosses the bridge and lands in the period buffer.
#[test]
fn test_bridge_output_through_router() {
    let backend = BridgeBackend::new();
    let out = backend.add_output("system:playback_1");
    let config = SequencerConfig::default().with_backend("bridge");
    let router = PortRouter::new(&config, &backend).unwrap();
    let mut callback = backend.take_callback();

    assert!(router.play(0, &TimedEvent::note_on(0, 0, 60, 100), 3));
    assert!(router.play(0, &TimedEvent::note_off(96, 0, 60, 0), 3));
    assert_eq!(callback.process(), 2);

    let frames: Vec<&[u8]> = callback.output_buffer(out).unwrap().frames().collect();
    assert_eq!(frames, vec![&[0x93, 60, 100][..], &[0x83, 60, 0][..]]);
}

/// Callback input reaches the router; sense bytes and SysEx fragments do not.
#[test]
fn test_bridge_input_through_router() {
    let backend = BridgeBackend::new();
    let keys = backend.add_input("system:capture_1");
    let config = SequencerConfig::default().with_backend("bridge");
    let router = PortRouter::new(&config, &backend).unwrap();
    let mut callback = backend.take_callback();

    assert_eq!(callback.receive(keys, 5_000, &[0x90, 60, 100]), Some(InputOutcome::Queued));
    assert_eq!(callback.receive(keys, 5_100, &[0xFE]), Some(InputOutcome::Filtered));
    assert_eq!(callback.receive(keys, 5_200, &[0xF0, 0x7E, 0x01]), Some(InputOutcome::Queued));
    assert_eq!(callback.receive(keys, 5_300, &[0x02, 0xF7]), Some(InputOutcome::Suppressed));
    assert_eq!(callback.receive(keys, 6_000, &[0x80, 60, 0]), Some(InputOutcome::Queued));

    let first = router.get_midi_event().unwrap();
    assert_eq!(first.delta_us, 0);
    assert!(first.event.is_note_on());

    let second = router.get_midi_event().unwrap();
    assert!(second.event.is_sysex());
    assert_eq!(second.delta_us, 200);

    let third = router.get_midi_event().unwrap();
    assert!(third.event.is_note_off());
    assert_eq!(third.delta_us, 800);

    let stats = router.bridge_stats();
    assert_eq!(stats.filtered, 1);
    assert_eq!(stats.sysex_suppressed, 1);
}

/// A full record queue is counted as overflow, never silently lost.
#[test]
fn test_bridge_input_overflow_counted() {
    let backend = BridgeBackend::new();
    let keys = backend.add_input("system:capture_1");
    let config = SequencerConfig {
        input_queue_size: 64,
        ..SequencerConfig::default().with_backend("bridge")
    };
    let router = PortRouter::new(&config, &backend).unwrap();
    let mut callback = backend.take_callback();

    // 21 three-byte frames fill 63 of the 64 bytes.
    for note in 0..21u8 {
        assert_eq!(
            callback.receive(keys, u64::from(note), &[0x90, note, 100]),
            Some(InputOutcome::Queued)
        );
    }
    assert_eq!(callback.receive(keys, 21, &[0x90, 21, 100]), Some(InputOutcome::Overflow));
    assert_eq!(router.bridge_stats().overflow, 1);
    assert_eq!(router.poll_for_midi(), 21);
}

fn midi_frame() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        (0x80u8..0xF0, 0u8..128, 0u8..128).prop_map(|(s, a, b)| vec![s, a, b]),
        (0xC0u8..0xE0, 0u8..128).prop_map(|(s, a)| vec![s, a]),
        (0xF8u8..0xFD).prop_map(|s| vec![s]),
    ]
}

proptest! {
    /// Frames that were accepted come out whole and in order; rejected ones leave no trace.
    #[test]
    fn prop_ring_round_trip(
        frames in prop::collection::vec(midi_frame(), 0..64),
        capacity in 1usize..96,
    ) {
        let (mut writer, mut reader) = frame_ring(capacity, Arc::new(BridgeStats::default()));
        let accepted: Vec<Vec<u8>> = frames
            .into_iter()
            .filter(|f| writer.write(f, 0))
            .collect();

        let mut period = PeriodBuffer::new(4096, 256);
        prop_assert_eq!(reader.drain_into(&mut period), accepted.len());
        let drained: Vec<Vec<u8>> = period.frames().map(<[u8]>::to_vec).collect();
        prop_assert_eq!(drained, accepted);
        prop_assert!(reader.is_empty());
    }
}
