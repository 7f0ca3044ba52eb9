//! Dedicated input thread.
//!
//! Drains the router's inputs, offers each event to the recording fan-out
//! and forwards whatever was not recorded on a channel. Sleeps briefly
//! when there is nothing to read.

use crate::router::{InboundEvent, PortRouter};
use crossbeam_channel::{Sender, TrySendError};
use sequin_core::{timing, AtomicFlag, SequencerConfig};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

pub struct InputPoller {
    running: Arc<AtomicFlag>,
    handle: Option<JoinHandle<()>>,
}

impl InputPoller {
    pub fn spawn(
        router: Arc<PortRouter>,
        config: &SequencerConfig,
        events: Sender<InboundEvent>,
    ) -> Self {
        let running = Arc::new(AtomicFlag::new(true));
        let running_clone = Arc::clone(&running);
        let priority = config.io_thread_priority;
        let sleep_us = config.poll_sleep_us;

        let handle = thread::Builder::new()
            .name("sequin-midi-input".to_string())
            .spawn(move || {
                Self::input_thread(router, events, running_clone, priority, sleep_us);
            })
            .expect("Failed to spawn MIDI input thread");

        Self {
            running,
            handle: Some(handle),
        }
    }

    fn input_thread(
        router: Arc<PortRouter>,
        events: Sender<InboundEvent>,
        running: Arc<AtomicFlag>,
        priority: Option<u8>,
        sleep_us: u64,
    ) {
        if let Some(priority) = priority {
            if timing::set_realtime_priority(priority) {
                debug!("MIDI input thread running at priority {}", priority);
            }
        }

        let mut overflow_seen = 0;
        let mut dropped = 0u64;
        while running.get() {
            let mut handled = false;
            while let Some(inbound) = router.get_midi_event() {
                handled = true;
                if router.dump_input(&inbound) {
                    continue;
                }
                match events.try_send(inbound) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        dropped += 1;
                        debug!("MIDI event channel full, {} events dropped", dropped);
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        debug!("MIDI event receiver gone, input thread exiting");
                        return;
                    }
                }
            }

            let overflow = router.bridge_stats().overflow;
            if overflow > overflow_seen {
                warn!(
                    "MIDI input queue overflow: {} frames lost so far",
                    overflow
                );
                overflow_seen = overflow;
            }

            if !handled {
                timing::microsleep(sleep_us);
            }
        }
        debug!("MIDI input thread stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.get() && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signals the thread and waits for it to exit.
    pub fn stop(&mut self) {
        self.running.set(false);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for InputPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
