//! Process-wide monotonic clock, short sleeps, and real-time priority requests.
//!
//! All clock reads share one epoch captured on first use, so values from
//! different threads are directly comparable.

use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};
use thread_priority::{ThreadPriority, ThreadPriorityValue};

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Microseconds elapsed on the process-wide monotonic clock.
#[inline]
pub fn microtime() -> u64 {
    epoch().elapsed().as_micros() as u64
}

/// Milliseconds elapsed on the process-wide monotonic clock.
#[inline]
pub fn millitime() -> u64 {
    epoch().elapsed().as_millis() as u64
}

/// Sleeps for roughly `us` microseconds.
///
/// Zero yields the processor instead of sleeping. An early wake-up is not a
/// failure, so this always reports success.
pub fn microsleep(us: u64) -> bool {
    if us == 0 {
        thread::yield_now();
    } else {
        thread::sleep(Duration::from_micros(us));
    }
    true
}

pub fn millisleep(ms: u64) -> bool {
    microsleep(ms.saturating_mul(1000))
}

/// Asks the scheduler to run the calling thread in a real-time class.
///
/// `priority` is on the portable 0..=99 scale. Returns `false` and logs a
/// warning when the request is refused; the thread keeps running at normal
/// priority either way.
pub fn set_realtime_priority(priority: u8) -> bool {
    let value = match ThreadPriorityValue::try_from(priority.min(99)) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Invalid real-time priority {}: {}", priority, e);
            return false;
        }
    };

    match request_realtime(ThreadPriority::Crossplatform(value)) {
        Ok(()) => {
            tracing::debug!(
                "Thread {:?} running at real-time priority {}",
                thread::current().name(),
                priority
            );
            true
        }
        Err(e) => {
            tracing::warn!(
                "Could not set real-time priority {} ({:?}); continuing at normal priority",
                priority,
                e
            );
            false
        }
    }
}

#[cfg(unix)]
fn request_realtime(priority: ThreadPriority) -> Result<(), thread_priority::Error> {
    use thread_priority::unix::{
        set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
        ThreadSchedulePolicy,
    };

    set_thread_priority_and_policy(
        thread_native_id(),
        priority,
        ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
    )
}

#[cfg(not(unix))]
fn request_realtime(priority: ThreadPriority) -> Result<(), thread_priority::Error> {
    thread_priority::set_current_thread_priority(priority)
}
