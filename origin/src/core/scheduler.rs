//! Cooperative timers for single-threaded simulation loops
//!
//! Nothing blocks. A caller schedules an event to resume after some seconds or
//! frames, then calls [`Scheduler::advance`] once per frame and dispatches the
//! events that came due. Events scheduled while dispatching wait for the next
//! `advance`, so a self-rescheduling loop can never spin within one frame.

use std::fmt::Debug;
use tracing::trace;

/// How long to wait before an event fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delay {
    /// Fire once this many seconds of frame time have elapsed
    Seconds(f32),
    /// Fire after this many calls to `advance`
    Frames(u32),
}

#[derive(Debug)]
struct Pending<E> {
    event: E,
    delay: Delay,
}

/// Pending delayed events for one participant
#[derive(Debug)]
pub struct Scheduler<E> {
    pending: Vec<Pending<E>>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<E: Clone + PartialEq + Debug> Scheduler<E> {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume `event` after `seconds` (negative values fire next frame)
    pub fn schedule_seconds(&mut self, event: E, seconds: f32) {
        trace!(event = ?event, seconds, "Scheduling event");
        self.pending.push(Pending {
            event,
            delay: Delay::Seconds(seconds.max(0.0)),
        });
    }

    /// Resume `event` after `frames` calls to `advance` (minimum one)
    pub fn schedule_frames(&mut self, event: E, frames: u32) {
        trace!(event = ?event, frames, "Scheduling event");
        self.pending.push(Pending {
            event,
            delay: Delay::Frames(frames.max(1)),
        });
    }

    /// Drop every pending instance of `event`, returning how many were removed
    pub fn cancel(&mut self, event: &E) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| &p.event != event);
        let removed = before - self.pending.len();
        if removed > 0 {
            trace!(event = ?event, removed, "Cancelled event");
        }
        removed
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Whether `event` is waiting to fire
    pub fn is_scheduled(&self, event: &E) -> bool {
        self.pending.iter().any(|p| &p.event == event)
    }

    /// Number of pending events
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Advance one frame of `delta_time` seconds and return due events in
    /// scheduling order
    pub fn advance(&mut self, delta_time: f32) -> Vec<E> {
        let mut due = Vec::new();

        self.pending.retain_mut(|p| {
            let fired = match &mut p.delay {
                Delay::Seconds(remaining) => {
                    *remaining -= delta_time;
                    *remaining <= 0.0
                }
                Delay::Frames(remaining) => {
                    *remaining = remaining.saturating_sub(1);
                    *remaining == 0
                }
            };
            if fired {
                due.push(p.event.clone());
            }
            !fired
        });

        due
    }
}
