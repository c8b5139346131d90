//! Boundary to the replication transport
//!
//! The transport is ownership based and best effort: one writer per object,
//! periodic delivery, every update stamped with the sender's clock.

use crate::player::PlayerId;
use std::collections::VecDeque;
use tracing::trace;

/// Timing metadata delivered alongside a replicated update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeserializationInfo {
    /// Sender clock when the update was sent
    pub send_time: f32,
    /// Receiver clock when the update arrived
    pub receive_time: f32,
}

/// What a synchronizer needs from the transport
pub trait ReplicationChannel {
    /// Ask for a broadcast of `sender`'s state at the next opportunity
    fn request_serialization(&mut self, sender: PlayerId);

    /// Playout time for samples from `owner`, on the sender's clock
    fn simulation_time(&self, owner: PlayerId) -> f32;

    /// Monotonic local clock in seconds
    fn realtime(&self) -> f32;
}

/// An update in flight on a [`LoopbackChannel`]
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub sender: PlayerId,
    pub payload: Vec<u8>,
    pub info: DeserializationInfo,
}

/// In-process transport with fixed latency and optional periodic loss
///
/// Every participant shares one clock, so sender and receiver timestamps are
/// directly comparable.
#[derive(Debug, Clone)]
pub struct LoopbackChannel {
    now: f32,
    latency: f32,
    playout_delay: f32,
    /// Drop every n-th send, if set
    drop_every: Option<u32>,
    sent: u32,
    requests: Vec<PlayerId>,
    in_flight: VecDeque<(f32, Delivery)>,
}

impl LoopbackChannel {
    /// Create a channel with one-way `latency` and receiver `playout_delay`
    pub fn new(latency: f32, playout_delay: f32) -> Self {
        Self {
            now: 0.0,
            latency: latency.max(0.0),
            playout_delay: playout_delay.max(0.0),
            drop_every: None,
            sent: 0,
            requests: Vec::new(),
            in_flight: VecDeque::new(),
        }
    }

    /// Lose every `n`-th update (0 disables loss)
    pub fn with_loss(mut self, n: u32) -> Self {
        self.drop_every = (n > 0).then_some(n);
        self
    }

    pub fn advance(&mut self, delta_time: f32) {
        self.now += delta_time;
    }

    /// Pending serialization requests, oldest first
    pub fn take_requests(&mut self) -> Vec<PlayerId> {
        std::mem::take(&mut self.requests)
    }

    /// Put an update on the wire; returns false if it was lost
    pub fn send(&mut self, sender: PlayerId, payload: Vec<u8>) -> bool {
        self.sent += 1;
        if let Some(n) = self.drop_every {
            if self.sent % n == 0 {
                trace!(sender = %sender, "Loopback dropped update");
                return false;
            }
        }

        let deliver_at = self.now + self.latency;
        self.in_flight.push_back((
            deliver_at,
            Delivery {
                sender,
                payload,
                info: DeserializationInfo {
                    send_time: self.now,
                    receive_time: deliver_at,
                },
            },
        ));
        true
    }

    /// Updates whose latency has elapsed
    pub fn deliver_due(&mut self) -> Vec<Delivery> {
        let mut due = Vec::new();
        while let Some((deliver_at, _)) = self.in_flight.front() {
            if *deliver_at > self.now {
                break;
            }
            if let Some((_, delivery)) = self.in_flight.pop_front() {
                due.push(delivery);
            }
        }
        due
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl ReplicationChannel for LoopbackChannel {
    fn request_serialization(&mut self, sender: PlayerId) {
        if !self.requests.contains(&sender) {
            self.requests.push(sender);
        }
    }

    fn simulation_time(&self, _owner: PlayerId) -> f32 {
        self.now - self.latency - self.playout_delay
    }

    fn realtime(&self) -> f32 {
        self.now
    }
}
