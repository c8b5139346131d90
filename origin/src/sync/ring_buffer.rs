//! Playout delay buffer for received poses
//!
//! Receivers render a little in the past, picking the two buffered samples that
//! bracket the playout time and blending between them. Samples must arrive in
//! timestamp order; anything older than the newest buffered sample is dropped.

use crate::config::BUFFER_CAPACITY;
use glam::{Quat, Vec3};
use tracing::debug;

/// One received pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    /// Anchor-relative position
    pub position: Vec3,
    pub rotation: Quat,
    pub discontinuity: bool,
    /// Sender's timestamp, seconds
    pub timestamp: f32,
}

impl Default for PoseSample {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            discontinuity: false,
            timestamp: 0.0,
        }
    }
}

/// Result of sampling the buffer at a playout time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatedPose {
    /// Anchor-relative position
    pub position: Vec3,
    pub rotation: Quat,
    /// Blend factor from the left sample (0) to the right sample (1)
    pub factor: f32,
    pub left: usize,
    pub right: usize,
}

/// Like `Mathf.InverseLerp`: clamped, and 0 for an empty range
pub fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
    if a != b {
        ((value - a) / (b - a)).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Fixed-capacity ring of pose samples
#[derive(Debug, Clone)]
pub struct PlayoutBuffer {
    samples: [PoseSample; BUFFER_CAPACITY],
    /// Slot holding the most recently written sample
    write_pointer: usize,
    len: usize,
}

impl Default for PlayoutBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayoutBuffer {
    pub fn new() -> Self {
        Self {
            samples: [PoseSample::default(); BUFFER_CAPACITY],
            // The first capture advances onto slot 0.
            write_pointer: BUFFER_CAPACITY - 1,
            len: 0,
        }
    }

    fn previous(index: usize) -> usize {
        if index == 0 {
            BUFFER_CAPACITY - 1
        } else {
            index - 1
        }
    }

    /// Store a sample, overwriting the oldest once full
    ///
    /// Returns false if the sample was older than the newest one and dropped.
    /// A dropped discontinuity moves onto the newest sample, so the seam is
    /// still snapped over rather than blended.
    pub fn capture(&mut self, sample: PoseSample) -> bool {
        if let Some(newest) = self.newest() {
            if sample.timestamp < newest.timestamp {
                debug!(
                    timestamp = sample.timestamp,
                    newest = newest.timestamp,
                    discontinuity = sample.discontinuity,
                    "Dropping out-of-order pose sample"
                );
                if sample.discontinuity {
                    self.samples[self.write_pointer].discontinuity = true;
                }
                return false;
            }
        }

        self.write_pointer = (self.write_pointer + 1) % BUFFER_CAPACITY;
        self.samples[self.write_pointer] = sample;
        self.len = (self.len + 1).min(BUFFER_CAPACITY);
        true
    }

    pub fn newest(&self) -> Option<&PoseSample> {
        (self.len > 0).then(|| &self.samples[self.write_pointer])
    }

    pub fn write_pointer(&self) -> usize {
        self.write_pointer
    }

    pub fn get(&self, index: usize) -> Option<&PoseSample> {
        self.samples.get(index)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Filled samples from newest to oldest
    pub fn iter_newest_first(&self) -> impl Iterator<Item = &PoseSample> + '_ {
        let mut index = self.write_pointer;
        (0..self.len).map(move |_| {
            let sample = &self.samples[index];
            index = Self::previous(index);
            sample
        })
    }

    /// Find slot indices `(left, right)` whose timestamps bracket `time`
    ///
    /// Scans from the newest pair backwards and returns the first pair with
    /// `left <= time <= right`. When no pair brackets `time` the newest pair is
    /// returned. With a single sample both indices point at it.
    pub fn bracket(&self, time: f32) -> Option<(usize, usize)> {
        match self.len {
            0 => None,
            1 => Some((self.write_pointer, self.write_pointer)),
            len => {
                let mut newer = self.write_pointer;
                let mut older = Self::previous(newer);
                let fallback = (older, newer);

                for _ in 0..len - 1 {
                    if self.samples[older].timestamp <= time && time <= self.samples[newer].timestamp {
                        return Some((older, newer));
                    }
                    newer = older;
                    older = Self::previous(older);
                }

                Some(fallback)
            }
        }
    }

    /// Interpolate the buffered pose at `time`
    ///
    /// Snaps fully to the right sample when it carries a discontinuity.
    pub fn sample(&self, time: f32) -> Option<InterpolatedPose> {
        let (left, right) = self.bracket(time)?;
        let l = &self.samples[left];
        let r = &self.samples[right];

        let factor = if r.discontinuity {
            1.0
        } else {
            inverse_lerp(l.timestamp, r.timestamp, time)
        };

        Some(InterpolatedPose {
            position: l.position.lerp(r.position, factor),
            rotation: l.rotation.slerp(r.rotation, factor),
            factor,
            left,
            right,
        })
    }
}
