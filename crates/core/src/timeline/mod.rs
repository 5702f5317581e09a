//! Cooperative frame scheduling.
//!
//! Loops never block and never spin on their own: each one asks the
//! scheduler for the next frame, reacts when a [`FrameTick`] containing its
//! request arrives, and asks again. Cancelling the outstanding request is how
//! a loop stops.

use std::collections::BTreeSet;

/// Default frame interval, one display refresh at 60 Hz.
pub const DEFAULT_FRAME_INTERVAL: f64 = 1.0 / 60.0;

/// Identity of one outstanding frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(u64);

/// Host-side "call me on the next frame" facility.
pub trait FrameScheduler {
    /// Registers interest in the next frame.
    fn request_frame(&mut self) -> FrameId;

    /// Withdraws a request. Returns `false` when `id` was not pending.
    fn cancel_frame(&mut self, id: FrameId) -> bool;
}

/// The requests fired on one frame, with the clock reading for it.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTick {
    pub index: u64,
    pub time_seconds: f64,
    pub delta_seconds: f64,
    fired: Vec<FrameId>,
}

impl FrameTick {
    /// Whether the request `id` fires on this frame.
    pub fn fires(&self, id: FrameId) -> bool {
        self.fired.binary_search(&id).is_ok()
    }

    pub fn fired(&self) -> &[FrameId] {
        &self.fired
    }
}

/// Deterministic frame clock: time only moves when [`FrameClock::next_frame`]
/// is called, by exactly one interval.
#[derive(Debug)]
pub struct FrameClock {
    interval: f64,
    time_seconds: f64,
    frame_index: u64,
    next_id: u64,
    pending: BTreeSet<FrameId>,
    requested: u64,
    cancelled: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::with_interval(DEFAULT_FRAME_INTERVAL)
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(interval: f64) -> Self {
        Self {
            interval: interval.max(0.0),
            time_seconds: 0.0,
            frame_index: 0,
            next_id: 1,
            pending: BTreeSet::new(),
            requested: 0,
            cancelled: 0,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn time_seconds(&self) -> f64 {
        self.time_seconds
    }

    /// Advances one interval and fires every pending request.
    pub fn next_frame(&mut self) -> FrameTick {
        self.time_seconds += self.interval;
        self.frame_index += 1;
        let fired: Vec<FrameId> = std::mem::take(&mut self.pending).into_iter().collect();
        FrameTick {
            index: self.frame_index,
            time_seconds: self.time_seconds,
            delta_seconds: self.interval,
            fired,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: FrameId) -> bool {
        self.pending.contains(&id)
    }

    /// Total requests made so far.
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Total requests successfully cancelled so far.
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameScheduler for FrameClock {
    fn request_frame(&mut self) -> FrameId {
        let id = FrameId(self.next_id);
        self.next_id += 1;
        self.requested += 1;
        self.pending.insert(id);
        id
    }

    fn cancel_frame(&mut self, id: FrameId) -> bool {
        let removed = self.pending.remove(&id);
        if removed {
            self.cancelled += 1;
        }
        removed
    }
}
