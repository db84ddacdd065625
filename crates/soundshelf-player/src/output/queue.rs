//! Bounded interleaved `f32` queue connecting the pipeline stages.
//!
//! decode -> [queue] -> resample -> [queue] -> output callback
//!
//! Producers block while the queue is full, the output callback never blocks. Closing the
//! queue wakes everybody: pushes stop accepting data and pops drain what is left.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub(crate) struct SampleQueue {
    channels: usize,
    /// Capacity in samples.
    capacity: usize,
    inner: Mutex<Inner>,
    changed: Condvar,
}

struct Inner {
    samples: VecDeque<f32>,
    closed: bool,
}

/// Capacity in samples holding `seconds` of audio; invalid durations fall back to 2 s.
pub(crate) fn capacity_for(rate_hz: u32, channels: usize, seconds: f32) -> usize {
    let seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        2.0
    };
    let frames = (rate_hz as f32 * seconds).ceil() as usize;
    frames.saturating_mul(channels)
}

impl SampleQueue {
    pub(crate) fn new(channels: usize, capacity: usize) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            capacity: capacity.max(channels),
            inner: Mutex::new(Inner {
                samples: VecDeque::new(),
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn for_duration(rate_hz: u32, channels: usize, seconds: f32) -> Self {
        Self::new(channels, capacity_for(rate_hz, channels, seconds))
    }

    pub(crate) fn channels(&self) -> usize {
        self.channels
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Inner>) -> MutexGuard<'a, Inner> {
        self.changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop accepting samples and wake all waiters. Idempotent.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_all();
    }

    /// Append samples, blocking while full. Returns `false` if the queue was closed
    /// before everything was accepted.
    pub(crate) fn push(&self, samples: &[f32]) -> bool {
        let mut rest = samples;
        while !rest.is_empty() {
            let mut inner = self.lock();
            while inner.samples.len() >= self.capacity && !inner.closed {
                inner = self.wait(inner);
            }
            if inner.closed {
                return false;
            }
            let room = self.capacity - inner.samples.len();
            let (now, later) = rest.split_at(room.min(rest.len()));
            inner.samples.extend(now.iter().copied());
            rest = later;
            drop(inner);
            self.changed.notify_all();
        }
        true
    }

    /// Block until exactly `frames` frames are available. `None` once closed with fewer
    /// left; the remainder stays queued for [`SampleQueue::pop_up_to`].
    pub(crate) fn pop_exact(&self, frames: usize) -> Option<Vec<f32>> {
        let want = frames * self.channels;
        let mut inner = self.lock();
        while inner.samples.len() < want && !inner.closed {
            inner = self.wait(inner);
        }
        if inner.samples.len() < want {
            return None;
        }
        Some(self.take(inner, want))
    }

    /// Block until any whole frame is available, then take up to `max_frames`.
    pub(crate) fn pop_up_to(&self, max_frames: usize) -> Option<Vec<f32>> {
        let mut inner = self.lock();
        while inner.samples.len() < self.channels && !inner.closed {
            inner = self.wait(inner);
        }
        let frames = (inner.samples.len() / self.channels).min(max_frames);
        if frames == 0 {
            return None;
        }
        Some(self.take(inner, frames * self.channels))
    }

    /// Take up to `max_frames` without waiting. `None` when nothing is ready.
    pub(crate) fn try_pop(&self, max_frames: usize) -> Option<Vec<f32>> {
        let inner = self.lock();
        let frames = (inner.samples.len() / self.channels).min(max_frames);
        if frames == 0 {
            return None;
        }
        Some(self.take(inner, frames * self.channels))
    }

    fn take(&self, mut inner: MutexGuard<'_, Inner>, samples: usize) -> Vec<f32> {
        let out: Vec<f32> = inner.samples.drain(..samples).collect();
        drop(inner);
        self.changed.notify_all();
        out
    }

    /// Block until the queue is closed and empty (`true`) or `cancel` is set (`false`).
    pub(crate) fn wait_drained(&self, cancel: &AtomicBool) -> bool {
        let mut inner = self.lock();
        loop {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            if inner.closed && inner.samples.is_empty() {
                return true;
            }
            inner = self
                .changed
                .wait_timeout(inner, Duration::from_millis(50))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
