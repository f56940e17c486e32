// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Step observation.
//!
//! Engines report to a probe and consult it for exactly one thing: the
//! running "steps since last swap" counter used by convergence detection.
//! Derived metrics over the recorded trajectory are computed elsewhere.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use blake3::Hasher;

use crate::cell::Cell;

/// 32-byte blake3 digest.
pub type Digest = [u8; 32];

/// Immutable record of the array after one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSnapshot<C> {
    step: u64,
    cells: Vec<C>,
    swap_count: usize,
}

impl<C: Cell> StepSnapshot<C> {
    /// Captures a copy of `cells`.
    pub fn new(step: u64, cells: &[C], swap_count: usize) -> Self {
        Self {
            step,
            cells: cells.to_vec(),
            swap_count,
        }
    }

    /// Step number (0 is the initial arrangement).
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Array contents after the step.
    pub fn cells(&self) -> &[C] {
        &self.cells
    }

    /// Swaps executed during the step.
    pub fn swap_count(&self) -> usize {
        self.swap_count
    }

    /// Canonical digest over step, swap count and cell values.
    ///
    /// Encoding: version tag `1u16`, step `u64`, swap count `u64`, cell count
    /// `u64`, then each `value()` as `i64`; all little-endian.
    pub fn digest(&self) -> Digest {
        let mut hasher = Hasher::new();
        hasher.update(&1u16.to_le_bytes());
        hasher.update(&self.step.to_le_bytes());
        hasher.update(&(self.swap_count as u64).to_le_bytes());
        hasher.update(&(self.cells.len() as u64).to_le_bytes());
        for cell in &self.cells {
            hasher.update(&cell.value().to_le_bytes());
        }
        hasher.finalize().into()
    }
}

/// Counter half of the probe contract, shared by executors and convergence.
pub trait ProbeCounters: Send + Sync {
    /// One pair was compared.
    fn record_compare_and_swap(&self);
    /// One swap was denied by a frozen restriction.
    fn count_frozen_swap_attempt(&self);
    /// Consecutive non-initial steps with zero swaps.
    fn steps_since_last_swap(&self) -> u64;
}

/// Full probe contract consumed by engines.
pub trait Probe<C>: ProbeCounters {
    /// Records the array after `step`. Step 0 is the initial arrangement and
    /// does not affect the swap streak.
    fn record_snapshot(&self, step: u64, cells: &[C], swap_count: usize);
    /// Drops snapshots and zeroes every counter.
    fn clear(&self);
}

/// Thread-safe in-memory probe.
///
/// Counters are atomics so evaluating workers can report concurrently; the
/// snapshot list sits behind a mutex.
#[derive(Debug)]
pub struct BasicProbe<C> {
    snapshots: Mutex<Vec<StepSnapshot<C>>>,
    recording: AtomicBool,
    total_swaps: AtomicU64,
    compare_and_swaps: AtomicU64,
    frozen_attempts: AtomicU64,
    streak: AtomicU64,
}

impl<C: Cell> Default for BasicProbe<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Cell> BasicProbe<C> {
    /// Creates a probe with recording enabled.
    pub fn new() -> Self {
        Self::with_recording(true)
    }

    /// Creates a probe with recording set as given.
    pub fn with_recording(recording: bool) -> Self {
        Self {
            snapshots: Mutex::new(Vec::new()),
            recording: AtomicBool::new(recording),
            total_swaps: AtomicU64::new(0),
            compare_and_swaps: AtomicU64::new(0),
            frozen_attempts: AtomicU64::new(0),
            streak: AtomicU64::new(0),
        }
    }

    /// Enables or disables snapshot capture. Counters keep running either way.
    pub fn set_recording(&self, enabled: bool) {
        self.recording.store(enabled, Ordering::Relaxed);
    }

    /// Whether snapshots are being captured.
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    /// Copy of every recorded snapshot, in recording order.
    pub fn snapshots(&self) -> Vec<StepSnapshot<C>> {
        self.lock().clone()
    }

    /// Number of recorded snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.lock().len()
    }

    /// Snapshot for `step`, if recorded.
    pub fn snapshot(&self, step: u64) -> Option<StepSnapshot<C>> {
        self.lock().iter().find(|s| s.step == step).cloned()
    }

    /// Most recent snapshot.
    pub fn last_snapshot(&self) -> Option<StepSnapshot<C>> {
        self.lock().last().cloned()
    }

    /// Swaps reported through snapshots.
    pub fn total_swaps(&self) -> u64 {
        self.total_swaps.load(Ordering::Relaxed)
    }

    /// Compare-and-swap events.
    pub fn compare_and_swap_count(&self) -> u64 {
        self.compare_and_swaps.load(Ordering::Relaxed)
    }

    /// Swaps denied by frozen restrictions.
    pub fn frozen_swap_attempts(&self) -> u64 {
        self.frozen_attempts.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StepSnapshot<C>>> {
        self.snapshots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Cell> ProbeCounters for BasicProbe<C> {
    fn record_compare_and_swap(&self) {
        self.compare_and_swaps.fetch_add(1, Ordering::Relaxed);
    }

    fn count_frozen_swap_attempt(&self) {
        self.frozen_attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn steps_since_last_swap(&self) -> u64 {
        self.streak.load(Ordering::Acquire)
    }
}

impl<C: Cell> Probe<C> for BasicProbe<C> {
    fn record_snapshot(&self, step: u64, cells: &[C], swap_count: usize) {
        if step > 0 {
            if swap_count == 0 {
                self.streak.fetch_add(1, Ordering::AcqRel);
            } else {
                self.streak.store(0, Ordering::Release);
            }
        }
        self.total_swaps
            .fetch_add(swap_count as u64, Ordering::Relaxed);
        if self.is_recording() {
            self.lock().push(StepSnapshot::new(step, cells, swap_count));
        }
    }

    fn clear(&self) {
        self.lock().clear();
        self.total_swaps.store(0, Ordering::Relaxed);
        self.compare_and_swaps.store(0, Ordering::Relaxed);
        self.frozen_attempts.store(0, Ordering::Relaxed);
        self.streak.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streak_counts_quiet_steps_and_ignores_step_zero() {
        let probe = BasicProbe::<i32>::new();
        probe.record_snapshot(0, &[1, 2], 0);
        assert_eq!(probe.steps_since_last_swap(), 0);
        probe.record_snapshot(1, &[1, 2], 0);
        probe.record_snapshot(2, &[1, 2], 0);
        assert_eq!(probe.steps_since_last_swap(), 2);
        probe.record_snapshot(3, &[2, 1], 1);
        assert_eq!(probe.steps_since_last_swap(), 0);
        assert_eq!(probe.total_swaps(), 1);
        assert_eq!(probe.snapshot_count(), 4);
    }

    #[test]
    fn streak_runs_with_recording_disabled() {
        let probe = BasicProbe::<i32>::with_recording(false);
        probe.record_snapshot(1, &[1], 0);
        probe.record_snapshot(2, &[1], 0);
        assert_eq!(probe.steps_since_last_swap(), 2);
        assert_eq!(probe.snapshot_count(), 0);
    }

    #[test]
    fn clear_zeroes_everything() {
        let probe = BasicProbe::<i32>::new();
        probe.record_compare_and_swap();
        probe.count_frozen_swap_attempt();
        probe.record_snapshot(1, &[3, 4], 0);
        probe.clear();
        assert_eq!(probe.compare_and_swap_count(), 0);
        assert_eq!(probe.frozen_swap_attempts(), 0);
        assert_eq!(probe.steps_since_last_swap(), 0);
        assert!(probe.last_snapshot().is_none());
    }

    #[test]
    fn digest_tracks_contents() {
        let a = StepSnapshot::new(4, &[1_i32, 2, 3], 1);
        let b = StepSnapshot::new(4, &[1_i32, 2, 3], 1);
        let c = StepSnapshot::new(4, &[1_i32, 3, 2], 1);
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(hex::encode(a.digest()).len(), 64);
    }

    #[test]
    fn snapshot_lookup_by_step() {
        let probe = BasicProbe::<i32>::new();
        probe.record_snapshot(0, &[2, 1], 0);
        probe.record_snapshot(1, &[1, 2], 1);
        assert_eq!(probe.snapshot(1).map(|s| s.cells().to_vec()), Some(vec![1, 2]));
        assert!(probe.snapshot(7).is_none());
    }
}
