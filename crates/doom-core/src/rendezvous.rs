// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reusable N-party rendezvous with timeout and breakage.
//!
//! `std::sync::Barrier` can neither time out nor be torn down while threads
//! wait on it. The barrier engine needs both: a stalled step must surface as
//! an error, and shutdown or cancellation must release every parked worker.
//! Once broken, a rendezvous stays broken; callers build a fresh one.
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Longest single park while waiting, so abort predicates are re-checked.
const ABORT_POLL: Duration = Duration::from_millis(10);

/// Why a wait did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RendezvousError {
    /// This caller's deadline passed; the rendezvous is now broken.
    #[error("rendezvous timed out")]
    Timeout,
    /// Another party broke the rendezvous.
    #[error("rendezvous broken")]
    Broken,
    /// This caller's abort predicate fired; the rendezvous is now broken.
    #[error("rendezvous aborted")]
    Aborted,
}

#[derive(Debug)]
struct State {
    arrived: usize,
    generation: u64,
    broken: bool,
}

/// Generation-counted barrier for a fixed number of parties.
#[derive(Debug)]
pub struct Rendezvous {
    parties: usize,
    state: Mutex<State>,
    cvar: Condvar,
}

impl Rendezvous {
    /// Barrier for `parties` participants (at least one).
    pub fn new(parties: usize) -> Self {
        Self {
            parties: parties.max(1),
            state: Mutex::new(State {
                arrived: 0,
                generation: 0,
                broken: false,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Number of participants per generation.
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Waits until every party has arrived.
    ///
    /// Returns `Ok(true)` for the party that completed the generation.
    /// `timeout` of `None` waits until completion, breakage, or `abort`.
    ///
    /// # Errors
    /// See [`RendezvousError`]. Timeout and abort break the rendezvous for
    /// everyone else.
    pub fn wait(
        &self,
        timeout: Option<Duration>,
        abort: &dyn Fn() -> bool,
    ) -> Result<bool, RendezvousError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();
        if state.broken {
            return Err(RendezvousError::Broken);
        }
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return Ok(true);
        }

        let generation = state.generation;
        loop {
            if state.generation != generation {
                return Ok(false);
            }
            if state.broken {
                return Err(RendezvousError::Broken);
            }
            if abort() {
                Self::break_locked(&mut state, &self.cvar);
                return Err(RendezvousError::Aborted);
            }
            let slice = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        Self::break_locked(&mut state, &self.cvar);
                        return Err(RendezvousError::Timeout);
                    }
                    (d - now).min(ABORT_POLL)
                }
                None => ABORT_POLL,
            };
            state = self
                .cvar
                .wait_timeout(state, slice)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    /// Breaks the rendezvous, waking every waiter with
    /// [`RendezvousError::Broken`].
    pub fn break_barrier(&self) {
        let mut state = self.lock();
        Self::break_locked(&mut state, &self.cvar);
    }

    /// Whether the rendezvous has been broken.
    pub fn is_broken(&self) -> bool {
        self.lock().broken
    }

    fn break_locked(state: &mut State, cvar: &Condvar) {
        state.broken = true;
        cvar.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn never() -> bool {
        false
    }

    #[test]
    fn single_party_passes_through() {
        let r = Rendezvous::new(1);
        assert_eq!(r.wait(None, &never), Ok(true));
        assert_eq!(r.wait(None, &never), Ok(true));
    }

    #[test]
    fn generations_release_everyone_repeatedly() {
        let r = Arc::new(Rendezvous::new(4));
        let leaders = Arc::new(AtomicUsize::new(0));
        std::thread::scope(|s| {
            for _ in 0..4 {
                let r = Arc::clone(&r);
                let leaders = Arc::clone(&leaders);
                s.spawn(move || {
                    for _ in 0..10 {
                        if r.wait(Some(Duration::from_secs(5)), &never).unwrap() {
                            leaders.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });
        assert_eq!(leaders.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn timeout_breaks_for_other_waiters() {
        let r = Arc::new(Rendezvous::new(3));
        let other = {
            let r = Arc::clone(&r);
            std::thread::spawn(move || r.wait(None, &never))
        };
        let mine = r.wait(Some(Duration::from_millis(30)), &never);
        assert_eq!(mine, Err(RendezvousError::Timeout));
        assert_eq!(other.join().unwrap(), Err(RendezvousError::Broken));
        assert!(r.is_broken());
        assert_eq!(r.wait(None, &never), Err(RendezvousError::Broken));
    }

    #[test]
    fn abort_predicate_unblocks_waiter() {
        let r = Rendezvous::new(2);
        let flag = AtomicBool::new(false);
        std::thread::scope(|s| {
            let h = s.spawn(|| r.wait(None, &|| flag.load(Ordering::Relaxed)));
            std::thread::sleep(Duration::from_millis(20));
            flag.store(true, Ordering::Relaxed);
            assert_eq!(h.join().unwrap(), Err(RendezvousError::Aborted));
        });
        assert!(r.is_broken());
    }

    #[test]
    fn explicit_break_releases_waiter() {
        let r = Rendezvous::new(2);
        std::thread::scope(|s| {
            let h = s.spawn(|| r.wait(None, &never));
            std::thread::sleep(Duration::from_millis(20));
            r.break_barrier();
            assert_eq!(h.join().unwrap(), Err(RendezvousError::Broken));
        });
    }
}
