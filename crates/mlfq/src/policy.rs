//! Preemption strategies for L1 admissions.
//!
//! When a thread lands in L1 while another L1 thread is running, the
//! scheduler asks a [`PreemptPolicy`] whether the running thread should be
//! asked to yield. Threads running below L1 are always asked (unless idle),
//! so the policy only ever arbitrates between two L1 threads.

use crate::thread::Thread;
use crate::time::Tick;

/// Decides whether an L1 admission preempts a running L1 thread.
pub trait PreemptPolicy {
    /// Returns true if `running` should give up the CPU for `candidate`.
    fn should_preempt(&self, running: &Thread, candidate: &Thread, now: Tick) -> bool;
}

/// Preempts when the candidate's burst estimate is strictly shorter than the
/// running thread's.
#[derive(Debug, Clone, Copy, Default)]
pub struct BurstComparison;

impl PreemptPolicy for BurstComparison {
    fn should_preempt(&self, running: &Thread, candidate: &Thread, _now: Tick) -> bool {
        candidate.burst_time() < running.burst_time()
    }
}

/// Preempts when the candidate's burst estimate is strictly shorter than a
/// prediction of the running thread's burst.
///
/// The prediction averages the ticks the running thread has already spent in
/// its current burst with its burst estimate, so a thread that has run well
/// past its estimate becomes easier to preempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictedBurst;

impl PredictedBurst {
    /// Predicted length of `running`'s current burst at `now`.
    pub fn predict(running: &Thread, now: Tick) -> u64 {
        (running.burst_progress(now) + running.burst_time()) / 2
    }
}

impl PreemptPolicy for PredictedBurst {
    fn should_preempt(&self, running: &Thread, candidate: &Thread, now: Tick) -> bool {
        candidate.burst_time() < Self::predict(running, now)
    }
}

impl<P: PreemptPolicy + ?Sized> PreemptPolicy for &P {
    fn should_preempt(&self, running: &Thread, candidate: &Thread, now: Tick) -> bool {
        (**self).should_preempt(running, candidate, now)
    }
}
