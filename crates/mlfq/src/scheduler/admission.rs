//! Admission of ready threads and preemption requests.

use alloc::sync::Arc;

use critical_section::CriticalSection;
use log::debug;

use super::Scheduler;
use crate::policy::PreemptPolicy;
use crate::queue::Band;
use crate::thread::{Thread, ThreadRef};
use crate::time::Tick;
use crate::trace::{records, Payload};

impl<P: PreemptPolicy> Scheduler<P> {
    /// Marks `thread` ready and queues it in the band of its current
    /// priority.
    ///
    /// Landing in L1 may set the preemption flag of `running`, the thread on
    /// the CPU. The flag is only a request: `running` keeps the CPU until it
    /// reaches a safe point.
    ///
    /// # Panics
    ///
    /// Panics if `thread` is already queued.
    pub fn ready_to_run(&mut self, _cs: CriticalSection<'_>, now: Tick, running: &Thread, thread: ThreadRef) {
        thread.mark_ready(now);
        self.stats.admissions += 1;
        self.admit(now, running, thread);
    }

    /// Queues a thread whose ready stamp is already current. Shared with
    /// band-crossing promotion, which counts as an admission.
    pub(super) fn admit(&mut self, now: Tick, running: &Thread, thread: ThreadRef) {
        let band = self.enqueue(now, Arc::clone(&thread));
        if band == Band::L1 {
            self.check_preemption(now, running, &thread);
        }
    }

    fn check_preemption(&mut self, now: Tick, running: &Thread, candidate: &Thread) {
        // A queued running thread is in the middle of yielding.
        if running.id() == candidate.id() || running.is_queued() {
            return;
        }

        let preempt = if running.priority().band() == Band::L1 {
            self.policy.should_preempt(running, candidate, now)
        } else {
            running.id() != self.config.idle_thread
        };

        if preempt {
            running.request_preempt();
            self.stats.preempt_requests += 1;
            debug!(
                target: "mlfq",
                "[D] Tick [{now}]: Thread [{}] is asked to yield to thread [{}]",
                running.id(),
                candidate.id()
            );
            self.emit_record(
                records::PREEMPT_REQUEST,
                &Payload::new(now, running.id()).u32(candidate.id().0),
            );
        }
    }
}
