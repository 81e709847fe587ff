//! Priority aging.
//!
//! A ready thread's wait is `(now - ready_at) + waiting_credit`. Each time it
//! reaches the configured threshold, the threshold is consumed from the credit
//! and the priority rises by one step. A boost that crosses a band boundary
//! moves the thread: the elapsed ready interval is folded into the credit,
//! `ready_at` restarts at `now`, and the thread is admitted to its new band,
//! which for L1 includes the preemption check.

use critical_section::CriticalSection;
use log::debug;

use super::Scheduler;
use crate::policy::PreemptPolicy;
use crate::queue::Band;
use crate::thread::{Thread, ThreadRef};
use crate::time::Tick;
use crate::trace::{records, Payload};

impl<P: PreemptPolicy> Scheduler<P> {
    /// Runs one aging sweep over every ready thread.
    ///
    /// Membership is captured before any thread is touched, so a thread
    /// promoted into a band that is visited later is not aged twice.
    pub fn aging(&mut self, _cs: CriticalSection<'_>, now: Tick, running: &Thread) {
        for (band, thread) in self.queues.snapshot() {
            self.age(now, running, band, thread);
        }
    }

    fn age(&mut self, now: Tick, running: &Thread, band: Band, thread: ThreadRef) {
        let Some((old, new)) = thread.consume_wait(now, self.config.aging_threshold, self.config.aging_step) else {
            return;
        };

        if new != old {
            self.stats.promotions += 1;
            debug!(
                target: "mlfq",
                "[C] Tick [{now}]: Thread [{}] changes its priority from [{old}] to [{new}]",
                thread.id()
            );
            self.emit_record(
                records::PRIORITY_CHANGE,
                &Payload::new(now, thread.id()).u8(old.get()).u8(new.get()),
            );
        }

        let target = new.band();
        if target != band {
            let moved = self.dequeue(now, &thread);
            assert!(moved.is_some(), "thread {} vanished from {band} during aging", thread.id());
            thread.accrue_wait(now);
            thread.restamp_ready(now);
            self.stats.migrations += 1;
            self.admit(now, running, thread);
        } else if band == Band::L2 && new != old {
            self.queues.reposition(&thread);
        }
    }
}
