//! Thread selection, context switching and deferred destruction.

use alloc::sync::Arc;

use critical_section::CriticalSection;
use log::{debug, trace};

use super::Scheduler;
use crate::cpu::{Cpu, Machine, SwitchOutcome};
use crate::policy::PreemptPolicy;
use crate::thread::ThreadRef;
use crate::time::Tick;
use crate::trace::{records, Payload};

impl<P: PreemptPolicy> Scheduler<P> {
    /// Removes and returns the next thread to run: the head of L1, else L2,
    /// else L3. Returns `None` when nothing is ready.
    ///
    /// The selected thread's current ready interval is added to its waiting
    /// credit before it leaves the queue.
    pub fn find_next_to_run(&mut self, _cs: CriticalSection<'_>, now: Tick) -> Option<ThreadRef> {
        let (band, thread) = self.queues.pop_front()?;
        thread.accrue_wait(now);
        self.note_removed(now, band, &thread);
        Some(thread)
    }

    /// Hands the CPU from its current thread to `next`.
    ///
    /// The caller has already updated the outgoing thread's status (ready,
    /// blocked or finished). With `finishing` set, the outgoing thread is
    /// parked in the pending-destroy slot and reclaimed after the switch,
    /// once no longer running on its own stack.
    ///
    /// On [`SwitchOutcome::Resumed`] this reclaims any pending thread and
    /// restores the outgoing thread's user state before returning. On
    /// [`SwitchOutcome::Entered`] both are left to the entered thread.
    ///
    /// # Panics
    ///
    /// Panics if `next` is still queued, or if `finishing` is set while
    /// another finished thread is awaiting reclamation.
    pub fn run<M: Machine>(
        &mut self,
        cs: CriticalSection<'_>,
        now: Tick,
        cpu: &mut Cpu<M>,
        next: ThreadRef,
        finishing: bool,
    ) -> SwitchOutcome {
        assert!(
            !next.is_queued(),
            "thread {} dispatched while still queued in {:?}",
            next.id(),
            next.queued_band()
        );

        let old = Arc::clone(cpu.current());
        let executed = old.charge(now);
        next.start(now);

        if finishing {
            self.defer_destroy(&old);
        }
        old.save_user_state();

        cpu.replace_current(Arc::clone(&next));
        self.stats.context_switches += 1;
        debug!(
            target: "mlfq",
            "[E] Tick [{now}]: Thread [{}] is now selected for execution, thread [{}] is replaced, and it has executed [{executed}] ticks",
            next.id(),
            old.id()
        );
        self.emit_record(
            records::DISPATCH,
            &Payload::new(now, next.id()).u32(old.id().0).u64(executed),
        );

        let outcome = cpu.switch_from(&old);
        if outcome == SwitchOutcome::Resumed {
            self.check_to_be_destroyed(cs, now, cpu.machine_mut());
            if !finishing {
                old.restore_user_state();
            }
        }
        outcome
    }

    /// Reclaims the thread left in the pending-destroy slot, if any.
    ///
    /// Called after every switch by whichever thread ends up running: the
    /// resumed caller of [`run`](Self::run), or a freshly entered thread's
    /// begin routine.
    pub fn check_to_be_destroyed<M: Machine + ?Sized>(&mut self, _cs: CriticalSection<'_>, now: Tick, machine: &mut M) {
        if let Some(thread) = self.pending_destroy.take() {
            trace!(target: "mlfq", "Tick [{now}]: Thread [{}] is reclaimed", thread.id());
            self.stats.reclaimed += 1;
            self.emit_record(records::RECLAIM, &Payload::new(now, thread.id()));
            machine.destroy(thread);
        }
    }

    fn defer_destroy(&mut self, thread: &ThreadRef) {
        if let Some(pending) = &self.pending_destroy {
            panic!(
                "thread {} finished while thread {} is still awaiting destruction",
                thread.id(),
                pending.id()
            );
        }
        self.pending_destroy = Some(Arc::clone(thread));
    }
}
