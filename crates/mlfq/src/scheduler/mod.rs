//! Three-band MLFQ scheduler.
//!
//! ## Scheduling Policy
//!
//! 1. Admission places a ready thread into the queue of its priority band
//! 2. Admission into L1 may ask the running thread to yield
//! 3. Aging boosts threads that waited too long, moving them up a band when
//!    their priority crosses a boundary
//! 4. Dispatch takes the head of L1, then L2, then L3
//!
//! Every entry point takes a [`CriticalSection`](critical_section::CriticalSection)
//! token: the scheduler must only run with interrupts disabled.

use alloc::string::ToString;
use core::fmt;

use log::{debug, info};

use crate::config::SchedConfig;
use crate::policy::{BurstComparison, PreemptPolicy};
use crate::queue::{Band, ReadyQueues};
use crate::thread::{Thread, ThreadRef};
use crate::time::Tick;
use crate::trace::{records, Payload, TraceHook};

mod admission;
mod aging;
mod dispatch;

/// Counters for scheduler activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedStats {
    /// Threads admitted through `ready_to_run`.
    pub admissions: u64,
    /// Context switches performed by `run`.
    pub context_switches: u64,
    /// Priority boosts applied by aging.
    pub promotions: u64,
    /// Band changes caused by aging.
    pub migrations: u64,
    /// Yield requests delivered to running threads.
    pub preempt_requests: u64,
    /// Finished threads handed back for destruction.
    pub reclaimed: u64,
}

/// MLFQ scheduler.
///
/// Owns the ready queues and the single pending-destroy slot. Generic over
/// the strategy deciding L1-versus-L1 preemption.
pub struct Scheduler<P = BurstComparison> {
    queues: ReadyQueues,
    pending_destroy: Option<ThreadRef>,
    config: SchedConfig,
    policy: P,
    stats: SchedStats,
    trace: Option<TraceHook>,
}

impl Scheduler<BurstComparison> {
    /// Creates a scheduler preempting on strictly shorter burst estimates.
    pub fn new(config: SchedConfig) -> Self {
        Self::with_policy(config, BurstComparison)
    }
}

impl Default for Scheduler<BurstComparison> {
    fn default() -> Self {
        Self::new(SchedConfig::default())
    }
}

impl<P: PreemptPolicy> Scheduler<P> {
    /// Creates a scheduler with a custom preemption strategy.
    pub fn with_policy(config: SchedConfig, policy: P) -> Self {
        Self {
            queues: ReadyQueues::new(),
            pending_destroy: None,
            config,
            policy,
            stats: SchedStats::default(),
            trace: None,
        }
    }

    /// Sets the trace hook for scheduler events.
    pub fn set_trace_hook(&mut self, trace: Option<TraceHook>) {
        self.trace = trace;
    }

    /// Returns the aging configuration.
    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    /// Returns the preemption policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Returns a copy of the running counters.
    pub fn stats(&self) -> SchedStats {
        self.stats
    }

    /// Ready queues, read-only.
    pub fn queues(&self) -> &ReadyQueues {
        &self.queues
    }

    /// Number of ready threads across all bands.
    pub fn ready_count(&self) -> usize {
        self.queues.len()
    }

    /// Finished thread awaiting reclamation, if any.
    pub fn pending_destroy(&self) -> Option<&ThreadRef> {
        self.pending_destroy.as_ref()
    }

    /// Logs the contents of every ready queue.
    pub fn print(&self) {
        for line in self.to_string().lines() {
            info!(target: "mlfq", "{line}");
        }
    }

    fn enqueue(&mut self, now: Tick, thread: ThreadRef) -> Band {
        let id = thread.id();
        let band = self.queues.insert(thread);
        debug!(target: "mlfq", "[A] Tick [{now}]: Thread [{id}] is inserted into queue {band}");
        self.emit_record(records::QUEUE_INSERT, &Payload::new(now, id).u8(band.index() as u8));
        band
    }

    fn dequeue(&mut self, now: Tick, thread: &Thread) -> Option<ThreadRef> {
        let band = thread.queued_band()?;
        let removed = self.queues.remove(thread)?;
        self.note_removed(now, band, thread);
        Some(removed)
    }

    fn note_removed(&self, now: Tick, band: Band, thread: &Thread) {
        let id = thread.id();
        debug!(target: "mlfq", "[B] Tick [{now}]: Thread [{id}] is removed from queue {band}");
        self.emit_record(records::QUEUE_REMOVE, &Payload::new(now, id).u8(band.index() as u8));
    }

    fn emit_record(&self, record: u8, payload: &Payload) {
        if let Some(trace) = &self.trace {
            let _ = trace(record, payload.as_bytes(), true);
        }
    }
}

impl<P> fmt::Display for Scheduler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ready list contents:")?;
        for band in Band::ALL {
            let queue = self.queues.queue(band);
            write!(f, "  {band} [{}]:", queue.len())?;
            for thread in queue.iter() {
                write!(
                    f,
                    " {}(prio {}, burst {})",
                    thread.id(),
                    thread.priority(),
                    thread.burst_time()
                )?;
            }
            writeln!(f)?;
        }
        match &self.pending_destroy {
            Some(thread) => writeln!(f, "  pending destroy: {}", thread.id()),
            None => writeln!(f, "  pending destroy: none"),
        }
    }
}

impl<P> fmt::Debug for Scheduler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("ready", &self.queues.len())
            .field("pending_destroy", &self.pending_destroy.as_ref().map(|t| t.id()))
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    use spin::Mutex;

    use crate::cpu::{Machine, SwitchOutcome};
    use crate::thread::{Priority, Thread, ThreadConfig, ThreadId, ThreadRef};
    use crate::trace::TraceHook;

    pub fn thread(id: u32, priority: u8, burst: u64) -> ThreadRef {
        Thread::new(ThreadConfig::new(ThreadId(id), Priority::new(priority).unwrap()).with_burst_time(burst))
    }

    pub type Records = Arc<Mutex<Vec<(u8, Vec<u8>)>>>;

    pub fn recording_hook() -> (TraceHook, Records) {
        let records: Records = Arc::new(Mutex::new(Vec::new()));
        let hook_records = Arc::clone(&records);
        let hook: TraceHook = Arc::new(move |id, payload, _timestamp| {
            hook_records.lock().push((id, payload.to_vec()));
            Ok(())
        });
        (hook, records)
    }

    /// Machine that records switches and destructions.
    pub struct LogMachine {
        pub outcome: SwitchOutcome,
        pub switches: Vec<(ThreadId, ThreadId)>,
        pub destroyed: Vec<ThreadId>,
    }

    impl LogMachine {
        pub fn new(outcome: SwitchOutcome) -> Self {
            Self {
                outcome,
                switches: Vec::new(),
                destroyed: Vec::new(),
            }
        }
    }

    impl Machine for LogMachine {
        fn switch_to(&mut self, from: &ThreadRef, to: &ThreadRef) -> SwitchOutcome {
            self.switches.push((from.id(), to.id()));
            self.outcome
        }

        fn destroy(&mut self, thread: ThreadRef) {
            self.destroyed.push(thread.id());
        }
    }
}
