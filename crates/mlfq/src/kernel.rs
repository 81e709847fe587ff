//! Thread-layer facade driving the scheduler.
//!
//! [`Kernel`] owns the scheduler, the CPU and the tick source and exposes the
//! paths a kernel's thread layer takes through the scheduler: admitting new
//! or woken threads, yielding, blocking, finishing, and the periodic timer
//! that drives aging. Each path runs inside `critical_section::with`.

use alloc::sync::Arc;

use critical_section::CriticalSection;
use log::debug;

use crate::config::SchedConfig;
use crate::cpu::{Cpu, Machine, SwitchOutcome};
use crate::error::SchedError;
use crate::policy::{BurstComparison, PreemptPolicy};
use crate::scheduler::Scheduler;
use crate::thread::{Thread, ThreadRef, ThreadStatus};
use crate::time::{Clock, Tick};
use crate::trace::TraceHook;

/// Builder for constructing a [`Kernel`].
pub struct KernelBuilder<P = BurstComparison> {
    config: SchedConfig,
    policy: P,
    trace: Option<TraceHook>,
}

impl KernelBuilder<BurstComparison> {
    /// Creates a builder with the default configuration and policy.
    pub fn new() -> Self {
        Self {
            config: SchedConfig::default(),
            policy: BurstComparison,
            trace: None,
        }
    }
}

impl Default for KernelBuilder<BurstComparison> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PreemptPolicy> KernelBuilder<P> {
    /// Replaces the scheduler configuration.
    pub fn config(mut self, config: SchedConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the L1 preemption strategy.
    pub fn policy<Q: PreemptPolicy>(self, policy: Q) -> KernelBuilder<Q> {
        KernelBuilder {
            config: self.config,
            policy,
            trace: self.trace,
        }
    }

    /// Sets the trace hook for scheduler events.
    pub fn with_trace_hook(mut self, hook: TraceHook) -> Self {
        self.trace = Some(hook);
        self
    }

    /// Builds the kernel. The bootstrap thread is running when this returns.
    pub fn build<M: Machine, C: Clock>(self, machine: M, clock: C) -> Result<Kernel<M, C, P>, SchedError> {
        self.config.validate()?;

        let now = clock.now();
        let bootstrap = Thread::bootstrap();
        bootstrap.start(now);

        let mut scheduler = Scheduler::with_policy(self.config, self.policy);
        scheduler.set_trace_hook(self.trace);

        Ok(Kernel {
            scheduler,
            cpu: Cpu::new(bootstrap, machine),
            clock,
            last_aging: now,
        })
    }
}

/// Uniprocessor kernel built around the MLFQ scheduler.
pub struct Kernel<M, C, P = BurstComparison> {
    scheduler: Scheduler<P>,
    cpu: Cpu<M>,
    clock: C,
    last_aging: Tick,
}

impl Kernel<(), (), BurstComparison> {
    /// Creates a new kernel builder.
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }
}

impl<M: Machine, C: Clock, P: PreemptPolicy> Kernel<M, C, P> {
    /// Thread currently on the CPU.
    pub fn current(&self) -> &ThreadRef {
        self.cpu.current()
    }

    /// Returns a reference to the scheduler.
    pub fn scheduler(&self) -> &Scheduler<P> {
        &self.scheduler
    }

    /// Returns the tick source.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Returns the underlying machine.
    pub fn machine(&self) -> &M {
        self.cpu.machine()
    }

    /// Returns the underlying machine, mutably.
    pub fn machine_mut(&mut self) -> &mut M {
        self.cpu.machine_mut()
    }

    /// Admits a newly created thread.
    pub fn admit(&mut self, thread: ThreadRef) {
        let now = self.clock.now();
        critical_section::with(|cs| self.scheduler.ready_to_run(cs, now, self.cpu.current(), thread));
    }

    /// Makes a blocked thread ready again.
    ///
    /// # Panics
    ///
    /// Panics if the thread is not blocked.
    pub fn wake(&mut self, thread: ThreadRef) {
        assert_eq!(
            thread.status(),
            ThreadStatus::Blocked,
            "thread {} woken while not blocked",
            thread.id()
        );
        self.admit(thread);
    }

    /// Gives the CPU to the next ready thread, if any, and queues the current
    /// thread behind it. Returns false if nothing else was ready.
    pub fn yield_now(&mut self) -> bool {
        critical_section::with(|cs| {
            let now = self.clock.now();
            let Some(next) = self.scheduler.find_next_to_run(cs, now) else {
                return false;
            };
            let current = Arc::clone(self.cpu.current());
            current.extend_burst(now);
            self.scheduler.ready_to_run(cs, now, &current, Arc::clone(&current));
            self.switch(cs, now, next, false);
            true
        })
    }

    /// Ends the current thread's CPU burst and blocks it.
    ///
    /// Idles through [`Machine::idle`] until a thread is ready. If the machine
    /// cannot idle, the current thread keeps the CPU and
    /// [`SchedError::NoRunnableThread`] is returned.
    pub fn block_current(&mut self) -> Result<(), SchedError> {
        critical_section::with(|cs| {
            let current = Arc::clone(self.cpu.current());
            current.set_status(ThreadStatus::Blocked);
            let next = self.next_or_idle(cs).inspect_err(|_| current.set_status(ThreadStatus::Running))?;

            let now = self.clock.now();
            let estimate = current.complete_burst(now);
            debug!(target: "mlfq", "Tick [{now}]: Thread [{}] blocks, next burst estimate [{estimate}]", current.id());
            self.switch(cs, now, next, false);
            Ok(())
        })
    }

    /// Finishes the current thread. It is reclaimed once the CPU has moved
    /// to another thread.
    pub fn finish_current(&mut self) -> Result<(), SchedError> {
        critical_section::with(|cs| {
            let current = Arc::clone(self.cpu.current());
            current.set_status(ThreadStatus::Finished);
            let next = self.next_or_idle(cs).inspect_err(|_| current.set_status(ThreadStatus::Running))?;

            let now = self.clock.now();
            self.switch(cs, now, next, true);
            Ok(())
        })
    }

    /// Timer interrupt path. Runs an aging sweep once per aging interval and
    /// returns true if the current thread has a pending yield request.
    pub fn timer_interrupt(&mut self) -> bool {
        let now = self.clock.now();
        if now.elapsed_since(self.last_aging) >= self.scheduler.config().aging_interval {
            self.last_aging = now;
            critical_section::with(|cs| self.scheduler.aging(cs, now, self.cpu.current()));
        }
        self.cpu.current().preempt_requested()
    }

    /// Safe point of the current thread. Honors a pending yield request;
    /// returns true if the CPU changed hands.
    pub fn checkpoint(&mut self) -> bool {
        if !self.cpu.current().take_preempt_request() {
            return false;
        }
        self.yield_now()
    }

    /// Entry routine of a thread the machine started from scratch
    /// ([`SwitchOutcome::Entered`]): finishes the switch that started it.
    pub fn begin_thread(&mut self) {
        let now = self.clock.now();
        critical_section::with(|cs| self.scheduler.check_to_be_destroyed(cs, now, self.cpu.machine_mut()));
    }

    fn next_or_idle(&mut self, cs: CriticalSection<'_>) -> Result<ThreadRef, SchedError> {
        loop {
            if let Some(next) = self.scheduler.find_next_to_run(cs, self.clock.now()) {
                return Ok(next);
            }
            if !self.cpu.machine_mut().idle() {
                return Err(SchedError::NoRunnableThread);
            }
        }
    }

    fn switch(&mut self, cs: CriticalSection<'_>, now: Tick, next: ThreadRef, finishing: bool) {
        if self.scheduler.run(cs, now, &mut self.cpu, next, finishing) == SwitchOutcome::Entered {
            self.scheduler.check_to_be_destroyed(cs, now, self.cpu.machine_mut());
        }
    }
}
