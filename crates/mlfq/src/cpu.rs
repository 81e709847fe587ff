//! Processor context and the machine-level switch interface.

use alloc::sync::Arc;

use crate::thread::ThreadRef;

/// Where control went after a context switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The outgoing thread has been switched back in; the code after the
    /// switch runs on its behalf.
    Resumed,
    /// The incoming thread started at its entry point. Its begin routine
    /// owns the post-switch work and must call
    /// [`Scheduler::check_to_be_destroyed`](crate::Scheduler::check_to_be_destroyed).
    Entered,
}

/// Machine-dependent services consumed by the dispatcher.
pub trait Machine {
    /// Saves `from`'s registers and stack and loads `to`'s.
    fn switch_to(&mut self, from: &ThreadRef, to: &ThreadRef) -> SwitchOutcome;

    /// Releases a finished thread's stack and control block. The default
    /// drops the scheduler's handle.
    fn destroy(&mut self, thread: ThreadRef) {
        drop(thread);
    }

    /// Waits for an interrupt that may make a thread ready. Returns false if
    /// nothing can ever arrive.
    fn idle(&mut self) -> bool {
        false
    }
}

impl<M: Machine + ?Sized> Machine for &mut M {
    fn switch_to(&mut self, from: &ThreadRef, to: &ThreadRef) -> SwitchOutcome {
        (**self).switch_to(from, to)
    }

    fn destroy(&mut self, thread: ThreadRef) {
        (**self).destroy(thread)
    }

    fn idle(&mut self) -> bool {
        (**self).idle()
    }
}

/// The processor: the thread it is executing and the machine underneath.
pub struct Cpu<M> {
    current: ThreadRef,
    machine: M,
}

impl<M: Machine> Cpu<M> {
    /// Creates a processor executing `current`.
    pub fn new(current: ThreadRef, machine: M) -> Self {
        Self { current, machine }
    }

    /// Thread currently executing.
    pub fn current(&self) -> &ThreadRef {
        &self.current
    }

    /// Underlying machine.
    pub fn machine(&self) -> &M {
        &self.machine
    }

    /// Underlying machine, mutably.
    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    /// Installs `next` as the current thread.
    pub(crate) fn replace_current(&mut self, next: ThreadRef) {
        self.current = next;
    }

    /// Switches from `from` to the current thread.
    pub(crate) fn switch_from(&mut self, from: &ThreadRef) -> SwitchOutcome {
        let to = Arc::clone(&self.current);
        self.machine.switch_to(from, &to)
    }
}
