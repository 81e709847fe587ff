//! Thread control block as seen by the scheduler.
//!
//! Threads are owned by the kernel and shared through [`ThreadRef`] handles.
//! A ready queue holds a clone of the handle only while the thread is queued;
//! dropping it from a queue never destroys the thread.
//!
//! The scheduling bookkeeping sits behind a spin lock that is only taken for
//! the duration of a single accessor, always with interrupts disabled, so it
//! is never contended on a uniprocessor. The preemption flag is atomic so the
//! running thread can poll it at a safe point without involving the scheduler.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::{Mutex, MutexGuard};

use crate::error::SchedError;
use crate::queue::Band;
use crate::time::Tick;

/// Highest priority a thread can hold.
pub const MAX_PRIORITY: u8 = 149;

/// Shared handle to a thread.
pub type ThreadRef = Arc<Thread>;

/// Thread identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId {
    /// The bootstrap thread, which doubles as the idle thread.
    pub const BOOTSTRAP: Self = Self(0);
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ThreadId {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ThreadId({})", self.0)
    }
}

/// Scheduling priority, `0..=149`. Higher is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Priority(u8);

impl Priority {
    /// Lowest priority.
    pub const MIN: Self = Self(0);
    /// Highest priority; aging never goes past it.
    pub const MAX: Self = Self(MAX_PRIORITY);

    /// Validates and wraps a raw priority.
    pub const fn new(value: u8) -> Result<Self, SchedError> {
        if value > MAX_PRIORITY {
            Err(SchedError::InvalidPriority(value))
        } else {
            Ok(Self(value))
        }
    }

    /// Raw priority value.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Priority raised by `step`, clamped at [`Priority::MAX`].
    pub const fn boosted(self, step: u8) -> Self {
        let raised = self.0.saturating_add(step);
        if raised > MAX_PRIORITY {
            Self::MAX
        } else {
            Self(raised)
        }
    }

    /// Band this priority maps to.
    pub const fn band(self) -> Band {
        Band::of(self)
    }
}

impl TryFrom<u8> for Priority {
    type Error = SchedError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Priority {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{}", self.0)
    }
}

/// Thread execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Constructed but never admitted.
    Created,
    /// Waiting in a ready queue.
    Ready,
    /// Executing on the CPU.
    Running,
    /// Waiting for an event outside the scheduler.
    Blocked,
    /// Done; waiting to be reclaimed.
    Finished,
}

/// User-mode execution state attached to a thread.
///
/// Kernel-only threads have none. The dispatcher saves the outgoing thread's
/// state before a switch and restores it once that thread resumes.
pub trait UserContext: Send {
    /// Saves user-mode registers.
    fn save_user_state(&mut self);
    /// Restores user-mode registers.
    fn restore_user_state(&mut self);
    /// Saves address-space state (page table registers, TLB entries).
    fn save_address_space(&mut self);
    /// Restores address-space state.
    fn restore_address_space(&mut self);
}

/// Configuration for creating a thread.
pub struct ThreadConfig {
    /// Thread identifier.
    pub id: ThreadId,
    /// Human readable label for diagnostics.
    pub name: String,
    /// Initial priority.
    pub priority: Priority,
    /// Initial burst estimate in ticks.
    pub burst_time: u64,
    /// User-mode state, if the thread runs a user program.
    pub user: Option<Box<dyn UserContext>>,
}

impl ThreadConfig {
    /// Creates a configuration for a kernel thread with no burst history.
    pub fn new(id: ThreadId, priority: Priority) -> Self {
        Self {
            id,
            name: String::new(),
            priority,
            burst_time: 0,
            user: None,
        }
    }

    /// Sets the diagnostic name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the initial burst estimate.
    pub fn with_burst_time(mut self, ticks: u64) -> Self {
        self.burst_time = ticks;
        self
    }

    /// Attaches user-mode state.
    pub fn with_user_context(mut self, user: Box<dyn UserContext>) -> Self {
        self.user = Some(user);
        self
    }
}

struct SchedState {
    priority: Priority,
    burst_time: u64,
    status: ThreadStatus,
    /// Queue currently holding the thread. Maintained by the ready-queue set.
    band: Option<Band>,
    ready_at: Tick,
    waiting_credit: i64,
    started_at: Tick,
    cpu_ticks: u64,
    burst_elapsed: u64,
}

/// A schedulable thread.
pub struct Thread {
    id: ThreadId,
    name: String,
    sched: Mutex<SchedState>,
    preempt: AtomicBool,
    user: Mutex<Option<Box<dyn UserContext>>>,
}

impl Thread {
    /// Creates a thread from configuration. The thread starts in
    /// [`ThreadStatus::Created`] and joins a queue only when admitted.
    pub fn new(config: ThreadConfig) -> ThreadRef {
        Arc::new(Self {
            id: config.id,
            name: config.name,
            sched: Mutex::new(SchedState {
                priority: config.priority,
                burst_time: config.burst_time,
                status: ThreadStatus::Created,
                band: None,
                ready_at: Tick::ZERO,
                waiting_credit: 0,
                started_at: Tick::ZERO,
                cpu_ticks: 0,
                burst_elapsed: 0,
            }),
            preempt: AtomicBool::new(false),
            user: Mutex::new(config.user),
        })
    }

    /// Creates the bootstrap thread, already running at priority 0.
    ///
    /// The bootstrap thread is the idle thread: it is never asked to yield.
    pub fn bootstrap() -> ThreadRef {
        let thread = Self::new(ThreadConfig::new(ThreadId::BOOTSTRAP, Priority::MIN).with_name("main"));
        thread.set_status(ThreadStatus::Running);
        thread
    }

    fn state(&self) -> MutexGuard<'_, SchedState> {
        self.sched.lock()
    }

    /// Returns the thread ID.
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Returns the diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current priority.
    pub fn priority(&self) -> Priority {
        self.state().priority
    }

    /// Returns the current burst estimate.
    pub fn burst_time(&self) -> u64 {
        self.state().burst_time
    }

    /// Returns the current status.
    pub fn status(&self) -> ThreadStatus {
        self.state().status
    }

    /// Tick at which the thread last entered a ready queue.
    pub fn ready_at(&self) -> Tick {
        self.state().ready_at
    }

    /// Wait ticks carried across queue moves and not yet consumed by aging.
    pub fn waiting_credit(&self) -> i64 {
        self.state().waiting_credit
    }

    /// Tick at which the thread was last dispatched.
    pub fn started_at(&self) -> Tick {
        self.state().started_at
    }

    /// Total ticks the thread has executed.
    pub fn cpu_ticks(&self) -> u64 {
        self.state().cpu_ticks
    }

    /// Band of the ready queue holding the thread, if any.
    pub fn queued_band(&self) -> Option<Band> {
        self.state().band
    }

    /// Returns true while the thread sits in a ready queue.
    pub fn is_queued(&self) -> bool {
        self.queued_band().is_some()
    }

    /// Sets the status. Queue membership is unaffected.
    pub fn set_status(&self, status: ThreadStatus) {
        self.state().status = status;
    }

    /// Changes the priority of a thread that is not queued.
    ///
    /// # Panics
    ///
    /// Panics if the thread is in a ready queue, since its position there
    /// depends on the old value.
    pub fn set_priority(&self, priority: Priority) {
        let mut state = self.state();
        assert!(
            state.band.is_none(),
            "thread {} changed priority while queued in {:?}",
            self.id,
            state.band
        );
        state.priority = priority;
    }

    /// Replaces the burst estimate of a thread that is not queued.
    ///
    /// # Panics
    ///
    /// Panics if the thread is in a ready queue.
    pub fn set_burst_time(&self, ticks: u64) {
        let mut state = self.state();
        assert!(
            state.band.is_none(),
            "thread {} changed burst time while queued in {:?}",
            self.id,
            state.band
        );
        state.burst_time = ticks;
    }

    // Preemption

    /// Returns true if the scheduler asked this thread to yield.
    pub fn preempt_requested(&self) -> bool {
        self.preempt.load(Ordering::Acquire)
    }

    /// Consumes a pending yield request. Called by the thread at a safe
    /// point.
    pub fn take_preempt_request(&self) -> bool {
        self.preempt.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn request_preempt(&self) {
        self.preempt.store(true, Ordering::Release);
    }

    // Burst accounting

    /// Ticks run in the current, not yet completed, CPU burst.
    pub fn burst_progress(&self, now: Tick) -> u64 {
        let state = self.state();
        state.burst_elapsed + now.elapsed_since(state.started_at)
    }

    /// Folds the ticks run since dispatch into the current burst. Called when
    /// the thread gives up the CPU without ending its burst.
    pub fn extend_burst(&self, now: Tick) {
        let mut state = self.state();
        state.burst_elapsed += now.elapsed_since(state.started_at);
    }

    /// Ends the current CPU burst and updates the estimate with the
    /// exponential average `(actual + previous) / 2`. Returns the new
    /// estimate.
    pub fn complete_burst(&self, now: Tick) -> u64 {
        let mut state = self.state();
        let actual = state.burst_elapsed + now.elapsed_since(state.started_at);
        state.burst_time = (actual + state.burst_time) / 2;
        state.burst_elapsed = 0;
        state.burst_time
    }

    // Scheduler bookkeeping

    pub(crate) fn mark_ready(&self, now: Tick) {
        let mut state = self.state();
        state.status = ThreadStatus::Ready;
        state.ready_at = now;
    }

    pub(crate) fn restamp_ready(&self, now: Tick) {
        self.state().ready_at = now;
    }

    /// Adds the current ready interval to the waiting credit.
    pub(crate) fn accrue_wait(&self, now: Tick) {
        let mut state = self.state();
        let waited = ticks_as_credit(now.elapsed_since(state.ready_at));
        state.waiting_credit = state.waiting_credit.saturating_add(waited);
    }

    /// Consumes one aging threshold from the wait, if enough has built up,
    /// and raises the priority. Returns the old and new priority.
    pub(crate) fn consume_wait(&self, now: Tick, threshold: u64, step: u8) -> Option<(Priority, Priority)> {
        let mut state = self.state();
        let threshold = ticks_as_credit(threshold);
        let wait = ticks_as_credit(now.elapsed_since(state.ready_at)).saturating_add(state.waiting_credit);
        if wait < threshold {
            return None;
        }
        state.waiting_credit = state.waiting_credit.saturating_sub(threshold);
        let old = state.priority;
        state.priority = old.boosted(step);
        Some((old, state.priority))
    }

    pub(crate) fn set_band(&self, band: Option<Band>) {
        self.state().band = band;
    }

    pub(crate) fn start(&self, now: Tick) {
        let mut state = self.state();
        state.status = ThreadStatus::Running;
        state.started_at = now;
    }

    /// Records the ticks run since dispatch. Returns them.
    pub(crate) fn charge(&self, now: Tick) -> u64 {
        let mut state = self.state();
        let executed = now.elapsed_since(state.started_at);
        state.cpu_ticks += executed;
        executed
    }

    pub(crate) fn save_user_state(&self) -> bool {
        match self.user.lock().as_mut() {
            Some(user) => {
                user.save_user_state();
                user.save_address_space();
                true
            }
            None => false,
        }
    }

    pub(crate) fn restore_user_state(&self) -> bool {
        match self.user.lock().as_mut() {
            Some(user) => {
                user.restore_user_state();
                user.restore_address_space();
                true
            }
            None => false,
        }
    }
}

/// Tick count as signed waiting credit, clamped at `i64::MAX`.
fn ticks_as_credit(ticks: u64) -> i64 {
    i64::try_from(ticks).unwrap_or(i64::MAX)
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &state.priority)
            .field("burst_time", &state.burst_time)
            .field("status", &state.status)
            .field("band", &state.band)
            .field("ready_at", &state.ready_at)
            .field("waiting_credit", &state.waiting_credit)
            .finish()
    }
}
