//! # mlfq - Multilevel Feedback Queue Scheduling Core
//!
//! CPU scheduling core of a teaching kernel. At every dispatch point it
//! decides which ready thread runs next, approximating a multilevel feedback
//! queue with three priority bands:
//!
//! | Band | Priority  | Ordering                                   |
//! |------|-----------|--------------------------------------------|
//! | L1   | 100..=149 | shortest estimated burst first (SRTF-like) |
//! | L2   | 50..=99   | highest priority first                     |
//! | L3   | 0..=49    | first come, first served (round robin)     |
//!
//! Long-waiting threads are aged towards higher bands, and admissions into L1
//! may ask the running thread to give up the CPU.
//!
//! ## Execution model
//!
//! Every entry point of [`Scheduler`] takes a
//! [`critical_section::CriticalSection`] token. The core never blocks and
//! never takes a lock across calls; the only suspension point is the external
//! [`Machine::switch_to`] primitive invoked from [`Scheduler::run`].
//!
//! ## Module Overview
//!
//! - [`time`] - tick type and clock sources
//! - [`thread`] - thread control block and its scheduling bookkeeping
//! - [`queue`] - priority bands and the ready-queue set
//! - [`policy`] - pluggable preemption strategies
//! - [`scheduler`] - admission, aging and dispatch
//! - [`cpu`] - processor context and the context-switch interface
//! - [`kernel`] - thread-layer facade driving the scheduler
//! - [`config`] - tunables with a builder
//! - [`trace`] - structured trace records

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod config;
pub mod cpu;
pub mod error;
pub mod kernel;
pub mod policy;
pub mod queue;
pub mod scheduler;
pub mod thread;
pub mod time;
pub mod trace;

pub use config::{SchedConfig, SchedConfigBuilder};
pub use cpu::{Cpu, Machine, SwitchOutcome};
pub use error::SchedError;
pub use kernel::{Kernel, KernelBuilder};
pub use policy::{BurstComparison, PredictedBurst, PreemptPolicy};
pub use queue::{Band, ReadyQueues};
pub use scheduler::{SchedStats, Scheduler};
pub use thread::{Priority, Thread, ThreadConfig, ThreadId, ThreadRef, ThreadStatus, UserContext};
pub use time::{Clock, ManualClock, Tick};
pub use trace::{TraceError, TraceHook};
