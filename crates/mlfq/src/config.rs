//! Scheduler tunables.
//!
//! Band boundaries and the priority cap are constants in [`crate::queue`] and
//! [`crate::thread`], shared by admission and aging, and are not
//! configurable.

use crate::error::SchedError;
use crate::thread::{ThreadId, MAX_PRIORITY};

/// Configuration for the scheduler and the kernel facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedConfig {
    /// Wait ticks a ready thread accumulates per priority boost.
    pub aging_threshold: u64,
    /// Priority added per boost.
    pub aging_step: u8,
    /// Ticks between aging sweeps driven by the kernel timer path.
    pub aging_interval: u64,
    /// Thread that is never asked to yield (the idle thread).
    pub idle_thread: ThreadId,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            aging_threshold: 1500,
            aging_step: 10,
            aging_interval: 100,
            idle_thread: ThreadId::BOOTSTRAP,
        }
    }
}

impl SchedConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SchedConfigBuilder {
        SchedConfigBuilder::default()
    }

    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<(), SchedError> {
        if self.aging_threshold == 0 {
            return Err(SchedError::InvalidConfig {
                field: "aging_threshold",
                reason: "must be greater than zero",
            });
        }
        if self.aging_threshold > i64::MAX as u64 {
            return Err(SchedError::InvalidConfig {
                field: "aging_threshold",
                reason: "must not exceed i64::MAX",
            });
        }
        if self.aging_step == 0 || self.aging_step > MAX_PRIORITY {
            return Err(SchedError::InvalidConfig {
                field: "aging_step",
                reason: "must be within 1..=149",
            });
        }
        if self.aging_interval == 0 {
            return Err(SchedError::InvalidConfig {
                field: "aging_interval",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}

/// Builder for [`SchedConfig`].
#[derive(Debug, Clone, Default)]
pub struct SchedConfigBuilder {
    config: SchedConfig,
}

impl SchedConfigBuilder {
    /// Sets the wait ticks consumed per priority boost.
    pub fn aging_threshold(mut self, ticks: u64) -> Self {
        self.config.aging_threshold = ticks;
        self
    }

    /// Sets the priority added per boost.
    pub fn aging_step(mut self, step: u8) -> Self {
        self.config.aging_step = step;
        self
    }

    /// Sets the ticks between aging sweeps.
    pub fn aging_interval(mut self, ticks: u64) -> Self {
        self.config.aging_interval = ticks;
        self
    }

    /// Sets the thread exempt from preemption requests.
    pub fn idle_thread(mut self, id: ThreadId) -> Self {
        self.config.idle_thread = id;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<SchedConfig, SchedError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
