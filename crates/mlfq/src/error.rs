//! Recoverable scheduler errors.
//!
//! Broken scheduling invariants (a thread queued twice, a second pending
//! destruction) are not represented here: they abort through `assert!`.

use thiserror::Error;

/// Errors reported by thread construction, configuration and the kernel
/// facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedError {
    /// Priority outside `0..=149`.
    #[error("invalid priority {0}: must be within 0..=149")]
    InvalidPriority(u8),
    /// A configuration value failed validation.
    #[error("invalid scheduler configuration `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
    /// No thread is ready and the machine cannot idle waiting for one.
    #[error("no runnable thread and the machine cannot idle")]
    NoRunnableThread,
}

#[cfg(feature = "defmt")]
impl defmt::Format for SchedError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::InvalidPriority(p) => defmt::write!(f, "InvalidPriority({})", p),
            Self::InvalidConfig { field, .. } => defmt::write!(f, "InvalidConfig({=str})", *field),
            Self::NoRunnableThread => defmt::write!(f, "NoRunnableThread"),
        }
    }
}
