//! Tick phases.

use std::fmt;

/// Where the scheduler is within its loop.
///
/// A loop-mode tick walks `Idle → Resolving → Diffing → Applying →
/// Verifying → Notifying → Sleeping` and back to `Idle`. Single-run mode
/// and stop requests end in `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Idle,
    Resolving,
    Diffing,
    Applying,
    Verifying,
    Notifying,
    Sleeping,
    Terminated,
}

impl TickPhase {
    /// Returns the phase that follows `self` in loop mode.
    ///
    /// `Terminated` is absorbing.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Idle => Self::Resolving,
            Self::Resolving => Self::Diffing,
            Self::Diffing => Self::Applying,
            Self::Applying => Self::Verifying,
            Self::Verifying => Self::Notifying,
            Self::Notifying => Self::Sleeping,
            Self::Sleeping => Self::Idle,
            Self::Terminated => Self::Terminated,
        }
    }

    /// Returns true for phases that belong to a tick.
    #[must_use]
    pub const fn in_tick(self) -> bool {
        matches!(
            self,
            Self::Resolving | Self::Diffing | Self::Applying | Self::Verifying | Self::Notifying
        )
    }

    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Diffing => "diffing",
            Self::Applying => "applying",
            Self::Verifying => "verifying",
            Self::Notifying => "notifying",
            Self::Sleeping => "sleeping",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for TickPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
