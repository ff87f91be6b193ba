//! src/error.rs
//! ============================================================================
//! # `CoreError`: Unified error type for the dispatch core
//!
//! The taxonomy is flat. A leaf action either succeeds or fails with
//! [`CoreError::ActionFailed`]; the only other variant reports a trigger that
//! re-enters a round still being delivered. Nothing in the registry,
//! observable or dispatcher swallows these: they always reach the caller.

use compact_str::CompactString;
use thiserror::Error;

/// Convenient alias carrying our unified error type
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A handler response or command execution failed.
    #[error("Action '{action}' failed: {reason}")]
    ActionFailed {
        action: CompactString,
        reason: CompactString,
    },

    /// `mark_occurred` was called from inside a round on the same observable.
    #[error("Dispatch round already in progress")]
    RoundInProgress,
}

impl CoreError {
    /// Create an action failure error
    #[inline]
    pub fn action_failed(action: impl Into<CompactString>, reason: impl Into<CompactString>) -> Self {
        Self::ActionFailed {
            action: action.into(),
            reason: reason.into(),
        }
    }

    /// True for failures raised by leaf actions rather than by the core itself
    #[inline(always)]
    pub fn is_action_failure(&self) -> bool {
        matches!(self, Self::ActionFailed { .. })
    }
}
