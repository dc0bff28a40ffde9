//! Error types.
//!
//! Planning data is routinely incomplete, so bad values (NaN, negative
//! durations, unknown change groups) are clamped rather than rejected.
//! Errors are reserved for caller contract violations and for the
//! lifecycle of an offloaded optimizer task.

use thiserror::Error;

/// Errors raised by the sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencerError {
    /// Parallel input columns disagree in length.
    #[error("column `{field}` has {actual} entries, expected {expected}")]
    LengthMismatch {
        /// Name of the offending column.
        field: &'static str,
        /// Length of the reference column.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// The run was cancelled before it completed.
    #[error("optimization cancelled")]
    Cancelled,

    /// The worker thread panicked.
    #[error("optimizer worker panicked")]
    WorkerPanicked,

    /// The worker thread could not be spawned.
    #[error("failed to spawn optimizer worker: {0}")]
    WorkerSpawn(String),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, SequencerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_message() {
        let err = SequencerError::LengthMismatch {
            field: "daily_sale",
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "column `daily_sale` has 2 entries, expected 3"
        );
    }

    #[test]
    fn test_cancelled_message() {
        assert_eq!(SequencerError::Cancelled.to_string(), "optimization cancelled");
    }
}
