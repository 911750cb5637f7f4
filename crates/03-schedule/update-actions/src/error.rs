use thiserror::Error;

/// Result alias for schedule edits.
pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Failures raised while editing the action list.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// A position does not exist in the current list.
    #[error("action index {index} out of range for list of {len}")]
    IndexOutOfRange {
        /// Offending index.
        index: usize,
        /// List length at the time of the call.
        len: usize,
    },
}
