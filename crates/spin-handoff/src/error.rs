use std::fmt;

/// Errors raised at a [`Handoff`](crate::Handoff) suspension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffError {
    /// A second continuation tried to park while one was already parked.
    ///
    /// Both the stale continuation and the newcomer receive this error.
    ProtocolViolation,
}

impl fmt::Display for HandoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtocolViolation => {
                write!(f, "handoff protocol violation: a continuation is already parked")
            }
        }
    }
}

impl std::error::Error for HandoffError {}

/// Fault escaping a task body.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a task body returns.
pub type TaskResult = Result<(), TaskError>;
