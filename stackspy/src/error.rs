use stackspy_common::Pid;
use thiserror::Error;

use crate::buffer::ErrorText;
use crate::session::SessionState;

#[derive(Error, Debug)]
pub enum SpyError {
    #[error("failed to attach to pid {pid}: {message}")]
    Attach { pid: Pid, message: ErrorText },

    #[error("snapshot of pid {pid} failed: {message}")]
    Snapshot { pid: Pid, message: ErrorText },

    #[error("cleanup of pid {pid} failed: {message}")]
    Cleanup { pid: Pid, message: ErrorText },

    #[error("`{op}` called on a session in state {state:?}")]
    Usage { op: &'static str, state: SessionState },

    #[error("no profiler named `{0}` is registered")]
    NotFound(String),

    #[error("profiler `{0}` is already registered")]
    DuplicateProfiler(String),

    #[error("the process-wide registry is already installed")]
    RegistryInstalled,

    #[error("buffer capacity {0} is outside 1..=2147483647")]
    InvalidCapacity(usize),

    #[error("bridge reported {len} bytes for a {capacity} byte buffer")]
    ContractBreach { len: usize, capacity: usize },

    #[error("sink rejected sample")]
    Sink(#[source] anyhow::Error),
}

impl SpyError {
    /// Errors after which a sampling loop must not keep calling the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SpyError::ContractBreach { .. } | SpyError::Sink(_) | SpyError::Usage { .. }
        )
    }

    /// Bridge supplied text, for the errors that carry some
    pub fn bridge_message(&self) -> Option<&ErrorText> {
        match self {
            SpyError::Attach { message, .. }
            | SpyError::Snapshot { message, .. }
            | SpyError::Cleanup { message, .. } => Some(message),
            _ => None,
        }
    }
}
