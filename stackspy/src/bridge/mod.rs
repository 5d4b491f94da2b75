//! The capture capability a session drives.
//!
//! Each call borrows the session's buffers for its own duration only and
//! reports through its return value: `r >= 0` is success (`r` bytes written to
//! the data buffer for `snapshot`), `r < 0` is failure with `|r|` bytes of
//! message written to the error buffer.

use stackspy_common::{Pid, SamplingMode};

#[cfg(any(test, feature = "mock"))]
pub mod mock;
#[cfg(feature = "rbspy")]
pub mod rbspy;

#[cfg(any(test, feature = "mock"))]
pub use mock::{Call, MockBridge, Reply};
#[cfg(feature = "rbspy")]
pub use rbspy::RbspyBridge;

pub trait Bridge: Send + Sync {
    fn init(&self, pid: Pid, mode: SamplingMode, err: &mut [u8]) -> i32;

    fn cleanup(&self, pid: Pid, err: &mut [u8]) -> i32;

    fn snapshot(&self, pid: Pid, data: &mut [u8], err: &mut [u8]) -> i32;
}

/// A bridge return value split by sign. Lengths are not yet checked against
/// any capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeReturn {
    Ok(usize),
    Err(usize),
}

impl BridgeReturn {
    pub fn from_raw(r: i32) -> Self {
        if r >= 0 {
            Self::Ok(r as usize)
        } else {
            Self::Err(r.unsigned_abs() as usize)
        }
    }
}
