use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Id of the process being sampled. Copied by value into every bridge call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(pub i32);

impl Pid {
    #[inline(always)]
    pub fn as_raw(&self) -> i32 {
        self.0
    }
}

impl From<i32> for Pid {
    fn from(pid: i32) -> Self {
        Self(pid)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("pid {0} does not fit a pid_t")]
pub struct PidOutOfRange(pub u32);

/// For ids handed out by `std::process`, which are unsigned.
impl TryFrom<u32> for Pid {
    type Error = PidOutOfRange;

    fn try_from(pid: u32) -> Result<Self, Self::Error> {
        i32::try_from(pid).map(Self).map_err(|_| PidOutOfRange(pid))
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_unsigned() {
        assert_eq!(Pid::try_from(4242u32), Ok(Pid(4242)));
        assert_eq!(Pid::try_from(i32::MAX as u32), Ok(Pid(i32::MAX)));
        assert_eq!(Pid::try_from(i32::MAX as u32 + 1), Err(PidOutOfRange(1 << 31)));
        assert_eq!(Pid::try_from(u32::MAX), Err(PidOutOfRange(u32::MAX)));
    }
}
