use serde::{Deserialize, Serialize};

/// Whether the target process is paused while its stack is captured.
///
/// This never changes how the caller blocks: every bridge call is synchronous.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    Blocking,
    #[default]
    NonBlocking,
}

impl SamplingMode {
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Blocking)
    }

    /// The `blocking` flag as passed across the C boundary
    pub fn as_flag(&self) -> i32 {
        match self {
            Self::Blocking => 1,
            Self::NonBlocking => 0,
        }
    }
}

impl From<bool> for SamplingMode {
    fn from(blocking: bool) -> Self {
        if blocking {
            Self::Blocking
        } else {
            Self::NonBlocking
        }
    }
}
