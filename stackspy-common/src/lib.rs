pub mod decode;
pub mod labels;
pub mod mode;
pub mod pid;
pub mod sample;

pub use decode::{decode, DecodeError};
pub use labels::LabelSet;
pub use mode::SamplingMode;
pub use pid::{Pid, PidOutOfRange};
pub use sample::{Frame, Location, StackSample};

/// Default capacity of the sample and error buffers, in bytes
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;
