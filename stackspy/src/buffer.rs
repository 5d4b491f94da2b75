use core::fmt;

use tracing::warn;

/// Fixed capacity byte region lent to the bridge one call at a time.
#[derive(Debug)]
pub struct SampleBuffer(Box<[u8]>);

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self(vec![0; capacity].into_boxed_slice())
    }

    pub fn capacity(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// Message text a bridge left in an error buffer.
///
/// The reported length is untrusted: it is clamped to the buffer it was read
/// from, and `is_truncated` records whether that happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorText {
    text: String,
    byte_len: usize,
    truncated: bool,
}

impl ErrorText {
    pub fn from_buffer(buf: &[u8], reported_len: usize) -> Self {
        let byte_len = reported_len.min(buf.len());
        let truncated = reported_len > buf.len();
        if truncated {
            warn!(reported_len, capacity = buf.len(), "bridge error length exceeds buffer, truncating");
        }

        Self {
            text: String::from_utf8_lossy(&buf[..byte_len]).into_owned(),
            byte_len,
            truncated,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of buffer bytes the message was read from
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl fmt::Display for ErrorText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
