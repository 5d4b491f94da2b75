//! One attachment to one target process.
//!
//! ```text
//! Created --attach ok--> Attached --stop--> Stopped
//!    |                     |  ^
//!    +--attach err--> Failed  +-- snapshot (ok or err)
//! ```
//!
//! `Failed` and `Stopped` are terminal. Attach, snapshot and stop hold the same
//! lock for the whole bridge call, so an in-flight snapshot always finishes
//! before stop touches the target or the buffers.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use stackspy_common::{decode, DecodeError, Pid, SamplingMode, DEFAULT_BUFFER_CAPACITY};
use tracing::{debug, error, info, warn};

use crate::bridge::{Bridge, BridgeReturn};
use crate::buffer::{ErrorText, SampleBuffer};
use crate::error::SpyError;
use crate::sink::Sink;

/// A just started target may not be ready to be inspected yet.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Largest capacity that can be described to the bridge as a C `int`
pub const MAX_BUFFER_CAPACITY: usize = i32::MAX as usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Attached,
    Failed,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitParams {
    pub pid: Pid,
    pub mode: SamplingMode,
    pub buffer_capacity: usize,
    pub settle_delay: Duration,
}

impl InitParams {
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            mode: SamplingMode::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_mode(mut self, mode: SamplingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// Result of a snapshot that reached the bridge successfully.
#[derive(Debug, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// decoded and handed to the sink
    Delivered,
    /// the trace could not be decoded and was dropped
    Dropped(DecodeError),
}

struct Inner {
    state: SessionState,
    data: SampleBuffer,
    error: SampleBuffer,
}

pub struct Session {
    pid: Pid,
    mode: SamplingMode,
    settle_delay: Duration,
    bridge: Arc<dyn Bridge>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("pid", &self.pid)
            .field("mode", &self.mode)
            .field("state", &self.inner.try_lock().map(|inner| inner.state))
            .finish()
    }
}

impl Session {
    /// Allocate both buffers. Nothing is sent to the bridge yet.
    pub fn new(bridge: Arc<dyn Bridge>, params: InitParams) -> Result<Self, SpyError> {
        let capacity = params.buffer_capacity;
        if capacity == 0 || capacity > MAX_BUFFER_CAPACITY {
            return Err(SpyError::InvalidCapacity(capacity));
        }

        Ok(Self {
            pid: params.pid,
            mode: params.mode,
            settle_delay: params.settle_delay,
            bridge,
            inner: Mutex::new(Inner {
                state: SessionState::Created,
                data: SampleBuffer::new(capacity),
                error: SampleBuffer::new(capacity),
            }),
        })
    }

    /// Create a session and attach it.
    pub fn start(bridge: Arc<dyn Bridge>, params: InitParams) -> Result<Self, SpyError> {
        let session = Self::new(bridge, params)?;
        session.attach()?;
        Ok(session)
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().data.capacity()
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Wait out the settle delay once, then ask the bridge to attach.
    pub fn attach(&self) -> Result<(), SpyError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.state != SessionState::Created {
            return Err(self.usage("attach", inner.state));
        }

        if !self.settle_delay.is_zero() {
            debug!(pid = %self.pid, delay = ?self.settle_delay, "waiting for target to settle");
            std::thread::sleep(self.settle_delay);
        }

        let r = self.bridge.init(self.pid, self.mode, inner.error.as_mut_slice());
        match BridgeReturn::from_raw(r) {
            BridgeReturn::Ok(_) => {
                inner.state = SessionState::Attached;
                info!(pid = %self.pid, mode = ?self.mode, "attached");
                Ok(())
            }
            BridgeReturn::Err(len) => {
                inner.state = SessionState::Failed;
                let message = ErrorText::from_buffer(inner.error.as_slice(), len);
                warn!(pid = %self.pid, reason = %message, "attach failed");
                Err(SpyError::Attach { pid: self.pid, message })
            }
        }
    }

    /// Capture one stack and hand it to `sink` before returning.
    ///
    /// A trace that does not decode is logged and reported as
    /// [`SnapshotOutcome::Dropped`]; the session stays attached either way.
    pub fn snapshot<S: Sink + ?Sized>(&self, sink: &mut S) -> Result<SnapshotOutcome, SpyError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.state != SessionState::Attached {
            return Err(self.usage("snapshot", inner.state));
        }

        let r = self.bridge.snapshot(self.pid, inner.data.as_mut_slice(), inner.error.as_mut_slice());
        let len = match BridgeReturn::from_raw(r) {
            BridgeReturn::Ok(len) => len,
            BridgeReturn::Err(len) => {
                let message = ErrorText::from_buffer(inner.error.as_slice(), len);
                return Err(SpyError::Snapshot { pid: self.pid, message });
            }
        };

        let capacity = inner.data.capacity();
        if len > capacity {
            error!(pid = %self.pid, len, capacity, "bridge wrote past the sample buffer");
            return Err(SpyError::ContractBreach { len, capacity });
        }

        match decode(inner.data.as_slice(), len) {
            Ok(sample) => {
                debug!(pid = %self.pid, depth = sample.depth(), weight = sample.weight, "sample");
                sink.append(sample.labels.as_ref(), &sample, sample.weight)
                    .map_err(SpyError::Sink)?;
                Ok(SnapshotOutcome::Delivered)
            }
            Err(e) => {
                warn!(pid = %self.pid, error = %e, len, "dropping undecodable sample");
                Ok(SnapshotOutcome::Dropped(e))
            }
        }
    }

    /// Detach from the target. Cleanup is attempted exactly once; the session
    /// ends `Stopped` even when the bridge reports a failure.
    pub fn stop(&self) -> Result<(), SpyError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.state != SessionState::Attached {
            return Err(self.usage("stop", inner.state));
        }

        let r = self.bridge.cleanup(self.pid, inner.error.as_mut_slice());
        inner.state = SessionState::Stopped;
        match BridgeReturn::from_raw(r) {
            BridgeReturn::Ok(_) => {
                info!(pid = %self.pid, "detached");
                Ok(())
            }
            BridgeReturn::Err(len) => {
                let message = ErrorText::from_buffer(inner.error.as_slice(), len);
                warn!(pid = %self.pid, reason = %message, "cleanup failed");
                Err(SpyError::Cleanup { pid: self.pid, message })
            }
        }
    }

    fn usage(&self, op: &'static str, state: SessionState) -> SpyError {
        error!(pid = %self.pid, op, ?state, "session used outside its lifecycle");
        SpyError::Usage { op, state }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.state != SessionState::Attached {
            return;
        }

        let r = self.bridge.cleanup(self.pid, inner.error.as_mut_slice());
        inner.state = SessionState::Stopped;
        if let BridgeReturn::Err(len) = BridgeReturn::from_raw(r) {
            let message = ErrorText::from_buffer(inner.error.as_slice(), len);
            warn!(pid = %self.pid, reason = %message, "cleanup on drop failed");
        }
    }
}
