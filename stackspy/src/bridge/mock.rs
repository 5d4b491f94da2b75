//! Scripted bridge for exercising sessions without a capture library.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use stackspy_common::{Pid, SamplingMode};

use super::Bridge;
use crate::processes;

/// What the bridge does on one call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// write the bytes to the data buffer, return their length
    Ok(Vec<u8>),
    /// write the message to the error buffer, return minus its length
    Err(String),
    /// write `bytes` to the data buffer (`ret >= 0`) or the error buffer
    /// (`ret < 0`) and return `ret` as is, whatever it claims
    Raw { bytes: Vec<u8>, ret: i32 },
}

impl Reply {
    pub fn ok(trace: &str) -> Self {
        Self::Ok(trace.as_bytes().to_vec())
    }

    pub fn err(message: &str) -> Self {
        Self::Err(message.to_owned())
    }

    fn write(&self, data: &mut [u8], err: &mut [u8]) -> i32 {
        match self {
            Reply::Ok(bytes) => fill(data, bytes) as i32,
            Reply::Err(message) => -(fill(err, message.as_bytes()) as i32),
            Reply::Raw { bytes, ret } => {
                if *ret >= 0 {
                    fill(data, bytes);
                } else {
                    fill(err, bytes);
                }
                *ret
            }
        }
    }
}

fn fill(buf: &mut [u8], bytes: &[u8]) -> usize {
    let n = bytes.len().min(buf.len());
    buf[..n].copy_from_slice(&bytes[..n]);
    n
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    Init { pid: Pid, mode: SamplingMode },
    Snapshot { pid: Pid },
    Cleanup { pid: Pid },
}

/// Replies are taken from per-operation queues; an empty queue falls back to
/// the operation's default reply.
#[derive(Debug)]
pub struct MockBridge {
    init: Mutex<VecDeque<Reply>>,
    snapshot: Mutex<VecDeque<Reply>>,
    cleanup: Mutex<VecDeque<Reply>>,
    default_snapshot: Reply,
    check_liveness: bool,
    call_delay: Duration,
    /// off for long-running use, where only the counters are kept
    record_calls: bool,
    calls: Mutex<Vec<Call>>,
    cleanups: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBridge {
    pub fn new() -> Self {
        Self {
            init: Default::default(),
            snapshot: Default::default(),
            cleanup: Default::default(),
            default_snapshot: Reply::ok("main"),
            check_liveness: false,
            call_delay: Duration::ZERO,
            record_calls: true,
            calls: Default::default(),
            cleanups: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Fail `init` and `snapshot` for pids that are not running, the way a
    /// real capture library reports an unreachable target. Calls are counted
    /// but not recorded, so `calls()` stays empty however long it runs.
    pub fn live() -> Self {
        Self { check_liveness: true, record_calls: false, ..Self::new() }
    }

    pub fn with_default_snapshot(mut self, reply: Reply) -> Self {
        self.default_snapshot = reply;
        self
    }

    /// Sleep inside every call, to widen race windows in tests.
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    pub fn on_init(&self, reply: Reply) -> &Self {
        self.init.lock().push_back(reply);
        self
    }

    pub fn on_snapshot(&self, reply: Reply) -> &Self {
        self.snapshot.lock().push_back(reply);
        self
    }

    pub fn on_cleanup(&self, reply: Reply) -> &Self {
        self.cleanup.lock().push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn cleanup_calls(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were ever inside the bridge at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self, call: Call) -> InFlight<'_> {
        if matches!(call, Call::Cleanup { .. }) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }
        if self.record_calls {
            self.calls.lock().push(call);
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.call_delay.is_zero() {
            std::thread::sleep(self.call_delay);
        }
        InFlight(&self.in_flight)
    }

    fn dead_target(&self, pid: Pid) -> Option<Reply> {
        (self.check_liveness && !processes::is_running(pid))
            .then(|| Reply::Err(format!("no such process: {pid}")))
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Bridge for MockBridge {
    fn init(&self, pid: Pid, mode: SamplingMode, err: &mut [u8]) -> i32 {
        let _guard = self.enter(Call::Init { pid, mode });
        let reply = self.dead_target(pid).or_else(|| self.init.lock().pop_front());
        reply.unwrap_or(Reply::Ok(vec![])).write(&mut [], err)
    }

    fn cleanup(&self, pid: Pid, err: &mut [u8]) -> i32 {
        let _guard = self.enter(Call::Cleanup { pid });
        let reply = self.cleanup.lock().pop_front();
        reply.unwrap_or(Reply::Ok(vec![])).write(&mut [], err)
    }

    fn snapshot(&self, pid: Pid, data: &mut [u8], err: &mut [u8]) -> i32 {
        let _guard = self.enter(Call::Snapshot { pid });
        let reply = self.dead_target(pid).or_else(|| self.snapshot.lock().pop_front());
        reply.unwrap_or_else(|| self.default_snapshot.clone()).write(data, err)
    }
}
