use libc::{c_int, c_void};
use stackspy_common::{Pid, SamplingMode};

use super::Bridge;

// Exported by the rbspy wrapper library (`librustdeps.a`).
extern "C" {
    fn rbspy_init(pid: c_int, blocking: c_int, err_ptr: *mut c_void, err_len: c_int) -> c_int;
    fn rbspy_cleanup(pid: c_int, err_ptr: *mut c_void, err_len: c_int) -> c_int;
    fn rbspy_snapshot(
        pid: c_int,
        ptr: *mut c_void,
        len: c_int,
        err_ptr: *mut c_void,
        err_len: c_int,
    ) -> c_int;
}

/// Ruby stack capture through rbspy.
#[derive(Debug, Default, Clone, Copy)]
pub struct RbspyBridge;

fn c_len(buf: &[u8]) -> c_int {
    c_int::try_from(buf.len()).unwrap_or(c_int::MAX)
}

impl Bridge for RbspyBridge {
    fn init(&self, pid: Pid, mode: SamplingMode, err: &mut [u8]) -> i32 {
        // SAFETY: `err` is valid for writes of `c_len(err)` bytes for the whole call
        // and the library keeps no reference to it afterwards.
        unsafe { rbspy_init(pid.as_raw(), mode.as_flag(), err.as_mut_ptr().cast(), c_len(err)) }
    }

    fn cleanup(&self, pid: Pid, err: &mut [u8]) -> i32 {
        // SAFETY: see `init`.
        unsafe { rbspy_cleanup(pid.as_raw(), err.as_mut_ptr().cast(), c_len(err)) }
    }

    fn snapshot(&self, pid: Pid, data: &mut [u8], err: &mut [u8]) -> i32 {
        // SAFETY: both buffers are distinct, live for the whole call, and are
        // valid for writes of their stated lengths.
        unsafe {
            rbspy_snapshot(
                pid.as_raw(),
                data.as_mut_ptr().cast(),
                c_len(data),
                err.as_mut_ptr().cast(),
                c_len(err),
            )
        }
    }
}
