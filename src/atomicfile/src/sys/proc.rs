use std::{
    ffi::CStr,
    os::fd::{AsRawFd, RawFd},
};

use smallvec::{SmallVec, ToSmallVec};

pub const PROC_SELF_FD_PREFIX: &str = "/proc/self/fd/";

pub struct AtFdcwd {}

const AT_FDCWD_INSTANCE: AtFdcwd = AtFdcwd {};
pub static AT_FDCWD: &AtFdcwd = &AT_FDCWD_INSTANCE;

impl AsRawFd for AtFdcwd {
    fn as_raw_fd(&self) -> RawFd {
        libc::AT_FDCWD
    }
}

// zero-allocation format!("/proc/self/fd/{}\0", fd)
pub fn with_fd_path<T, F: AsRawFd>(fd: &F, f: impl FnOnce(&CStr) -> T) -> T {
    let mut num_buf = itoa::Buffer::new();
    let formatted_fd = num_buf.format(fd.as_raw_fd());

    let mut path_buf: SmallVec<[u8; 32]> = PROC_SELF_FD_PREFIX.as_bytes().to_smallvec();
    path_buf.extend_from_slice(formatted_fd.as_bytes());
    path_buf.push(b'\0');

    // digits can't contain nul
    let path_cstr = unsafe { CStr::from_bytes_with_nul_unchecked(&path_buf) };
    f(path_cstr)
}
