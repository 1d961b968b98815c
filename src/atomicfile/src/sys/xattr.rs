use std::{ffi::CStr, os::fd::AsRawFd};

use nix::errno::Errno;

pub fn fsetxattr<F: AsRawFd>(fd: &F, name: &CStr, value: &[u8], flags: i32) -> nix::Result<()> {
    let ret = unsafe {
        libc::fsetxattr(
            fd.as_raw_fd(),
            name.as_ptr(),
            value.as_ptr() as *const _,
            value.len() as libc::size_t,
            flags,
        )
    };
    Errno::result(ret)?;
    Ok(())
}
