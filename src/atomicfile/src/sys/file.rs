use std::{ffi::CStr, os::fd::AsRawFd};

use nix::errno::Errno;

pub fn fallocate<F: AsRawFd>(fd: &F, mode: i32, offset: u64, len: u64) -> nix::Result<()> {
    let offset = libc::off_t::try_from(offset).map_err(|_| Errno::EFBIG)?;
    let len = libc::off_t::try_from(len).map_err(|_| Errno::EFBIG)?;
    let ret = unsafe { libc::fallocate(fd.as_raw_fd(), mode, offset, len) };
    Errno::result(ret).map(drop)
}

// reserve blocks without changing st_size
pub fn preallocate<F: AsRawFd>(fd: &F, len: u64) -> nix::Result<()> {
    fallocate(fd, libc::FALLOC_FL_KEEP_SIZE, 0, len)
}

// PUNCH_HOLE must always be paired with KEEP_SIZE
pub fn punch_hole<F: AsRawFd>(fd: &F, offset: u64, len: u64) -> nix::Result<()> {
    fallocate(
        fd,
        libc::FALLOC_FL_PUNCH_HOLE | libc::FALLOC_FL_KEEP_SIZE,
        offset,
        len,
    )
}

pub fn linkat<F1: AsRawFd, F2: AsRawFd>(
    olddirfd: &F1,
    oldpath: &CStr,
    newdirfd: &F2,
    newpath: &CStr,
    flags: i32,
) -> nix::Result<()> {
    let ret = unsafe {
        libc::linkat(
            olddirfd.as_raw_fd(),
            oldpath.as_ptr(),
            newdirfd.as_raw_fd(),
            newpath.as_ptr(),
            flags,
        )
    };
    Errno::result(ret).map(drop)
}
