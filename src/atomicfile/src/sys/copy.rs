use std::{
    fs::File,
    io::{self, Seek, SeekFrom},
    os::fd::AsRawFd,
};

use nix::{errno::Errno, fcntl::copy_file_range};
use tracing::trace;

use crate::contents::Contents;

// various cases of "not supported by this fs / fd combination"
fn is_unsupported(e: Errno) -> bool {
    matches!(
        e,
        Errno::ENOTTY
            | Errno::EBADF
            | Errno::EINVAL
            | Errno::EOPNOTSUPP
            | Errno::ETXTBSY
            | Errno::EXDEV
            | Errno::ENOSYS
    )
}

// whole-file copy-on-write clone. dest must be empty
fn ficlone(src: &File, dest: &File) -> nix::Result<()> {
    let ret = unsafe { libc::ioctl(dest.as_raw_fd(), libc::FICLONE as _, src.as_raw_fd()) };
    Errno::result(ret).map(drop)
}

// copies from the current offsets of both files and advances them
// returns Err only if nothing could be copied with this method at this offset
fn copy_file_range_to_eof(src: &File, dest: &File, written: &mut u64) -> nix::Result<()> {
    loop {
        let n = copy_file_range(src, None, dest, None, 1 << 30)?;
        if n == 0 {
            return Ok(());
        }

        *written += n as u64;
    }
}

/// Fast path for file sources: reflink, then copy_file_range.
///
/// Returns bytes written and whether `src` was fully copied. If not, the rest
/// of `src` (from its current offset) still needs a plain read/write copy.
fn copy_file_fast(src: &File, dest: &File) -> io::Result<(u64, bool)> {
    // pipes and ttys can't seek: skip straight to copy_file_range, which rejects them too
    let mut src_pos = src;
    if matches!(src_pos.stream_position(), Ok(0)) {
        match ficlone(src, dest) {
            Ok(()) => {
                let len = src_pos.seek(SeekFrom::End(0))?;
                trace!(len, "reflinked contents");
                return Ok((len, true));
            }
            Err(e) if is_unsupported(e) => {}
            // don't retry on other errors like ENOSPC: those are real problems
            Err(e) => return Err(e.into()),
        }
    }

    let mut written = 0;
    match copy_file_range_to_eof(src, dest, &mut written) {
        Ok(()) => Ok((written, true)),
        Err(e) if is_unsupported(e) => {
            // offsets stay consistent: both fds were advanced by what was copied
            trace!(written, errno = %e, "copy_file_range unsupported");
            Ok((written, false))
        }
        Err(e) => Err(e.into()),
    }
}

/// Streams all of `contents` into `dest`, returning the number of bytes written.
pub fn copy_contents(contents: &mut Contents, dest: &File) -> io::Result<u64> {
    let mut written = 0;
    if let Some(src) = contents.as_file() {
        let (n, done) = copy_file_fast(src, dest)?;
        if done {
            return Ok(n);
        }
        written = n;
    }

    let mut dest = dest;
    written += io::copy(contents, &mut dest)?;
    Ok(written)
}
