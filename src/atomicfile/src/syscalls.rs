use std::{
    ffi::{CStr, CString},
    fs::File,
    io,
    os::{
        fd::{AsRawFd, FromRawFd, OwnedFd},
        unix::{ffi::OsStrExt, fs::fchown},
    },
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use nix::{
    fcntl::{openat, OFlag},
    sys::{
        stat::{fchmod, futimens, Mode},
        time::TimeSpec,
    },
    unistd::fsync,
};

use crate::{
    contents::Contents,
    sys::{
        copy::copy_contents,
        file::{linkat, preallocate, punch_hole},
        proc::{with_fd_path, AT_FDCWD},
        xattr::fsetxattr,
    },
};

/// How an anonymous file gets its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkVia {
    /// `linkat(fd, "", AT_FDCWD, target, AT_EMPTY_PATH)`
    EmptyPath,
    /// `linkat(AT_FDCWD, "/proc/self/fd/N", AT_FDCWD, target, AT_SYMLINK_FOLLOW)`
    ProcSelfFd,
}

/// Every kernel operation the creation pipeline performs.
///
/// [`Native`] is the real thing. Other implementations exist to observe call
/// order and inject failures.
pub trait Syscalls {
    /// Anonymous (unlinked) file handle.
    type File;
    /// Read-only directory handle, only used for fsync.
    type Dir;

    fn open_tmpfile(&self, dir: &Path) -> io::Result<Self::File>;
    fn open_dir(&self, dir: &Path) -> io::Result<Self::Dir>;

    fn fchown(&self, file: &Self::File, uid: Option<u32>, gid: Option<u32>) -> io::Result<()>;
    fn fchmod(&self, file: &Self::File, mode: Mode) -> io::Result<()>;
    fn preallocate(&self, file: &Self::File, len: u64) -> io::Result<()>;
    fn copy_contents(&self, file: &Self::File, contents: &mut Contents) -> io::Result<u64>;
    fn punch_hole(&self, file: &Self::File, offset: u64, len: u64) -> io::Result<()>;
    /// Sets st_size. Also drops blocks reserved past the new end.
    fn truncate(&self, file: &Self::File, len: u64) -> io::Result<()>;
    fn fsetxattr(&self, file: &Self::File, name: &CStr, value: &[u8]) -> io::Result<()>;
    /// `None` leaves the timestamp untouched.
    fn futimens(
        &self,
        file: &Self::File,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> io::Result<()>;

    fn fsync_file(&self, file: &Self::File) -> io::Result<()>;
    fn link(&self, file: &Self::File, via: LinkVia, target: &Path) -> io::Result<()>;
    fn fsync_dir(&self, dir: &Self::Dir) -> io::Result<()>;
}

/// Linux syscalls. Requires O_TMPFILE support (3.11+) in the target filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct Native;

fn path_cstring(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

fn timespec(time: Option<SystemTime>) -> TimeSpec {
    match time {
        None => TimeSpec::UTIME_OMIT,
        Some(t) => match t.duration_since(UNIX_EPOCH) {
            Ok(d) => TimeSpec::from_duration(d),
            // before epoch: negative seconds, positive nanoseconds
            Err(e) => {
                let d = e.duration();
                let mut secs = -(d.as_secs() as i64);
                let mut nsecs = d.subsec_nanos() as i64;
                if nsecs > 0 {
                    secs -= 1;
                    nsecs = 1_000_000_000 - nsecs;
                }
                TimeSpec::new(secs as libc::time_t, nsecs as _)
            }
        },
    }
}

impl Syscalls for Native {
    type File = File;
    type Dir = OwnedFd;

    fn open_tmpfile(&self, dir: &Path) -> io::Result<File> {
        // no O_APPEND: it breaks FICLONE and copy_file_range
        let fd = openat(
            None,
            dir,
            OFlag::O_TMPFILE | OFlag::O_WRONLY | OFlag::O_CLOEXEC,
            Mode::from_bits_truncate(0o666),
        )?;
        Ok(unsafe { File::from_raw_fd(fd) })
    }

    fn open_dir(&self, dir: &Path) -> io::Result<OwnedFd> {
        // read-only is enough for fsync on Linux
        let fd = openat(
            None,
            dir,
            OFlag::O_RDONLY | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC,
            Mode::empty(),
        )?;
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    fn fchown(&self, file: &File, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        fchown(file, uid, gid)
    }

    fn fchmod(&self, file: &File, mode: Mode) -> io::Result<()> {
        Ok(fchmod(file.as_raw_fd(), mode)?)
    }

    fn preallocate(&self, file: &File, len: u64) -> io::Result<()> {
        Ok(preallocate(file, len)?)
    }

    fn copy_contents(&self, file: &File, contents: &mut Contents) -> io::Result<u64> {
        copy_contents(contents, file)
    }

    fn punch_hole(&self, file: &File, offset: u64, len: u64) -> io::Result<()> {
        Ok(punch_hole(file, offset, len)?)
    }

    fn truncate(&self, file: &File, len: u64) -> io::Result<()> {
        file.set_len(len)
    }

    fn fsetxattr(&self, file: &File, name: &CStr, value: &[u8]) -> io::Result<()> {
        Ok(fsetxattr(file, name, value, 0)?)
    }

    fn futimens(
        &self,
        file: &File,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> io::Result<()> {
        Ok(futimens(
            file.as_raw_fd(),
            &timespec(atime),
            &timespec(mtime),
        )?)
    }

    fn fsync_file(&self, file: &File) -> io::Result<()> {
        Ok(fsync(file.as_raw_fd())?)
    }

    fn link(&self, file: &File, via: LinkVia, target: &Path) -> io::Result<()> {
        let target = path_cstring(target)?;
        match via {
            // needs CAP_DAC_READ_SEARCH: ENOENT otherwise
            LinkVia::EmptyPath => Ok(linkat(
                file,
                c"",
                AT_FDCWD,
                &target,
                libc::AT_EMPTY_PATH,
            )?),
            LinkVia::ProcSelfFd => Ok(with_fd_path(file, |fd_path| {
                linkat(AT_FDCWD, fd_path, AT_FDCWD, &target, libc::AT_SYMLINK_FOLLOW)
            })?),
        }
    }

    fn fsync_dir(&self, dir: &OwnedFd) -> io::Result<()> {
        Ok(fsync(dir.as_raw_fd())?)
    }
}
