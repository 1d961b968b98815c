use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::{
    error::{Attribute, Error, SyncTarget},
    options::Config,
    syscalls::Syscalls,
};

/// Anonymous file that no other process can reach yet.
///
/// Dropping it closes the descriptor, and the kernel frees the inode since it
/// was never linked. [`StagedFile::publish`] consumes it.
pub struct StagedFile<'a, S: Syscalls> {
    pub(crate) sys: &'a S,
    pub(crate) file: S::File,
    pub(crate) dir: PathBuf,
}

/// Read-only directory handle, kept open so the new entry can be flushed.
pub struct DirHandle<'a, S: Syscalls> {
    sys: &'a S,
    dir: S::Dir,
}

impl<'a, S: Syscalls> DirHandle<'a, S> {
    pub fn open(sys: &'a S, dir: &Path) -> Result<Self, Error> {
        let fd = sys.open_dir(dir).map_err(|source| Error::StagingFailed {
            what: "opening directory",
            path: dir.to_owned(),
            source,
        })?;
        Ok(Self { sys, dir: fd })
    }

    pub fn fsync(&self) -> Result<(), Error> {
        self.sys
            .fsync_dir(&self.dir)
            .map_err(|source| Error::DurabilityFailed {
                target: SyncTarget::Directory,
                source,
            })
    }
}

impl<'a, S: Syscalls> StagedFile<'a, S> {
    pub fn open(sys: &'a S, dir: &Path) -> Result<Self, Error> {
        let file = sys.open_tmpfile(dir).map_err(|source| Error::StagingFailed {
            what: "opening anonymous file in",
            path: dir.to_owned(),
            source,
        })?;
        Ok(Self {
            sys,
            file,
            dir: dir.to_owned(),
        })
    }

    /// Everything except durability and the name, in this order:
    /// owner, mode, preallocation, contents, release of unused space, xattrs,
    /// timestamps.
    pub fn apply(&self, cfg: &mut Config) -> Result<(), Error> {
        // suid/sgid gets cleared by chown, so chown goes before chmod
        if cfg.has_ownership() {
            trace!(uid = ?cfg.uid, gid = ?cfg.gid, "fchown");
            self.sys
                .fchown(&self.file, cfg.uid, cfg.gid)
                .map_err(Error::attribute(Attribute::Ownership))?;
        }

        // before any data is written
        if let Some(mode) = cfg.permissions {
            trace!("fchmod {:o}", mode.bits());
            self.sys
                .fchmod(&self.file, mode)
                .map_err(Error::attribute(Attribute::Permissions))?;
        }

        self.preallocate(cfg)?;

        let written = match cfg.contents.as_mut() {
            Some(contents) => {
                let n = self
                    .sys
                    .copy_contents(&self.file, contents)
                    .map_err(Error::attribute(Attribute::Contents))?;
                trace!(written = n, "populated file");
                n
            }
            None => 0,
        };

        if let Some(reserved) = cfg.explicit_preallocation() {
            if written < reserved {
                self.release_unused(written, reserved);
            }
        }

        for (name, value) in &cfg.xattrs {
            trace!(name = ?name, len = value.len(), "fsetxattr");
            self.sys
                .fsetxattr(&self.file, name, value)
                .map_err(|source| Error::AttributeApplicationFailed {
                    attribute: Attribute::Xattr(name.to_string_lossy().into_owned()),
                    source,
                })?;
        }

        // last: writes and xattrs would bump mtime
        if cfg.has_timestamps() {
            trace!(atime = ?cfg.atime, mtime = ?cfg.mtime, "futimens");
            self.sys
                .futimens(&self.file, cfg.atime, cfg.mtime)
                .map_err(Error::attribute(Attribute::Timestamps))?;
        }

        Ok(())
    }

    // Best-effort: gives back what an explicit reservation didn't use.
    // ext4 clamps PUNCH_HOLE to st_size, and a KEEP_SIZE reservation lies
    // entirely past it, so truncating to the current size is what actually
    // frees the blocks there.
    fn release_unused(&self, written: u64, reserved: u64) {
        if let Err(e) = self.sys.punch_hole(&self.file, written, reserved - written) {
            debug!(written, reserved, error = %e, "punching unused preallocation failed");
        }
        if let Err(e) = self.sys.truncate(&self.file, written) {
            debug!(written, reserved, error = %e, "trimming unused preallocation failed");
        }
    }

    fn preallocate(&self, cfg: &Config) -> Result<(), Error> {
        if let Some(size) = cfg.explicit_preallocation() {
            trace!(size, "preallocating");
            return self
                .sys
                .preallocate(&self.file, size)
                .map_err(|source| Error::PreallocationFailed { size, source });
        }

        // guessed from contents: only a hint
        let guess = cfg
            .contents
            .as_ref()
            .and_then(|c| c.size_hint())
            .filter(|&n| n > 0);
        if let Some(size) = guess {
            if let Err(e) = self.sys.preallocate(&self.file, size) {
                debug!(size, error = %e, "implicit preallocation failed");
            }
        }

        Ok(())
    }

    pub fn fsync(&self) -> Result<(), Error> {
        self.sys
            .fsync_file(&self.file)
            .map_err(|source| Error::DurabilityFailed {
                target: SyncTarget::File,
                source,
            })
    }
}
