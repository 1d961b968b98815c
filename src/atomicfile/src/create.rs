use std::path::Path;

use tracing::trace;

use crate::{
    error::Error,
    options::{Config, CreateOption},
    staging::{DirHandle, StagedFile},
    syscalls::{Native, Syscalls},
};

// parent dir of the target. linkat needs a real final component
fn split_target(path: &Path) -> Result<&Path, Error> {
    // Path::file_name skips a trailing "." and would name the parent instead
    let bytes = path.as_os_str().as_encoded_bytes();
    let trailing = bytes.ends_with(b"/") || bytes.ends_with(b"/.");
    if path.file_name().is_none() || trailing {
        return Err(Error::InvalidArgument(format!(
            "not a file path: {}",
            path.display()
        )));
    }

    Ok(match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    })
}

/// Atomically creates a new regular file at `path`.
///
/// The file only gets a name after contents, mode, owner, xattrs and times are
/// all in place, so nobody ever sees it half-done. Fails with
/// [`Error::AlreadyExists`] instead of replacing anything.
pub fn create(
    path: impl AsRef<Path>,
    options: impl IntoIterator<Item = CreateOption>,
) -> Result<(), Error> {
    create_with(&Native, path, options)
}

/// [`create`] on top of any [`Syscalls`] implementation.
pub fn create_with<S: Syscalls>(
    sys: &S,
    path: impl AsRef<Path>,
    options: impl IntoIterator<Item = CreateOption>,
) -> Result<(), Error> {
    let path = path.as_ref();

    // nothing touches the filesystem until options and path are valid
    let mut cfg = Config::from_options(options)?;
    let dir = split_target(path)?;
    trace!(path = %path.display(), durable = cfg.durable, "creating file");

    let dir_handle = match cfg.durable {
        true => Some(DirHandle::open(sys, dir)?),
        false => None,
    };

    let staged = StagedFile::open(sys, dir)?;
    staged.apply(&mut cfg)?;

    // data must be durable before the name is visible
    if cfg.durable {
        staged.fsync()?;
    }

    staged.publish(path)?;

    if let Some(dir_handle) = dir_handle {
        dir_handle.fsync()?;
    }

    Ok(())
}
