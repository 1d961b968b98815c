//! Atomic creation of fully-formed regular files (Linux).
//!
//! The file is built as an anonymous `O_TMPFILE` inode in the target
//! directory: owner, mode, preallocation, contents, xattrs and timestamps are
//! all applied through the descriptor, optionally fsynced, and only then
//! linked into the namespace with `linkat`. Until that point no other process
//! can see it, and after it the file is complete. Existing files are never
//! replaced.
//!
//! ```no_run
//! use atomicfile::{contents, create, permissions, xattr};
//!
//! create(
//!     "/tmp/x/out.bin",
//!     [contents("hello"), permissions(0o640), xattr("user.tag", "v")],
//! )?;
//! # Ok::<(), atomicfile::Error>(())
//! ```

mod contents;
mod create;
mod error;
mod options;
mod publish;
mod staging;
mod sys;
mod syscalls;

pub use contents::Contents;
pub use create::{create, create_with};
pub use error::{Attribute, Error, SyncTarget};
pub use options::{
    access_time, contents, durable, modification_time, ownership, permissions, preallocate,
    xattr, Config, CreateOption,
};
pub use publish::LINK_STRATEGIES;
pub use syscalls::{LinkVia, Native, Syscalls};
