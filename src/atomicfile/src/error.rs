use std::{fmt, io, path::PathBuf};

/// Attribute-application step that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Ownership,
    Permissions,
    Contents,
    Xattr(String),
    Timestamps,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Ownership => f.write_str("fchown"),
            Attribute::Permissions => f.write_str("fchmod"),
            Attribute::Contents => f.write_str("populating file"),
            Attribute::Xattr(name) => write!(f, "fsetxattr({})", name),
            Attribute::Timestamps => f.write_str("futimens"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTarget {
    File,
    Directory,
}

impl fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTarget::File => f.write_str("file"),
            SyncTarget::Directory => f.write_str("directory"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("options: invalid argument: {0}")]
    InvalidArgument(String),

    #[error("options: duplicate option: {0}")]
    DuplicateOption(&'static str),

    #[error("staging: {what} {}", path.display())]
    StagingFailed {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("applying attributes: {attribute}")]
    AttributeApplicationFailed {
        attribute: Attribute,
        #[source]
        source: io::Error,
    },

    #[error("preallocating {size} bytes")]
    PreallocationFailed {
        size: u64,
        #[source]
        source: io::Error,
    },

    #[error("fsync {target}")]
    DurabilityFailed {
        target: SyncTarget,
        #[source]
        source: io::Error,
    },

    #[error("linking file: already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    // source is the fallback's error; primary is kept for diagnostics
    #[error("linking file {} (primary: {primary})", path.display())]
    PublicationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
        primary: io::Error,
    },
}

impl Error {
    pub fn stage(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) | Error::DuplicateOption(_) => "options",
            Error::StagingFailed { .. } => "staging",
            Error::AttributeApplicationFailed { .. } | Error::PreallocationFailed { .. } => {
                "attributes"
            }
            Error::DurabilityFailed { .. } => "durability",
            Error::AlreadyExists { .. } | Error::PublicationFailed { .. } => "publication",
        }
    }

    pub(crate) fn attribute(attribute: Attribute) -> impl FnOnce(io::Error) -> Self {
        move |source| Error::AttributeApplicationFailed { attribute, source }
    }
}
