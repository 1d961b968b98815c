use std::{io, path::Path};

use tracing::{debug, trace};

use crate::{
    error::Error,
    staging::StagedFile,
    syscalls::{LinkVia, Syscalls},
};

/// Primary, then fallback.
pub const LINK_STRATEGIES: [LinkVia; 2] = [LinkVia::EmptyPath, LinkVia::ProcSelfFd];

fn already_exists(target: &Path) -> Error {
    Error::AlreadyExists {
        path: target.to_owned(),
    }
}

impl<S: Syscalls> StagedFile<'_, S> {
    fn link(&self, via: LinkVia, target: &Path) -> io::Result<()> {
        let res = self.sys.link(&self.file, via, target);
        match &res {
            Ok(()) => trace!(?via, dir = %self.dir.display(), "linked file"),
            Err(e) => debug!(?via, error = %e, "linkat failed"),
        }
        res
    }

    /// Gives the file its name. Never replaces an existing entry.
    ///
    /// Consumes the staged file: the descriptor is closed exactly once, when
    /// this returns, whether or not linking worked.
    pub fn publish(self, target: &Path) -> Result<(), Error> {
        let [primary_via, fallback_via] = LINK_STRATEGIES;

        let primary = match self.link(primary_via, target) {
            Ok(()) => return Ok(()),
            // create-only: no point in trying another way
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(already_exists(target))
            }
            Err(e) => e,
        };

        match self.link(fallback_via, target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(already_exists(target)),
            Err(source) => Err(Error::PublicationFailed {
                path: target.to_owned(),
                source,
                primary,
            }),
        }
    }
}
