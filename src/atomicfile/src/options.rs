use std::{ffi::CString, time::SystemTime};

use nix::sys::stat::Mode;

use crate::{contents::Contents, error::Error};

/// One configuration change, applied by [`Config::from_options`].
#[derive(Debug)]
pub enum CreateOption {
    Contents(Contents),
    Durable,
    Preallocate(i64),
    Xattr { name: String, value: Vec<u8> },
    Permissions(u32),
    Ownership { uid: Option<u32>, gid: Option<u32> },
    ModificationTime(SystemTime),
    AccessTime(SystemTime),
}

/// Bytes to copy into the file.
pub fn contents(contents: impl Into<Contents>) -> CreateOption {
    CreateOption::Contents(contents.into())
}

/// Flush the file before it's linked and its directory afterwards.
pub fn durable() -> CreateOption {
    CreateOption::Durable
}

/// Reserve at least `size` bytes without changing the file size.
pub fn preallocate(size: i64) -> CreateOption {
    CreateOption::Preallocate(size)
}

pub fn xattr(name: impl Into<String>, value: impl Into<Vec<u8>>) -> CreateOption {
    CreateOption::Xattr {
        name: name.into(),
        value: value.into(),
    }
}

pub fn permissions(mode: u32) -> CreateOption {
    CreateOption::Permissions(mode)
}

/// `None` leaves that id alone. uid and gid can also be given in separate options.
pub fn ownership(uid: Option<u32>, gid: Option<u32>) -> CreateOption {
    CreateOption::Ownership { uid, gid }
}

pub fn modification_time(time: SystemTime) -> CreateOption {
    CreateOption::ModificationTime(time)
}

pub fn access_time(time: SystemTime) -> CreateOption {
    CreateOption::AccessTime(time)
}

#[derive(Debug, Default)]
pub struct Config {
    pub(crate) contents: Option<Contents>,
    pub(crate) durable: bool,
    pub(crate) preallocate: Option<u64>,
    pub(crate) xattrs: Vec<(CString, Vec<u8>)>,
    pub(crate) permissions: Option<Mode>,
    pub(crate) uid: Option<u32>,
    pub(crate) gid: Option<u32>,
    pub(crate) mtime: Option<SystemTime>,
    pub(crate) atime: Option<SystemTime>,
}

// scalar options can only be set once
fn set_once<T>(slot: &mut Option<T>, value: T, field: &'static str) -> Result<(), Error> {
    if slot.is_some() {
        return Err(Error::DuplicateOption(field));
    }
    *slot = Some(value);
    Ok(())
}

impl CreateOption {
    pub fn apply(self, mut cfg: Config) -> Result<Config, Error> {
        match self {
            CreateOption::Contents(c) => set_once(&mut cfg.contents, c, "contents")?,
            CreateOption::Durable => cfg.durable = true,
            CreateOption::Preallocate(size) => {
                let size = u64::try_from(size).map_err(|_| {
                    Error::InvalidArgument(format!("invalid preallocation size: {}", size))
                })?;
                set_once(&mut cfg.preallocate, size, "preallocate")?;
            }
            CreateOption::Xattr { name, value } => {
                if name.is_empty() {
                    return Err(Error::InvalidArgument("empty xattr name".into()));
                }
                let name = CString::new(name).map_err(|e| {
                    Error::InvalidArgument(format!(
                        "xattr name contains nul: {:?}",
                        String::from_utf8_lossy(&e.into_vec())
                    ))
                })?;
                cfg.xattrs.push((name, value));
            }
            CreateOption::Permissions(mode) => {
                let mode = Mode::from_bits(mode as libc::mode_t).ok_or_else(|| {
                    Error::InvalidArgument(format!("invalid permissions: {:#o}", mode))
                })?;
                set_once(&mut cfg.permissions, mode, "permissions")?;
            }
            CreateOption::Ownership { uid, gid } => {
                // fchown reads (uid_t)-1 as "unchanged"
                if uid == Some(u32::MAX) || gid == Some(u32::MAX) {
                    return Err(Error::InvalidArgument(format!(
                        "invalid owner: uid {:?} gid {:?}",
                        uid, gid
                    )));
                }
                if let Some(uid) = uid {
                    set_once(&mut cfg.uid, uid, "uid")?;
                }
                if let Some(gid) = gid {
                    set_once(&mut cfg.gid, gid, "gid")?;
                }
            }
            CreateOption::ModificationTime(t) => set_once(&mut cfg.mtime, t, "mtime")?,
            CreateOption::AccessTime(t) => set_once(&mut cfg.atime, t, "atime")?,
        }

        Ok(cfg)
    }
}

impl Config {
    /// Applies options in order, stopping at the first error.
    pub fn from_options(options: impl IntoIterator<Item = CreateOption>) -> Result<Self, Error> {
        options
            .into_iter()
            .try_fold(Config::default(), |cfg, opt| opt.apply(cfg))
    }

    // explicit request only: a size guessed from contents doesn't count
    pub(crate) fn explicit_preallocation(&self) -> Option<u64> {
        self.preallocate.filter(|&n| n > 0)
    }

    pub(crate) fn has_ownership(&self) -> bool {
        self.uid.is_some() || self.gid.is_some()
    }

    pub(crate) fn has_timestamps(&self) -> bool {
        self.mtime.is_some() || self.atime.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn expect_duplicate(opts: Vec<CreateOption>, field: &str) {
        match Config::from_options(opts) {
            Err(Error::DuplicateOption(f)) => assert_eq!(f, field),
            other => panic!("expected duplicate {}, got {:?}", field, other),
        }
    }

    #[test]
    fn empty_options() {
        let cfg = Config::from_options([]).unwrap();
        assert!(cfg.contents.is_none());
        assert!(!cfg.durable);
        assert!(!cfg.has_ownership());
        assert!(!cfg.has_timestamps());
        assert_eq!(cfg.explicit_preallocation(), None);
    }

    #[test]
    fn duplicate_scalars_rejected() {
        expect_duplicate(vec![permissions(0o600), permissions(0o644)], "permissions");
        expect_duplicate(vec![contents("a"), contents("b")], "contents");
        expect_duplicate(vec![preallocate(10), preallocate(20)], "preallocate");
        expect_duplicate(vec![preallocate(0), preallocate(0)], "preallocate");
        expect_duplicate(
            vec![
                modification_time(SystemTime::UNIX_EPOCH),
                modification_time(SystemTime::UNIX_EPOCH),
            ],
            "mtime",
        );
        expect_duplicate(
            vec![
                access_time(SystemTime::UNIX_EPOCH),
                access_time(SystemTime::UNIX_EPOCH),
            ],
            "atime",
        );
        expect_duplicate(
            vec![ownership(Some(0), None), ownership(Some(0), None)],
            "uid",
        );
        expect_duplicate(
            vec![ownership(Some(1), Some(2)), ownership(None, Some(3))],
            "gid",
        );
    }

    #[test]
    fn ownership_fields_independent() {
        let cfg = Config::from_options([ownership(Some(0), None), ownership(None, Some(0))]).unwrap();
        assert_eq!(cfg.uid, Some(0));
        assert_eq!(cfg.gid, Some(0));
        assert!(cfg.has_ownership());
    }

    #[test]
    fn unchanged_id_sentinel_rejected() {
        for opt in [ownership(Some(u32::MAX), None), ownership(Some(0), Some(u32::MAX))] {
            assert!(matches!(
                Config::from_options([opt]),
                Err(Error::InvalidArgument(_))
            ));
        }
        let cfg = Config::from_options([ownership(Some(u32::MAX - 1), None)]).unwrap();
        assert_eq!(cfg.uid, Some(u32::MAX - 1));
    }

    #[test]
    fn durable_is_idempotent() {
        let cfg = Config::from_options([durable(), durable()]).unwrap();
        assert!(cfg.durable);
    }

    #[test]
    fn negative_preallocation_rejected() {
        assert!(matches!(
            Config::from_options([preallocate(-1)]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn zero_preallocation_is_not_explicit() {
        let cfg = Config::from_options([preallocate(0)]).unwrap();
        assert_eq!(cfg.preallocate, Some(0));
        assert_eq!(cfg.explicit_preallocation(), None);
    }

    #[test]
    fn invalid_permission_bits_rejected() {
        assert!(matches!(
            Config::from_options([permissions(0o170644)]),
            Err(Error::InvalidArgument(_))
        ));
        let cfg = Config::from_options([permissions(0o4755)]).unwrap();
        assert_eq!(cfg.permissions.unwrap().bits(), 0o4755);
    }

    #[test]
    fn xattrs_append_in_order() {
        let cfg = Config::from_options([
            xattr("user.a", "1"),
            xattr("user.b", "2"),
            xattr("user.a", "3"),
        ])
        .unwrap();
        let names: Vec<_> = cfg
            .xattrs
            .iter()
            .map(|(n, v)| (n.to_str().unwrap(), v.as_slice()))
            .collect();
        assert_eq!(
            names,
            [
                ("user.a", &b"1"[..]),
                ("user.b", &b"2"[..]),
                ("user.a", &b"3"[..])
            ]
        );
    }

    #[test]
    fn bad_xattr_names_rejected() {
        assert!(matches!(
            Config::from_options([xattr("", "v")]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Config::from_options([xattr("user.a\0b", "v")]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn stops_at_first_failure() {
        // the bad option comes first, so the duplicate is never reached
        let res = Config::from_options([
            preallocate(-5),
            permissions(0o600),
            permissions(0o600),
        ]);
        assert!(matches!(res, Err(Error::InvalidArgument(_))));

        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1);
        let cfg = Config::from_options([modification_time(t), access_time(t)]).unwrap();
        assert!(cfg.has_timestamps());
    }
}
