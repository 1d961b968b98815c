use std::{fs::File, os::fd::AsFd, path::PathBuf, time::SystemTime};

use anyhow::{anyhow, Context};
use atomicfile::{
    access_time, contents, durable, modification_time, ownership, permissions, preallocate,
    xattr, Contents, CreateOption,
};
use clap::{ArgAction, Parser};
use tracing::{debug, Level};

/// Atomically create FILENAME from stdin: it appears complete or not at all.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Name of the file to create
    filename: PathBuf,

    /// Fsync the file and its directory
    #[arg(long)]
    fsync: bool,

    /// Preallocate file space (bytes)
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    prealloc: i64,

    /// Extended attribute to add to the file
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_xattr)]
    xattr: Vec<(String, String)>,

    /// File permissions (octal)
    #[arg(long, value_name = "MODE", value_parser = parse_perm)]
    perm: Option<u32>,

    /// File owner user
    #[arg(long)]
    uid: Option<u32>,

    /// File owner group
    #[arg(long)]
    gid: Option<u32>,

    /// File modification time (RFC 3339)
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    mtime: Option<SystemTime>,

    /// File access time (RFC 3339)
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    atime: Option<SystemTime>,

    /// More logging (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_xattr(s: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE: {}", s))?;
    Ok((key.to_owned(), value.to_owned()))
}

fn parse_perm(s: &str) -> anyhow::Result<u32> {
    u32::from_str_radix(s, 8).with_context(|| format!("invalid octal mode: {}", s))
}

fn parse_time(s: &str) -> anyhow::Result<SystemTime> {
    let t = chrono::DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid RFC 3339 time: {}", s))?;
    Ok(t.into())
}

impl Cli {
    fn into_options(self, stdin: Contents) -> Vec<CreateOption> {
        let mut opts = vec![contents(stdin)];
        if self.fsync {
            opts.push(durable());
        }
        if self.prealloc != 0 {
            opts.push(preallocate(self.prealloc));
        }
        for (key, value) in self.xattr {
            opts.push(xattr(key, value));
        }
        if let Some(perm) = self.perm {
            opts.push(permissions(perm));
        }
        if self.uid.is_some() || self.gid.is_some() {
            opts.push(ownership(self.uid, self.gid));
        }
        if let Some(mtime) = self.mtime {
            opts.push(modification_time(mtime));
        }
        if let Some(atime) = self.atime {
            opts.push(access_time(atime));
        }
        opts
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    // as a File: redirected regular files get a size hint and the reflink path
    let stdin = std::io::stdin()
        .as_fd()
        .try_clone_to_owned()
        .context("dup stdin")?;
    let stdin = Contents::from(File::from(stdin));

    let filename = cli.filename.clone();
    debug!(?filename, "creating");
    atomicfile::create(&filename, cli.into_options(stdin))
        .with_context(|| format!("creating {}", filename.display()))?;

    Ok(())
}
