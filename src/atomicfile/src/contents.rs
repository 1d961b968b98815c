use std::{
    fmt,
    fs::File,
    io::{self, Cursor, Read, Seek},
};

/// Source of the bytes copied into a new file.
///
/// Variants are a closed set so that the remaining length can be queried
/// without reading anything: see [`Contents::size_hint`].
pub enum Contents {
    /// In-memory bytes.
    Buffer(Cursor<Vec<u8>>),
    /// Arbitrary reader with a caller-declared remaining length.
    Bounded {
        reader: Box<dyn Read + Send>,
        len: u64,
    },
    /// Open file. Only this variant exposes a descriptor for reflink/copy_file_range.
    File(File),
    /// Another source, capped at `limit` bytes.
    Limited { inner: Box<Contents>, limit: u64 },
    /// Arbitrary reader of unknown length.
    Stream(Box<dyn Read + Send>),
}

impl Contents {
    pub fn bounded(reader: impl Read + Send + 'static, len: u64) -> Self {
        Contents::Bounded {
            reader: Box::new(reader),
            len,
        }
    }

    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        Contents::Stream(Box::new(reader))
    }

    pub fn take(self, limit: u64) -> Self {
        Contents::Limited {
            inner: Box::new(self),
            limit,
        }
    }

    /// Remaining length, if it's known without consuming data.
    pub fn size_hint(&self) -> Option<u64> {
        match self {
            Contents::Buffer(cursor) => {
                let len = cursor.get_ref().len() as u64;
                Some(len.saturating_sub(cursor.position()))
            }
            Contents::Bounded { len, .. } => Some(*len),
            Contents::File(file) => file_size_hint(file),
            Contents::Limited { inner, limit } => inner.size_hint().map(|n| n.min(*limit)),
            Contents::Stream(_) => None,
        }
    }

    /// Returns the file if the whole remaining source is a plain file.
    pub(crate) fn as_file(&self) -> Option<&File> {
        match self {
            Contents::File(file) => Some(file),
            _ => None,
        }
    }
}

// fstat + current offset. pipes, ttys, etc. report nothing
fn file_size_hint(mut file: &File) -> Option<u64> {
    let meta = file.metadata().ok()?;
    if !meta.is_file() {
        return None;
    }

    let pos = file.stream_position().ok()?;
    Some(meta.len().saturating_sub(pos))
}

impl Read for Contents {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Contents::Buffer(cursor) => cursor.read(buf),
            Contents::Bounded { reader, len } => {
                let n = reader.read(buf)?;
                *len = len.saturating_sub(n as u64);
                Ok(n)
            }
            Contents::File(file) => file.read(buf),
            Contents::Limited { inner, limit } => {
                if *limit == 0 {
                    return Ok(0);
                }

                let max = buf.len().min(usize::try_from(*limit).unwrap_or(usize::MAX));
                let n = inner.read(&mut buf[..max])?;
                *limit -= n as u64;
                Ok(n)
            }
            Contents::Stream(reader) => reader.read(buf),
        }
    }
}

impl fmt::Debug for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contents::Buffer(cursor) => f
                .debug_struct("Buffer")
                .field("len", &cursor.get_ref().len())
                .field("pos", &cursor.position())
                .finish(),
            Contents::Bounded { len, .. } => f.debug_struct("Bounded").field("len", len).finish(),
            Contents::File(file) => f.debug_tuple("File").field(file).finish(),
            Contents::Limited { inner, limit } => f
                .debug_struct("Limited")
                .field("inner", inner)
                .field("limit", limit)
                .finish(),
            Contents::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<Vec<u8>> for Contents {
    fn from(data: Vec<u8>) -> Self {
        Contents::Buffer(Cursor::new(data))
    }
}

impl From<&[u8]> for Contents {
    fn from(data: &[u8]) -> Self {
        data.to_vec().into()
    }
}

impl<const N: usize> From<&[u8; N]> for Contents {
    fn from(data: &[u8; N]) -> Self {
        data.to_vec().into()
    }
}

impl From<&str> for Contents {
    fn from(data: &str) -> Self {
        data.as_bytes().into()
    }
}

impl From<String> for Contents {
    fn from(data: String) -> Self {
        data.into_bytes().into()
    }
}

impl From<File> for Contents {
    fn from(file: File) -> Self {
        Contents::File(file)
    }
}
