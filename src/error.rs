//! Library-wide error and result types.
use std::fmt;
use std::io;

/// Result alias used throughout the codec core.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the `ARC`/`GMD` codecs can produce.
///
/// This is a closed set: every failure mode the format parsers can hit maps
/// to exactly one of these variants, so callers can match on `kind` rather
/// than parse a message.
#[derive(Debug)]
pub enum Error {
    /// An underlying read/write/seek operation failed.
    Io(io::Error),
    /// The stream ended before the requested number of bytes could be read.
    ShortRead,
    /// A NUL-terminated string ran off the end of the stream.
    UnterminatedCString,
    /// A container's magic signature did not match what was expected.
    BadMagic {
        expected: &'static [u8],
        actual: Vec<u8>,
    },
    /// A format version is present but not one this codec understands.
    BadVersion(u32),
    /// A declared size and a measured size disagree.
    BadSize { expected: u64, actual: u64 },
    /// A structural invariant was violated; the message names which one.
    BadFormat(String),
    /// The first byte of a "compressed" payload failed the zlib deflate check.
    BadCompressionMagic(u8),
    /// zlib inflate/deflate did not terminate cleanly.
    Decompression(String),
    /// A GMD entry's stored hashes do not match the chained CRC of its key.
    HashMismatch {
        index: usize,
        expected: (u32, u32),
        got: (u32, u32),
    },
    /// A filename is too long for the archive's selected name-field width.
    NameTooLong(usize),
    /// Two entries sanitize to the same filesystem identifier.
    DuplicateKey(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::ShortRead => write!(f, "unexpected end of stream"),
            Error::UnterminatedCString => write!(f, "unterminated C string"),
            Error::BadMagic { expected, actual } => write!(
                f,
                "bad magic: expected {:02x?}, got {:02x?}",
                expected, actual
            ),
            Error::BadVersion(v) => write!(f, "unsupported version {v:#x}"),
            Error::BadSize { expected, actual } => {
                write!(f, "bad size: expected {expected}, got {actual}")
            }
            Error::BadFormat(msg) => write!(f, "bad format: {msg}"),
            Error::BadCompressionMagic(b) => {
                write!(f, "unexpected compression first byte: {b:#04x}")
            }
            Error::Decompression(msg) => write!(f, "decompression error: {msg}"),
            Error::HashMismatch {
                index,
                expected,
                got,
            } => write!(
                f,
                "hash mismatch at entry {index}: expected {:#010x}/{:#010x}, got {:#010x}/{:#010x}",
                expected.0, expected.1, got.0, got.1
            ),
            Error::NameTooLong(n) => write!(f, "filename too long ({n} bytes including NUL)"),
            Error::DuplicateKey(name) => write!(f, "duplicate sanitized identifier: {name}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
