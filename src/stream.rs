//! Polymorphic random-access byte stream.
//!
//! The codecs in this crate are written once against [`Stream`] and run
//! unmodified whether the bytes come from a file on disk (loading a top
//! level `ARC`) or from an in-memory buffer (re-parsing a `GMD` payload
//! that was just decompressed out of an `ArcEntry`).
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Maps an I/O error to the closed error set, turning a premature EOF into
/// [`Error::ShortRead`] rather than a generic [`Error::Io`].
fn map_io(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::ShortRead
    } else {
        Error::Io(e)
    }
}

/// A random-access byte sequence backed by either a file handle or an
/// in-memory buffer.
#[derive(Debug)]
pub enum Stream {
    /// A file-backed stream, opened for both reading and writing.
    File { file: File, name: String },
    /// A buffer-backed stream over an owned `Vec<u8>`.
    Buffer { data: Vec<u8>, pos: u64, name: String },
}

impl Stream {
    /// Opens an existing file for reading and writing.
    pub fn open_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Stream::File {
            file,
            name: path.display().to_string(),
        })
    }

    /// Creates a new (truncated) file for writing.
    pub fn create_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        Ok(Stream::File {
            file,
            name: path.display().to_string(),
        })
    }

    /// Wraps an in-memory buffer, labeled with a diagnostic `name`.
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Stream::Buffer {
            data,
            pos: 0,
            name: name.into(),
        }
    }

    /// Creates an empty, growable in-memory stream for writing.
    pub fn new_buffer(name: impl Into<String>) -> Self {
        Self::from_bytes(name, Vec::new())
    }

    /// Diagnostic label: the file path, or the synthetic name given to a
    /// buffer-backed stream.
    pub fn name(&self) -> &str {
        match self {
            Stream::File { name, .. } => name,
            Stream::Buffer { name, .. } => name,
        }
    }

    /// Current stream position.
    pub fn tell(&mut self) -> Result<u64> {
        self.stream_position().map_err(map_io)
    }

    /// Consumes the buffer-backed stream, returning its bytes. Panics if
    /// called on a file-backed stream — callers use [`Stream::read_all`]
    /// when the variant is not statically known.
    pub fn into_vec(self) -> Vec<u8> {
        match self {
            Stream::Buffer { data, .. } => data,
            Stream::File { .. } => panic!("into_vec called on a file-backed Stream"),
        }
    }

    /// Fills `dst` completely or fails with [`Error::ShortRead`].
    pub fn read_exact(&mut self, dst: &mut [u8]) -> Result<()> {
        Read::read_exact(self, dst).map_err(map_io)
    }

    /// Writes every byte of `src` or fails.
    pub fn write_all(&mut self, src: &[u8]) -> Result<()> {
        Write::write_all(self, src).map_err(map_io)
    }

    /// Reads up to and consuming one NUL terminator; the returned bytes
    /// exclude the NUL. Fails with [`Error::UnterminatedCString`] if the
    /// stream ends first.
    pub fn read_cstr(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match Read::read(self, &mut byte) {
                Ok(0) => return Err(Error::UnterminatedCString),
                Ok(_) => {
                    if byte[0] == 0 {
                        return Ok(out);
                    }
                    out.push(byte[0]);
                }
                Err(e) => return Err(map_io(e)),
            }
        }
    }

    /// Returns the full contents of the stream; the current position is
    /// restored before returning.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let saved = self.tell()?;
        self.seek(SeekFrom::Start(0)).map_err(map_io)?;
        let mut buf = Vec::new();
        Read::read_to_end(self, &mut buf).map_err(map_io)?;
        self.seek(SeekFrom::Start(saved)).map_err(map_io)?;
        Ok(buf)
    }

    /// Total length of the stream in bytes.
    pub fn len(&mut self) -> Result<u64> {
        match self {
            Stream::Buffer { data, .. } => Ok(data.len() as u64),
            Stream::File { .. } => {
                let saved = self.tell()?;
                let end = self.seek(SeekFrom::End(0)).map_err(map_io)?;
                self.seek(SeekFrom::Start(saved)).map_err(map_io)?;
                Ok(end)
            }
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::File { file, .. } => file.read(buf),
            Stream::Buffer { data, pos, .. } => {
                let p = *pos as usize;
                if p >= data.len() {
                    return Ok(0);
                }
                let n = buf.len().min(data.len() - p);
                buf[..n].copy_from_slice(&data[p..p + n]);
                *pos += n as u64;
                Ok(n)
            }
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::File { file, .. } => file.write(buf),
            Stream::Buffer { data, pos, .. } => {
                let p = *pos as usize;
                if p + buf.len() > data.len() {
                    data.resize(p + buf.len(), 0);
                }
                data[p..p + buf.len()].copy_from_slice(buf);
                *pos += buf.len() as u64;
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::File { file, .. } => file.flush(),
            Stream::Buffer { .. } => Ok(()),
        }
    }
}

impl Seek for Stream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Stream::File { file, .. } => file.seek(pos),
            Stream::Buffer { data, pos: cur, .. } => {
                let len = data.len() as i64;
                let target = match pos {
                    SeekFrom::Start(off) => off as i64,
                    SeekFrom::Current(off) => *cur as i64 + off,
                    SeekFrom::End(off) => len + off,
                };
                // Out-of-range seeks clamp to [0, size] rather than error.
                let clamped = target.clamp(0, len) as u64;
                *cur = clamped;
                Ok(clamped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_read_cstr() {
        let mut s = Stream::from_bytes("test", b"hello\0world\0".to_vec());
        assert_eq!(s.read_cstr().unwrap(), b"hello");
        assert_eq!(s.read_cstr().unwrap(), b"world");
    }

    #[test]
    fn buffer_read_cstr_unterminated() {
        let mut s = Stream::from_bytes("test", b"hello".to_vec());
        assert!(matches!(s.read_cstr(), Err(Error::UnterminatedCString)));
    }

    #[test]
    fn buffer_seek_clamps() {
        let mut s = Stream::from_bytes("test", vec![1, 2, 3]);
        assert_eq!(s.seek(SeekFrom::End(100)).unwrap(), 3);
        assert_eq!(s.seek(SeekFrom::Start(100)).unwrap(), 3);
        assert_eq!(s.seek(SeekFrom::Current(-100)).unwrap(), 0);
    }

    #[test]
    fn buffer_read_all_restores_position() {
        let mut s = Stream::from_bytes("test", vec![1, 2, 3, 4]);
        s.seek(SeekFrom::Start(2)).unwrap();
        let all = s.read_all().unwrap();
        assert_eq!(all, vec![1, 2, 3, 4]);
        assert_eq!(s.tell().unwrap(), 2);
    }

    #[test]
    fn buffer_write_grows() {
        let mut s = Stream::new_buffer("test");
        s.write_all(b"abc").unwrap();
        s.seek(SeekFrom::Start(1)).unwrap();
        s.write_all(b"XY").unwrap();
        assert_eq!(s.into_vec(), b"aXY".to_vec());
    }
}
