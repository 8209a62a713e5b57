//! Deflate codec for `ARC` entry payloads.
use crate::error::{Error, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Decompresses `input` to exactly `expected_size` bytes.
///
/// If `input.len() == expected_size` the entry was never compressed and a
/// copy of `input` is returned unchanged. Otherwise the first byte must pass
/// the zlib deflate-method check (low nibble `8`, high nibble `<= 7`), and
/// inflate must consume all input while producing exactly `expected_size`
/// output bytes.
pub fn decompress(input: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    if input.len() == expected_size {
        return Ok(input.to_vec());
    }
    let first = *input.first().ok_or(Error::ShortRead)?;
    if (first & 0x0F) != 8 || (first & 0xF0) > 0x70 {
        return Err(Error::BadCompressionMagic(first));
    }
    let mut decoder = ZlibDecoder::new(input);
    let mut out = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Decompression(e.to_string()))?;
    if out.len() != expected_size {
        return Err(Error::Decompression(format!(
            "expected {expected_size} decompressed bytes, got {}",
            out.len()
        )));
    }
    let mut trailing = [0u8; 1];
    if decoder.read(&mut trailing).unwrap_or(0) != 0 {
        return Err(Error::Decompression("surplus input after inflate".into()));
    }
    Ok(out)
}

/// Deflates `input` with default zlib settings.
///
/// Not required to reproduce the game's original encoder byte-for-byte; the
/// contract is `decompress(compress(x), x.len()) == x`.
pub fn compress(input: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing to a Vec<u8>-backed encoder cannot fail.
    encoder.write_all(input).expect("in-memory zlib write");
    encoder.finish().expect("in-memory zlib finish")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_passthrough() {
        let data = b"hello world";
        assert_eq!(decompress(data, data.len()).unwrap(), data);
    }

    #[test]
    fn roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = compress(&data);
        assert_ne!(compressed.len(), data.len());
        let decompressed = decompress(&compressed, data.len()).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn idempotent_recompression() {
        let data = b"some <PAGE> text with <E123> markup\r\n".repeat(5);
        let once = decompress(&compress(&data), data.len()).unwrap();
        let twice = decompress(&compress(&once), data.len()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn bad_compression_magic() {
        let bogus = vec![0x09u8, 0, 0, 0];
        let err = decompress(&bogus, 100).unwrap_err();
        assert!(matches!(err, Error::BadCompressionMagic(0x09)));
    }
}
