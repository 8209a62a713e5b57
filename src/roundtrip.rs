//! Round-trip test harness: load every archive under a directory, re-save
//! it in memory, and compare byte-for-byte against the original input.
use crate::deflate;
use crate::error::Result;
use crate::gmd;
use crate::stream::Stream;
use crate::types::EXT_GMD;
use crate::{arc, Error};
use std::fs;
use std::path::{Path, PathBuf};

/// The outcome of round-tripping a single archive.
#[derive(Debug)]
pub struct Mismatch {
    /// Path (or synthetic label) of the file that failed to round-trip.
    pub path: String,
    /// Byte offset of the first differing byte.
    pub offset: usize,
    /// A short hex dump around `offset` from the original bytes.
    pub expected_context: String,
    /// The same window from the re-saved bytes.
    pub actual_context: String,
}

/// Recursively finds every `.arc` file under `root`.
pub fn find_arc_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if !root.is_dir() {
        return Ok(out);
    }
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            out.extend(find_arc_files(&path)?);
        } else if path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("arc"))
            .unwrap_or(false)
        {
            out.push(path);
        }
    }
    Ok(out)
}

fn hex_context(data: &[u8], offset: usize) -> String {
    let start = offset.saturating_sub(8);
    let end = (offset + 8).min(data.len());
    data[start..end]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compares `a` and `b` byte-for-byte, returning the first mismatch (if
/// any) as a [`Mismatch`] labeled with `label`.
pub fn compare_bytes(label: &str, expected: &[u8], actual: &[u8]) -> Option<Mismatch> {
    let common = expected.len().min(actual.len());
    let offset = (0..common).find(|&i| expected[i] != actual[i]).unwrap_or(common);
    if offset == expected.len() && expected.len() == actual.len() {
        return None;
    }
    Some(Mismatch {
        path: label.to_string(),
        offset,
        expected_context: hex_context(expected, offset),
        actual_context: hex_context(actual, offset),
    })
}

/// Loads, re-saves, and compares a single in-memory `ARC` buffer. On
/// success, also recurses into every `GMD`-tagged entry.
pub fn roundtrip_arc_bytes(label: &str, original: &[u8]) -> Result<Option<Mismatch>> {
    let mut stream = Stream::from_bytes(label, original.to_vec());
    let archive = arc::load(&mut stream)?;

    let mut out = Stream::new_buffer(format!("{label} (re-saved)"));
    arc::save(&archive, &mut out)?;
    let resaved = out.into_vec();

    if let Some(mismatch) = compare_bytes(label, original, &resaved) {
        return Ok(Some(mismatch));
    }

    for entry in &archive.entries {
        if entry.ext != EXT_GMD {
            continue;
        }
        let decompressed = deflate::decompress(&entry.content, entry.decomp_size as usize)?;
        let inner_label = format!("{label}/{}", entry.filename);
        if let Some(mismatch) = roundtrip_gmd_bytes(&inner_label, &decompressed)? {
            return Ok(Some(mismatch));
        }
        if entry.is_compressed() {
            let recompressed = deflate::compress(&decompressed);
            let redecompressed =
                deflate::decompress(&recompressed, entry.decomp_size as usize)?;
            if redecompressed != decompressed {
                return Err(Error::BadFormat(format!(
                    "{inner_label}: compression is not idempotent"
                )));
            }
        }
    }

    Ok(None)
}

/// Loads, re-saves, and compares a single in-memory `GMD` buffer.
pub fn roundtrip_gmd_bytes(label: &str, original: &[u8]) -> Result<Option<Mismatch>> {
    let mut stream = Stream::from_bytes(label, original.to_vec());
    let registry = gmd::load(&mut stream)?;

    let mut out = Stream::new_buffer(format!("{label} (re-saved)"));
    gmd::save(&registry, &mut out)?;
    let resaved = out.into_vec();

    Ok(compare_bytes(label, original, &resaved))
}

/// Walks `root` for `.arc` files and round-trips each one, returning every
/// mismatch found (an empty vector means every file round-tripped cleanly).
pub fn roundtrip_directory(root: &Path) -> Result<Vec<Mismatch>> {
    let mut mismatches = Vec::new();
    for path in find_arc_files(root).map_err(Error::Io)? {
        let bytes = fs::read(&path).map_err(Error::Io)?;
        let label = path.display().to_string();
        match roundtrip_arc_bytes(&label, &bytes) {
            Ok(Some(mismatch)) => mismatches.push(mismatch),
            Ok(None) => {}
            Err(e) => mismatches.push(Mismatch {
                path: label.clone(),
                offset: 0,
                expected_context: String::new(),
                actual_context: format!("load/save error: {e}"),
            }),
        }
    }
    Ok(mismatches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_buffers_have_no_mismatch() {
        let data = b"same bytes".to_vec();
        assert!(compare_bytes("t", &data, &data).is_none());
    }

    #[test]
    fn differing_buffers_report_first_offset() {
        let a = b"aaaa".to_vec();
        let b = b"aaba".to_vec();
        let mismatch = compare_bytes("t", &a, &b).unwrap();
        assert_eq!(mismatch.offset, 2);
    }

    #[test]
    fn length_mismatch_reported_at_common_len() {
        let a = b"abc".to_vec();
        let b = b"abcd".to_vec();
        let mismatch = compare_bytes("t", &a, &b).unwrap();
        assert_eq!(mismatch.offset, 3);
    }

    #[test]
    fn minimal_arc_roundtrips_cleanly() {
        let mut bytes = vec![0x41, 0x52, 0x43, 0x00, 0x07, 0x00, 0x00, 0x00];
        bytes.extend(std::iter::repeat(0u8).take(0x7FF8));
        let result = roundtrip_arc_bytes("minimal.arc", &bytes).unwrap();
        assert!(result.is_none());
    }
}
