//! Codec for the inner `GMD` key/value string dictionary.
//!
//! On-disk layout (little-endian throughout):
//!
//! ```text
//! header  { magic[4]="GMD\0"; u32 version; u32 language; u8 padding[8];
//!           u32 labelCount; u32 sectionCount; u32 labelSize; u32 sectionSize;
//!           u32 nameSize; }
//! name    : nameSize bytes + one NUL terminator
//! entries : labelCount x LabelEntry { u32 sectionID; u32 hash1; u32 hash2;
//!           u32 zeroPadding=0xCDCDCDCD; u64 labelOffset; u64 listLink; }
//! buckets : present iff labelCount > 0: 256 x u64
//! labels  : labelSize bytes, labelCount NUL-terminated strings
//! sections: sectionSize bytes, sectionCount NUL-terminated strings
//! ```
use crate::error::{Error, Result};
use crate::hash::{bucket_of, gmd_hashes};
use crate::stream::Stream;
use crate::types::{GmdEntry, GmdRegistry, GMD_VERSION};
use std::collections::HashMap;
use std::io::SeekFrom;

const MAGIC: &[u8; 4] = b"GMD\0";
const HEADER_SIZE: u64 = 40;
const LABEL_ENTRY_SIZE: u64 = 32;
const BUCKET_COUNT: usize = 256;
const BUCKET_REGION_SIZE: u64 = BUCKET_COUNT as u64 * 8;
const ZERO_PADDING: u32 = 0xCDCD_CDCD;
const FIRST_ENTRY_SENTINEL: u64 = u64::MAX;

struct RawLabelEntry {
    section_id: u32,
    hash1: u32,
    hash2: u32,
    label_offset: u64,
}

fn read_u32(stream: &mut Stream) -> Result<u32> {
    let mut buf = [0u8; 4];
    stream.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(stream: &mut Stream) -> Result<u64> {
    let mut buf = [0u8; 8];
    stream.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Splits `data` into exactly `count` NUL-terminated strings, returning each
/// string alongside its byte offset from the start of `data`. Fails unless
/// the region yields exactly `count` strings and the last terminator sits
/// precisely at `data.len()`.
fn parse_cstrings(data: &[u8], count: usize) -> Result<Vec<(u64, String)>> {
    let mut out = Vec::with_capacity(count);
    let mut pos = 0usize;
    while pos < data.len() {
        let end = data[pos..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::UnterminatedCString)?;
        let s = String::from_utf8_lossy(&data[pos..pos + end]).into_owned();
        out.push((pos as u64, s));
        pos += end + 1;
    }
    if out.len() != count {
        return Err(Error::BadFormat(format!(
            "expected {count} NUL-terminated strings, found {}",
            out.len()
        )));
    }
    if pos != data.len() {
        return Err(Error::BadFormat(
            "string region did not end exactly at its declared size".into(),
        ));
    }
    Ok(out)
}

/// Parses a `GMD` dictionary from `stream`.
pub fn load(stream: &mut Stream) -> Result<GmdRegistry> {
    stream.seek(SeekFrom::Start(0)).map_err(Error::Io)?;
    let mut magic = [0u8; 4];
    stream.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::BadMagic {
            expected: MAGIC,
            actual: magic.to_vec(),
        });
    }
    let version = read_u32(stream)?;
    if version != GMD_VERSION {
        return Err(Error::BadVersion(version));
    }
    let language = read_u32(stream)?;
    let mut padding = [0u8; 8];
    stream.read_exact(&mut padding)?;
    let label_count = read_u32(stream)? as usize;
    let section_count = read_u32(stream)? as usize;
    if label_count != section_count {
        return Err(Error::BadFormat(format!(
            "labelCount ({label_count}) != sectionCount ({section_count})"
        )));
    }
    let label_size = read_u32(stream)? as u64;
    let section_size = read_u32(stream)? as u64;
    let name_size = read_u32(stream)? as usize;

    let mut name_buf = vec![0u8; name_size];
    stream.read_exact(&mut name_buf)?;
    let mut nul = [0u8; 1];
    stream.read_exact(&mut nul)?;
    if nul[0] != 0 {
        return Err(Error::BadFormat("name field not NUL-terminated".into()));
    }
    let name = String::from_utf8_lossy(&name_buf).into_owned();

    let mut raw_entries = Vec::with_capacity(label_count);
    for _ in 0..label_count {
        let section_id = read_u32(stream)?;
        let hash1 = read_u32(stream)?;
        let hash2 = read_u32(stream)?;
        let _zero_padding = read_u32(stream)?;
        let label_offset = read_u64(stream)?;
        let _list_link = read_u64(stream)?;
        raw_entries.push(RawLabelEntry {
            section_id,
            hash1,
            hash2,
            label_offset,
        });
    }

    let header_end = HEADER_SIZE + name_size as u64 + 1;
    let bucket_region = if label_count > 0 { BUCKET_REGION_SIZE } else { 0 };
    let table_size = LABEL_ENTRY_SIZE * label_count as u64;
    let expected_size = header_end + table_size + bucket_region + label_size + section_size;
    let actual_size = stream.len()?;
    if actual_size != expected_size {
        return Err(Error::BadSize {
            expected: expected_size,
            actual: actual_size,
        });
    }

    if label_count > 0 {
        stream
            .seek(SeekFrom::Current(BUCKET_REGION_SIZE as i64))
            .map_err(Error::Io)?;
    }

    let mut label_bytes = vec![0u8; label_size as usize];
    stream.read_exact(&mut label_bytes)?;
    let labels = parse_cstrings(&label_bytes, label_count)?;
    let label_by_offset: HashMap<u64, &str> =
        labels.iter().map(|(off, s)| (*off, s.as_str())).collect();

    let mut section_bytes = vec![0u8; section_size as usize];
    stream.read_exact(&mut section_bytes)?;
    let sections = parse_cstrings(&section_bytes, section_count)?;

    let mut entries = Vec::with_capacity(section_count);
    for (i, (_, value)) in sections.into_iter().enumerate() {
        let raw = raw_entries
            .iter()
            .find(|e| e.section_id as usize == i)
            .ok_or_else(|| Error::BadFormat(format!("section {i} has no matching label entry")))?;
        let key = *label_by_offset.get(&raw.label_offset).ok_or_else(|| {
            Error::BadFormat(format!(
                "label entry for section {i} points at a non-string offset"
            ))
        })?;
        let key = key.to_string();

        let (h0, expected1, expected2) = gmd_hashes(key.as_bytes());
        let _ = h0;
        if raw.hash1 != expected1 || raw.hash2 != expected2 {
            return Err(Error::HashMismatch {
                index: i,
                expected: (expected1, expected2),
                got: (raw.hash1, raw.hash2),
            });
        }

        entries.push(GmdEntry {
            key,
            value,
            hash1: raw.hash1,
            hash2: raw.hash2,
        });
    }

    Ok(GmdRegistry {
        version,
        language,
        name,
        entries,
        padding,
    })
}

/// Emits `registry` to `stream`, recomputing hashes and the bucket table
/// rather than trusting any stored value.
pub fn save(registry: &GmdRegistry, stream: &mut Stream) -> Result<()> {
    if registry.version != GMD_VERSION {
        return Err(Error::BadVersion(registry.version));
    }
    let count = registry.entries.len();

    let mut label_offsets = Vec::with_capacity(count);
    let mut label_size = 0u64;
    let mut section_size = 0u64;
    let mut h0s = Vec::with_capacity(count);
    let mut recomputed = Vec::with_capacity(count);
    for entry in &registry.entries {
        let (h0, h1, h2) = gmd_hashes(entry.key.as_bytes());
        label_offsets.push(label_size);
        label_size += entry.key.as_bytes().len() as u64 + 1;
        section_size += entry.value.as_bytes().len() as u64 + 1;
        h0s.push(h0);
        recomputed.push((h1, h2));
    }

    let mut buckets = [0u64; BUCKET_COUNT];
    let mut list_links = vec![0u64; count];
    let mut tails: Vec<Option<usize>> = vec![None; BUCKET_COUNT];
    for (i, &h0) in h0s.iter().enumerate() {
        let b = bucket_of(h0) as usize;
        let encoded = if i > 0 { i as u64 } else { FIRST_ENTRY_SENTINEL };
        match tails[b] {
            None => buckets[b] = encoded,
            Some(prev) => list_links[prev] = encoded,
        }
        tails[b] = Some(i);
    }

    stream.write_all(MAGIC)?;
    stream.write_all(&registry.version.to_le_bytes())?;
    stream.write_all(&registry.language.to_le_bytes())?;
    stream.write_all(&registry.padding)?;
    stream.write_all(&(count as u32).to_le_bytes())?;
    stream.write_all(&(count as u32).to_le_bytes())?;
    stream.write_all(&(label_size as u32).to_le_bytes())?;
    stream.write_all(&(section_size as u32).to_le_bytes())?;
    stream.write_all(&(registry.name.as_bytes().len() as u32).to_le_bytes())?;
    stream.write_all(registry.name.as_bytes())?;
    stream.write_all(&[0u8])?;

    for (i, entry) in registry.entries.iter().enumerate() {
        let (hash1, hash2) = recomputed[i];
        stream.write_all(&(i as u32).to_le_bytes())?;
        stream.write_all(&hash1.to_le_bytes())?;
        stream.write_all(&hash2.to_le_bytes())?;
        stream.write_all(&ZERO_PADDING.to_le_bytes())?;
        stream.write_all(&label_offsets[i].to_le_bytes())?;
        stream.write_all(&list_links[i].to_le_bytes())?;
        let _ = entry;
    }

    if count > 0 {
        for slot in &buckets {
            stream.write_all(&slot.to_le_bytes())?;
        }
    }

    for entry in &registry.entries {
        stream.write_all(entry.key.as_bytes())?;
        stream.write_all(&[0u8])?;
    }
    for entry in &registry.entries {
        stream.write_all(entry.value.as_bytes())?;
        stream.write_all(&[0u8])?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_registry() -> GmdRegistry {
        GmdRegistry {
            version: GMD_VERSION,
            language: 0,
            name: String::new(),
            entries: vec![],
            padding: [0u8; 8],
        }
    }

    #[test]
    fn minimal_empty_roundtrip() {
        let registry = empty_registry();
        let mut out = Stream::new_buffer("out.gmd");
        save(&registry, &mut out).unwrap();
        let bytes = out.into_vec();
        assert_eq!(bytes.len() as u64, HEADER_SIZE + 1);

        let mut stream = Stream::from_bytes("test.gmd", bytes.clone());
        let reloaded = load(&mut stream).unwrap();
        assert_eq!(reloaded, registry);

        let mut out2 = Stream::new_buffer("out2.gmd");
        save(&reloaded, &mut out2).unwrap();
        assert_eq!(out2.into_vec(), bytes);
    }

    #[test]
    fn single_entry_bucket_sentinel() {
        let mut registry = empty_registry();
        registry.name = "X".into();
        registry.entries.push(GmdEntry {
            key: "A".into(),
            value: "hello".into(),
            hash1: 0,
            hash2: 0,
        });

        let mut out = Stream::new_buffer("out.gmd");
        save(&registry, &mut out).unwrap();
        let bytes = out.into_vec();

        let (h0, expected1, expected2) = gmd_hashes(b"A");
        let header_end = HEADER_SIZE + registry.name.as_bytes().len() as u64 + 1;
        let bucket_offset =
            (header_end + LABEL_ENTRY_SIZE + bucket_of(h0) as u64 * 8) as usize;
        let stored = u64::from_le_bytes(bytes[bucket_offset..bucket_offset + 8].try_into().unwrap());
        assert_eq!(stored, FIRST_ENTRY_SENTINEL);

        let mut stream = Stream::from_bytes("test.gmd", bytes);
        let reloaded = load(&mut stream).unwrap();
        assert_eq!(reloaded.entries.len(), 1);
        assert_eq!(reloaded.entries[0].key, "A");
        assert_eq!(reloaded.entries[0].value, "hello");
        assert_eq!(reloaded.entries[0].hash1, expected1);
        assert_eq!(reloaded.entries[0].hash2, expected2);
    }

    #[test]
    fn version_reject() {
        let mut registry = empty_registry();
        registry.version = 0x0001_0301;
        let mut out = Stream::new_buffer("out.gmd");
        assert!(matches!(save(&registry, &mut out), Err(Error::BadVersion(_))));
    }

    #[test]
    fn orphan_section_rejected() {
        // Hand-construct a buffer with two entries whose sectionID both
        // point at section 0.
        let mut registry = empty_registry();
        registry.entries.push(GmdEntry {
            key: "A".into(),
            value: "one".into(),
            hash1: 0,
            hash2: 0,
        });
        registry.entries.push(GmdEntry {
            key: "B".into(),
            value: "two".into(),
            hash1: 0,
            hash2: 0,
        });
        let mut out = Stream::new_buffer("out.gmd");
        save(&registry, &mut out).unwrap();
        let mut bytes = out.into_vec();

        // The second label entry's sectionID field is the first u32 of its
        // 32-byte record, located right after the first entry's record.
        let header_end = HEADER_SIZE + registry.name.as_bytes().len() as u64 + 1;
        let second_entry_offset = (header_end + LABEL_ENTRY_SIZE) as usize;
        bytes[second_entry_offset..second_entry_offset + 4].copy_from_slice(&0u32.to_le_bytes());

        let mut stream = Stream::from_bytes("bad.gmd", bytes);
        let err = load(&mut stream).unwrap_err();
        assert!(matches!(err, Error::BadFormat(_)));
    }

    #[test]
    fn many_entries_same_bucket_chain_order() {
        // Force a bucket collision by finding keys that collide, relying on
        // the pigeonhole principle over a generated key sequence.
        let mut registry = empty_registry();
        for i in 0..2000u32 {
            registry.entries.push(GmdEntry {
                key: format!("key-{i}"),
                value: format!("value-{i}"),
                hash1: 0,
                hash2: 0,
            });
        }
        let mut out = Stream::new_buffer("out.gmd");
        save(&registry, &mut out).unwrap();
        let bytes = out.into_vec();
        let mut stream = Stream::from_bytes("test.gmd", bytes);
        let reloaded = load(&mut stream).unwrap();
        assert_eq!(reloaded.entries.len(), registry.entries.len());
        for (original, got) in registry.entries.iter().zip(reloaded.entries.iter()) {
            assert_eq!(original.key, got.key);
            assert_eq!(original.value, got.value);
        }
    }
}
