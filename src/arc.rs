//! Codec for the outer `ARC` archive container.
//!
//! On-disk layout (little-endian throughout):
//!
//! ```text
//! offset 0 : header { magic[4]="ARC\0"; u16 version; u16 entryCount }
//! offset 8 : entryCount records of ShortEntry (80 bytes) or ExtEntry (144 bytes)
//! then     : zero padding to the next multiple of 0x8000
//! then     : payloads in entry order, compSize bytes each, at the declared offset
//! ```
use crate::error::{Error, Result};
use crate::stream::Stream;
use crate::types::{ArcArchive, ArcEntry};
use std::io::SeekFrom;

const MAGIC: &[u8; 4] = b"ARC\0";
const HEADER_SIZE: u64 = 8;
const SHORT_NAME_LEN: usize = 64;
const EXT_NAME_LEN: usize = 128;
const SHORT_RECORD_LEN: u64 = SHORT_NAME_LEN as u64 + 16;
const EXT_RECORD_LEN: u64 = EXT_NAME_LEN as u64 + 16;
const PAYLOAD_ALIGN: u64 = 0x8000;

fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) / align * align
}

fn name_from_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn name_to_field(name: &str, width: usize) -> Result<Vec<u8>> {
    let bytes = name.as_bytes();
    if bytes.len() + 1 > width {
        return Err(Error::NameTooLong(bytes.len() + 1));
    }
    let mut field = vec![0u8; width];
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(field)
}

struct RawEntry {
    name: String,
    ext: u32,
    comp_size: u32,
    decomp_size_raw: u32,
    offset: u32,
}

fn read_entry(stream: &mut Stream, name_len: usize) -> Result<RawEntry> {
    let mut name_buf = vec![0u8; name_len];
    stream.read_exact(&mut name_buf)?;
    let mut rest = [0u8; 16];
    stream.read_exact(&mut rest)?;
    Ok(RawEntry {
        name: name_from_field(&name_buf),
        ext: u32::from_le_bytes(rest[0..4].try_into().unwrap()),
        comp_size: u32::from_le_bytes(rest[4..8].try_into().unwrap()),
        decomp_size_raw: u32::from_le_bytes(rest[8..12].try_into().unwrap()),
        offset: u32::from_le_bytes(rest[12..16].try_into().unwrap()),
    })
}

fn write_entry(stream: &mut Stream, entry: &RawEntry, name_len: usize) -> Result<()> {
    let name_field = name_to_field(&entry.name, name_len)?;
    stream.write_all(&name_field)?;
    stream.write_all(&entry.ext.to_le_bytes())?;
    stream.write_all(&entry.comp_size.to_le_bytes())?;
    stream.write_all(&entry.decomp_size_raw.to_le_bytes())?;
    stream.write_all(&entry.offset.to_le_bytes())?;
    Ok(())
}

/// Parses an `ARC` archive from `stream`.
pub fn load(stream: &mut Stream) -> Result<ArcArchive> {
    stream.seek(SeekFrom::Start(0)).map_err(Error::Io)?;
    let mut magic = [0u8; 4];
    stream.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(Error::BadMagic {
            expected: MAGIC,
            actual: magic.to_vec(),
        });
    }
    let mut header_rest = [0u8; 4];
    stream.read_exact(&mut header_rest)?;
    let version = u16::from_le_bytes(header_rest[0..2].try_into().unwrap());
    let entry_count = u16::from_le_bytes(header_rest[2..4].try_into().unwrap()) as usize;
    if version != 7 && version != 8 {
        return Err(Error::BadVersion(version as u32));
    }

    // Probe the first short-form entry to discriminate name-field width.
    let probe = read_entry(stream, SHORT_NAME_LEN)?;
    let has_extended_names = probe.ext == 0 || probe.decomp_size_raw == 0 || probe.offset == 0;
    stream
        .seek(SeekFrom::Start(HEADER_SIZE))
        .map_err(Error::Io)?;

    let name_len = if has_extended_names {
        EXT_NAME_LEN
    } else {
        SHORT_NAME_LEN
    };
    let mut raw_entries = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        raw_entries.push(read_entry(stream, name_len)?);
    }

    let mut entries = Vec::with_capacity(entry_count);
    for raw in raw_entries {
        stream
            .seek(SeekFrom::Start(raw.offset as u64))
            .map_err(Error::Io)?;
        let mut content = vec![0u8; raw.comp_size as usize];
        stream.read_exact(&mut content)?;
        entries.push(ArcEntry {
            filename: raw.name,
            ext: raw.ext,
            content,
            decomp_size: raw.decomp_size_raw & 0x00FF_FFFF,
            unknown_flags: (raw.decomp_size_raw >> 24) as u8,
        });
    }

    Ok(ArcArchive {
        version,
        has_extended_names,
        entries,
    })
}

/// Emits `archive` to `stream`, producing the exact on-disk layout
/// described in §4.4 of the codec core's specification.
pub fn save(archive: &ArcArchive, stream: &mut Stream) -> Result<()> {
    if archive.version != 7 && archive.version != 8 {
        return Err(Error::BadVersion(archive.version as u32));
    }
    let name_len = if archive.has_extended_names {
        EXT_NAME_LEN
    } else {
        SHORT_NAME_LEN
    };
    let record_len = if archive.has_extended_names {
        EXT_RECORD_LEN
    } else {
        SHORT_RECORD_LEN
    };
    for entry in &archive.entries {
        if entry.decomp_size > 0x00FF_FFFF {
            return Err(Error::BadFormat(format!(
                "decomp_size {} exceeds 24 bits",
                entry.decomp_size
            )));
        }
        if entry.filename.as_bytes().len() + 1 > name_len {
            return Err(Error::NameTooLong(entry.filename.as_bytes().len() + 1));
        }
    }

    let table_size = record_len * archive.entries.len() as u64;
    let content_base = align_up(HEADER_SIZE + table_size, PAYLOAD_ALIGN);

    let mut offsets = Vec::with_capacity(archive.entries.len());
    let mut cursor = content_base;
    for entry in &archive.entries {
        offsets.push(cursor);
        cursor += entry.content.len() as u64;
    }

    stream.write_all(MAGIC)?;
    stream.write_all(&archive.version.to_le_bytes())?;
    stream.write_all(&(archive.entries.len() as u16).to_le_bytes())?;

    for (entry, &offset) in archive.entries.iter().zip(&offsets) {
        let decomp_size_raw = entry.decomp_size | ((entry.unknown_flags as u32) << 24);
        let raw = RawEntry {
            name: entry.filename.clone(),
            ext: entry.ext,
            comp_size: entry.content.len() as u32,
            decomp_size_raw,
            offset: offset as u32,
        };
        write_entry(stream, &raw, name_len)?;
    }

    let table_end = stream.tell()?;
    if table_end < content_base {
        stream.write_all(&vec![0u8; (content_base - table_end) as usize])?;
    }

    for entry in &archive.entries {
        stream.write_all(&entry.content)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_empty_archive_roundtrip() {
        let mut bytes = vec![0x41, 0x52, 0x43, 0x00, 0x07, 0x00, 0x00, 0x00];
        bytes.extend(std::iter::repeat(0u8).take(0x7FF8));
        assert_eq!(bytes.len(), 0x8000);

        let mut stream = Stream::from_bytes("test.arc", bytes.clone());
        let archive = load(&mut stream).unwrap();
        assert_eq!(archive.version, 7);
        assert!(!archive.has_extended_names);
        assert!(archive.entries.is_empty());

        let mut out = Stream::new_buffer("out.arc");
        save(&archive, &mut out).unwrap();
        assert_eq!(out.into_vec(), bytes);
    }

    #[test]
    fn version_reject() {
        let mut bytes = vec![0x41, 0x52, 0x43, 0x00, 0x06, 0x00, 0x00, 0x00];
        bytes.extend(std::iter::repeat(0u8).take(0x7FF8));
        let mut stream = Stream::from_bytes("bad.arc", bytes);
        let err = load(&mut stream).unwrap_err();
        assert!(matches!(err, Error::BadVersion(6)));
    }

    #[test]
    fn single_entry_roundtrip() {
        let archive = ArcArchive {
            version: 8,
            has_extended_names: false,
            entries: vec![ArcEntry {
                filename: "greeting".into(),
                ext: crate::types::EXT_GMD,
                content: b"hello world".to_vec(),
                decomp_size: 11,
                unknown_flags: 0,
            }],
        };
        let mut out = Stream::new_buffer("out.arc");
        save(&archive, &mut out).unwrap();
        let bytes = out.into_vec();

        let mut stream = Stream::from_bytes("test.arc", bytes);
        let reloaded = load(&mut stream).unwrap();
        assert_eq!(reloaded, archive);
        assert!(!reloaded.entries[0].is_compressed());
    }

    #[test]
    fn extended_names_probe() {
        // short-form 80-byte record whose ext field is zero forces the
        // extended (128-byte) name form to be selected.
        let archive = ArcArchive {
            version: 7,
            has_extended_names: true,
            entries: vec![ArcEntry {
                filename: "a".repeat(70),
                ext: 1,
                content: vec![1, 2, 3],
                decomp_size: 3,
                unknown_flags: 0,
            }],
        };
        let mut out = Stream::new_buffer("out.arc");
        save(&archive, &mut out).unwrap();
        let bytes = out.into_vec();
        let mut stream = Stream::from_bytes("test.arc", bytes);
        let reloaded = load(&mut stream).unwrap();
        assert!(reloaded.has_extended_names);
        assert_eq!(reloaded, archive);
    }

    #[test]
    fn name_too_long_fails() {
        let archive = ArcArchive {
            version: 7,
            has_extended_names: false,
            entries: vec![ArcEntry {
                filename: "x".repeat(64),
                ext: 1,
                content: vec![],
                decomp_size: 0,
                unknown_flags: 0,
            }],
        };
        let mut out = Stream::new_buffer("out.arc");
        assert!(matches!(save(&archive, &mut out), Err(Error::NameTooLong(_))));
    }
}
