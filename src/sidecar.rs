//! JSON sidecar metadata plus the extract/repack directory-tree glue.
//!
//! `ArcEntryMeta`/`ArchiveMeta`/`GmdMeta` capture exactly the fields an
//! edited tree cannot recover on its own; [`extract_archive`] and
//! [`repack_archive`] are the filesystem-facing inverse pair that turn an
//! `ArcArchive` into such a tree and back.
use crate::deflate;
use crate::error::{Error, Result};
use crate::gmd;
use crate::hash::gmd_hashes;
use crate::ident::to_id;
use crate::stream::Stream;
use crate::types::{ArcArchive, ArcEntry, GmdEntry, GmdRegistry, EXT_GMD};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const META_FILE: &str = "__meta__.json";

/// The non-content `GmdRegistry` fields a plain `key\tvalue` text export
/// cannot recover on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmdMeta {
    pub version: u32,
    pub language: u32,
    pub name: String,
    pub padding: [u8; 8],
}

impl From<&GmdRegistry> for GmdMeta {
    fn from(registry: &GmdRegistry) -> Self {
        GmdMeta {
            version: registry.version,
            language: registry.language,
            name: registry.name.clone(),
            padding: registry.padding,
        }
    }
}

/// The non-content projection of a single [`ArcEntry`], as written to
/// `__meta__.json`. `gmd` is populated only for `GMD`-tagged entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcEntryMeta {
    pub filename: String,
    pub ext: u32,
    pub decomp_size: u32,
    pub unknown_flags: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gmd: Option<GmdMeta>,
}

impl ArcEntryMeta {
    pub fn new(entry: &ArcEntry, gmd: Option<&GmdRegistry>) -> Self {
        ArcEntryMeta {
            filename: entry.filename.clone(),
            ext: entry.ext,
            decomp_size: entry.decomp_size,
            unknown_flags: entry.unknown_flags,
            gmd: gmd.map(GmdMeta::from),
        }
    }
}

impl From<&ArcEntry> for ArcEntryMeta {
    fn from(entry: &ArcEntry) -> Self {
        ArcEntryMeta::new(entry, None)
    }
}

/// The full `__meta__.json` document for one extracted archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveMeta {
    pub version: u16,
    pub has_extended_names: bool,
    pub entries: Vec<ArcEntryMeta>,
}

impl From<&ArcArchive> for ArchiveMeta {
    fn from(archive: &ArcArchive) -> Self {
        ArchiveMeta {
            version: archive.version,
            has_extended_names: archive.has_extended_names,
            entries: archive.entries.iter().map(ArcEntryMeta::from).collect(),
        }
    }
}

impl ArchiveMeta {
    /// Serializes as pretty-printed JSON, matching the teacher's sidecar
    /// convention of human-diffable metadata files.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

/// Encodes a `GmdRegistry`'s entries as `key\tvalue` lines, one per entry,
/// escaping embedded tabs/newlines so each entry stays on its own line.
fn encode_gmd_text(registry: &GmdRegistry) -> String {
    let mut out = String::new();
    for entry in &registry.entries {
        out.push_str(&escape_line(&entry.key));
        out.push('\t');
        out.push_str(&escape_line(&entry.value));
        out.push('\n');
    }
    out
}

fn escape_line(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

fn unescape_line(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn parse_gmd_text(text: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once('\t').ok_or_else(|| {
            Error::BadFormat(format!("text entry line missing a tab separator: {line:?}"))
        })?;
        out.push((unescape_line(key), unescape_line(value)));
    }
    Ok(out)
}

/// Extracts `archive` into `dest_dir`: one `.bin`/`.txt` payload file per
/// entry plus a `__meta__.json` describing the fields needed to rebuild it.
/// Mirrors the two-pass name-then-write shape of the original extractor
/// (collect sanitized names, detect collisions, then write).
pub fn extract_archive(archive: &ArcArchive, dest_dir: &Path) -> Result<()> {
    fs::create_dir_all(dest_dir).map_err(Error::Io)?;

    let mut seen = HashSet::new();
    let mut entry_metas = Vec::with_capacity(archive.entries.len());

    for entry in &archive.entries {
        let base = to_id(&entry.filename);
        if !seen.insert(base.clone()) {
            return Err(Error::DuplicateKey(base));
        }

        if entry.ext == EXT_GMD {
            let decompressed = deflate::decompress(&entry.content, entry.decomp_size as usize)?;
            let mut stream = Stream::from_bytes(entry.filename.clone(), decompressed);
            let registry = gmd::load(&mut stream)?;
            let text_path = dest_dir.join(format!("{base}.txt"));
            fs::write(&text_path, encode_gmd_text(&registry)).map_err(Error::Io)?;
            entry_metas.push(ArcEntryMeta::new(entry, Some(&registry)));
        } else {
            let bin_path = dest_dir.join(format!("{base}.bin"));
            fs::write(&bin_path, &entry.content).map_err(Error::Io)?;
            entry_metas.push(ArcEntryMeta::new(entry, None));
        }
    }

    let meta = ArchiveMeta {
        version: archive.version,
        has_extended_names: archive.has_extended_names,
        entries: entry_metas,
    };
    fs::write(dest_dir.join(META_FILE), meta.to_json().map_err(|e| {
        Error::BadFormat(format!("failed to encode {META_FILE}: {e}"))
    })?)
    .map_err(Error::Io)?;
    Ok(())
}

/// Inverse of [`extract_archive`]: rebuilds an `ArcArchive` from a directory
/// previously produced by it. `GmdEntry.hash1`/`hash2` are rederived from
/// each key rather than trusted from any stored value.
pub fn repack_archive(src_dir: &Path) -> Result<ArcArchive> {
    let meta_text = fs::read_to_string(src_dir.join(META_FILE)).map_err(Error::Io)?;
    let meta = ArchiveMeta::from_json(&meta_text)
        .map_err(|e| Error::BadFormat(format!("failed to parse {META_FILE}: {e}")))?;

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(meta.entries.len());

    for entry_meta in &meta.entries {
        let base = to_id(&entry_meta.filename);
        if !seen.insert(base.clone()) {
            return Err(Error::DuplicateKey(base));
        }

        let (content, decomp_size) = if entry_meta.ext == EXT_GMD {
            let gmd_meta = entry_meta.gmd.as_ref().ok_or_else(|| {
                Error::BadFormat(format!(
                    "entry '{}' is tagged GMD but has no gmd metadata",
                    entry_meta.filename
                ))
            })?;
            let text_path = src_dir.join(format!("{base}.txt"));
            let text = fs::read_to_string(&text_path).map_err(Error::Io)?;
            let pairs = parse_gmd_text(&text)?;

            let mut gmd_entries = Vec::with_capacity(pairs.len());
            let mut keys_seen = HashSet::new();
            for (key, value) in pairs {
                if !keys_seen.insert(key.clone()) {
                    return Err(Error::DuplicateKey(key));
                }
                let (_, hash1, hash2) = gmd_hashes(key.as_bytes());
                gmd_entries.push(GmdEntry {
                    key,
                    value,
                    hash1,
                    hash2,
                });
            }

            let registry = GmdRegistry {
                version: gmd_meta.version,
                language: gmd_meta.language,
                name: gmd_meta.name.clone(),
                entries: gmd_entries,
                padding: gmd_meta.padding,
            };
            let mut out = Stream::new_buffer(format!("{base}.txt"));
            gmd::save(&registry, &mut out)?;
            let plain = out.into_vec();
            let decomp_size = plain.len() as u32;
            (deflate::compress(&plain), decomp_size)
        } else {
            let bin_path = src_dir.join(format!("{base}.bin"));
            let bytes = fs::read(&bin_path).map_err(Error::Io)?;
            (bytes, entry_meta.decomp_size)
        };

        entries.push(ArcEntry {
            filename: entry_meta.filename.clone(),
            ext: entry_meta.ext,
            content,
            decomp_size,
            unknown_flags: entry_meta.unknown_flags,
        });
    }

    Ok(ArcArchive {
        version: meta.version,
        has_extended_names: meta.has_extended_names,
        entries,
    })
}
