//! Data model for the `ARC` archive and `GMD` string dictionary.

/// The extension-hash discriminator carried by every `ArcEntry`.
///
/// Only `Gmd` is decoded further by this crate; any other value passes
/// through opaquely.
pub const EXT_GMD: u32 = 0x242B_B29A;

/// A single file stored inside an `ARC` archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcEntry {
    /// Entry name, without path separators. Must fit (including the
    /// trailing NUL) in the archive's selected name-field width.
    pub filename: String,
    /// 32-bit extension-hash discriminator (see [`EXT_GMD`]).
    pub ext: u32,
    /// Payload bytes exactly as stored on disk; may be deflate-compressed.
    pub content: Vec<u8>,
    /// Declared uncompressed size (low 24 bits of the on-disk field).
    pub decomp_size: u32,
    /// Opaque high 8 bits of the on-disk `decompSize` field, preserved
    /// verbatim for round-trip. Meaning unresolved.
    pub unknown_flags: u8,
}

impl ArcEntry {
    /// Whether this entry's payload is deflate-compressed, per the loader's
    /// derivation rule `content.len() != decomp_size`.
    pub fn is_compressed(&self) -> bool {
        self.content.len() as u64 != self.decomp_size as u64
    }
}

/// The outer `ARC` archive: a header plus an ordered sequence of entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcArchive {
    /// On-disk format version; exactly `7` or `8`.
    pub version: u16,
    /// Whether entries use the 128-byte extended name field instead of the
    /// 64-byte short one.
    pub has_extended_names: bool,
    /// Entries in on-disk order. Order is significant: payloads follow the
    /// entry table contiguously in this same order.
    pub entries: Vec<ArcEntry>,
}

/// A single localized string inside a `GMD` dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmdEntry {
    /// Unique key, stored NUL-terminated in the label pool.
    pub key: String,
    /// Localized text, stored NUL-terminated in the section pool. May
    /// contain in-band markup such as `<PAGE>`, `<E123>`, `\r`, `\n`.
    pub value: String,
    /// First chained CRC-32 of `key`, recomputed (never trusted) on save.
    pub hash1: u32,
    /// Second chained CRC-32 of `key`, recomputed (never trusted) on save.
    pub hash2: u32,
}

/// The inner `GMD` key/value string dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmdRegistry {
    /// On-disk format version; exactly `0x010302`.
    pub version: u32,
    /// Opaque 32-bit language tag.
    pub language: u32,
    /// Short NUL-terminated name embedded just after the header.
    pub name: String,
    /// Entries in on-disk (section) order.
    pub entries: Vec<GmdEntry>,
    /// Opaque 8-byte reserved header region, preserved verbatim for
    /// byte-exact round-trip. Equality to zero is not asserted.
    pub padding: [u8; 8],
}

pub const GMD_VERSION: u32 = 0x0001_0302;
