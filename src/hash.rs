//! CRC-32 hashing used to index `GMD` labels.
//!
//! The game stores three chained, bitwise-inverted CRC-32 values per key so
//! that a 256-slot bucket table can be rebuilt deterministically. The
//! low-level table and update routine below mirror the reverse-engineered
//! "raw register" CRC-32 (no implicit pre/post inversion); callers apply the
//! inversions explicitly, matching the chain in [`gmd_hashes`].
use std::sync::OnceLock;

const POLY: u32 = 0xEDB8_8320;

fn table() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            let mut c = i as u32;
            for _ in 0..8 {
                c = if c & 1 != 0 { (c >> 1) ^ POLY } else { c >> 1 };
            }
            *slot = c;
        }
        table
    })
}

/// Updates a raw CRC-32 register with `data`, starting from `seed`.
///
/// Unlike the usual public CRC-32 function, this performs no pre- or
/// post-inversion of the register: `crc32_raw(0, b"")` is `0`, not
/// `0xFFFFFFFF`. The `GMD` hash chain composes this with explicit bitwise
/// NOT at each step (see [`gmd_hashes`]).
pub fn crc32_raw(seed: u32, data: &[u8]) -> u32 {
    let table = table();
    let mut crc = seed;
    for &byte in data {
        let index = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = table[index] ^ (crc >> 8);
    }
    crc
}

/// Computes the three chained hashes the `GMD` format stores per key:
/// `h0 = !crc32_raw(0, key)`, `h1 = !crc32_raw(!h0, key)`,
/// `h2 = !crc32_raw(!h1, key)`. `h0`'s low byte is the bucket index;
/// `h1`/`h2` are the values persisted in each label entry.
pub fn gmd_hashes(key: &[u8]) -> (u32, u32, u32) {
    let h0 = !crc32_raw(0, key);
    let h1 = !crc32_raw(!h0, key);
    let h2 = !crc32_raw(!h1, key);
    (h0, h1, h2)
}

/// Bucket index (0-255) a key hashes to, derived from `h0`.
pub fn bucket_of(h0: u32) -> u8 {
    (h0 & 0xFF) as u8
}
