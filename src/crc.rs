//! Checksums used by the format.
//!
//! [`crc32`] is the on-disk directory checksum: polynomial 0x04C11DB7,
//! MSB-first, zero initial value, no final XOR.  It is *not* the reflected
//! CRC-32 used by zip/zlib, so `crc32fast` cannot stand in for it.
//!
//! [`name_hash`] never leaves the process; it only speeds up name lookup.

const POLY: u32 = 0x04C1_1DB7;

/// 256-entry table for the MSB-first CRC, built at compile time.
pub const CRC_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000_0000 != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

pub fn crc32(data: &[u8]) -> u32 {
    update(0, data)
}

/// Continue a running CRC over `data`.
pub fn update(crc: u32, data: &[u8]) -> u32 {
    data.iter().fold(crc, |crc, &b| {
        let idx = ((crc >> 24) ^ b as u32) & 0xff;
        (crc << 8) ^ CRC_TABLE[idx as usize]
    })
}

/// Directory CRC of a file name.  The stored name's NUL terminator is part
/// of the checksummed bytes.
pub fn name_crc(name: &str) -> u32 {
    update(crc32(name.as_bytes()), &[0])
}

/// Cheap lookup hash seeded with the length, sampling the string backwards
/// with a stride of `len / 32 + 1`.
pub fn name_hash(key: &[u8]) -> u32 {
    let len = key.len() as u32;
    let step = (len >> 5) + 1;
    let mut h = len;
    let mut i = len;
    while i >= step {
        let b = key[(i - 1) as usize] as u32;
        h ^= (h << 5).wrapping_add(h >> 2).wrapping_add(b);
        i -= step;
    }
    h
}
