//! Name table codec.
//!
//! Plaintext layout (compressed with the regular chunk framing on disk):
//!
//! ```text
//! count: u32
//! count x { len: u32, bytes[len] }   // bytes = name + NUL, len includes the NUL
//! ```
//!
//! Names are listed in the same order as the file payloads were packed.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::ops::Range;

use crate::error::{PfsError, Result};

/// Debug artifact some producers pack; the first one found is discarded
/// when a name table is read.
pub const TRACE_FILE: &str = "trace.dbg";

pub fn encode<'n>(names: impl ExactSizeIterator<Item = &'n str>) -> Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();
    out.write_u32::<LittleEndian>(count_u32(names.len())?)?;
    for name in names {
        out.try_reserve(4 + name.len() + 1)?;
        out.write_u32::<LittleEndian>(count_u32(name.len() + 1)?)?;
        out.extend_from_slice(name.as_bytes());
        out.push(0);
    }
    Ok(out)
}

fn count_u32(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| PfsError::Misuse("name table exceeds 4 GiB"))
}

/// Decode up to `max` names.  Each returned range covers the name bytes up
/// to (not including) the first NUL of its record and is valid UTF-8.
pub fn decode(table: &[u8], max: usize) -> Result<Vec<Range<usize>>> {
    let mut reader = table;
    let count = reader
        .read_u32::<LittleEndian>()
        .map_err(|_| PfsError::corrupted("name table shorter than its count field"))?;
    let count = (count as usize).min(max);

    let mut names = Vec::new();
    names.try_reserve_exact(count)?;
    let mut pos = 4usize;
    for i in 0..count {
        let len = reader
            .read_u32::<LittleEndian>()
            .map_err(|_| PfsError::corrupted(format!("name {i}: truncated length field")))?
            as usize;
        pos += 4;
        if len == 0 {
            return Err(PfsError::corrupted(format!("name {i}: zero-length record")));
        }
        let record = reader.get(..len).ok_or_else(|| {
            PfsError::corrupted(format!(
                "name {i}: {len} bytes declared, {} remain",
                reader.len()
            ))
        })?;
        let name_len = record.iter().position(|&b| b == 0).unwrap_or(len);
        std::str::from_utf8(&record[..name_len])
            .map_err(|e| PfsError::corrupted(format!("name {i}: {e}")))?;

        names.push(pos..pos + name_len);
        reader = &reader[len..];
        pos += len;
    }
    Ok(names)
}

/// Position of the first name equal to [`TRACE_FILE`].
pub fn find_trace(table: &[u8], names: &[Range<usize>]) -> Option<usize> {
    names
        .iter()
        .position(|r| &table[r.clone()] == TRACE_FILE.as_bytes())
}
