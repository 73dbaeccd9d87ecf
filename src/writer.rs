//! Serialize an [`Archive`] into the on-disk layout:
//!
//! ```text
//! header | payloads in index order | compressed name table | count | records by CRC
//! ```
//!
//! Payload offsets are reassigned from scratch as the running output size,
//! so entries loaded from one file and entries attached from elsewhere
//! end up in a single consistent address space.

use tracing::debug;

use crate::archive::Archive;
use crate::block::encode_payload;
use crate::directory::{self, DirectoryRecord, NAME_TABLE_CRC};
use crate::error::{PfsError, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::index::names;

pub(crate) fn serialize(archive: &Archive<'_>) -> Result<Vec<u8>> {
    let index = archive.index();
    let options = archive.options();

    let name_table = names::encode(index.iter().map(|e| index.name_of(e)))?;

    let mut records: Vec<DirectoryRecord> = Vec::new();
    records.try_reserve_exact(index.len() + 1)?;

    // Header is patched once the directory offset is known.
    let mut out: Vec<u8> = Vec::new();
    out.try_reserve(HEADER_SIZE)?;
    Header::new(0).write(&mut out)?;

    for entry in index.iter() {
        let payload = archive.payload_of(entry)?;
        records.push(DirectoryRecord {
            crc: entry.crc,
            offset: offset_u32(out.len())?,
            inflated_len: entry.inflated_len,
        });
        out.try_reserve(payload.len())?;
        out.extend_from_slice(payload);
    }

    records.push(DirectoryRecord {
        crc: NAME_TABLE_CRC,
        offset: offset_u32(out.len())?,
        inflated_len: u32::try_from(name_table.len())
            .map_err(|_| PfsError::Misuse("name table exceeds 4 GiB"))?,
    });
    let compressed = encode_payload(&name_table, options.chunk_size, options.level)?;
    out.try_reserve(compressed.len())?;
    out.extend_from_slice(&compressed);

    let directory_offset = offset_u32(out.len())?;
    Header::new(directory_offset).write(&mut out[..HEADER_SIZE])?;
    directory::write_sorted(&mut records, &mut out)?;

    debug!(
        "serialized {} file(s) into {} bytes (directory at {directory_offset})",
        index.len(),
        out.len()
    );
    Ok(out)
}

fn offset_u32(pos: usize) -> Result<u32> {
    u32::try_from(pos).map_err(|_| PfsError::Misuse("archive exceeds 4 GiB"))
}
