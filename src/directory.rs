//! Directory of `{crc, offset, inflated_len}` records at the end of the file.
//!
//! Writers sort the records by CRC because external readers binary-search
//! them; this crate never relies on that order when reading.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::error::{PfsError, Result};

pub const RECORD_SIZE: usize = 12;
/// Directory CRC of the name-table record.
pub const NAME_TABLE_CRC: u32 = 0x6158_0AC9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryRecord {
    pub crc: u32,
    pub offset: u32,
    pub inflated_len: u32,
}

impl DirectoryRecord {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.crc)?;
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.inflated_len)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            crc: reader.read_u32::<LittleEndian>()?,
            offset: reader.read_u32::<LittleEndian>()?,
            inflated_len: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Read the record count at `offset`.
pub fn read_count(data: &[u8], offset: usize) -> Result<u32> {
    let field = offset
        .checked_add(4)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            PfsError::corrupted(format!(
                "directory offset {offset} lies outside the {}-byte archive",
                data.len()
            ))
        })?;
    Ok(u32::from_le_bytes([field[0], field[1], field[2], field[3]]))
}

/// Read record `index` of a directory whose records start at `start`.
pub fn read_record(data: &[u8], start: usize, index: usize) -> Result<DirectoryRecord> {
    let at = index
        .checked_mul(RECORD_SIZE)
        .and_then(|rel| start.checked_add(rel))
        .ok_or_else(|| PfsError::corrupted("directory record position overflows"))?;
    let bytes = at
        .checked_add(RECORD_SIZE)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| {
            PfsError::corrupted(format!("directory record {index} at {at} is truncated"))
        })?;
    Ok(DirectoryRecord::read(bytes)?)
}

/// Write `count` followed by the records in ascending CRC order.
pub fn write_sorted<W: Write>(records: &mut [DirectoryRecord], mut writer: W) -> Result<()> {
    records.sort_by_key(|r| r.crc);
    let count = u32::try_from(records.len())
        .map_err(|_| PfsError::Misuse("too many files for one archive"))?;
    writer.write_u32::<LittleEndian>(count)?;
    for record in records.iter() {
        record.write(&mut writer)?;
    }
    Ok(())
}
