use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::error::{PfsError, Result};

pub const MAGIC: &[u8; 4] = b"PFS ";
/// Value every known writer stores in the reserved header word.
pub const RESERVED: u32 = 0x0002_0000;
pub const HEADER_SIZE: usize = 12;

/// Fixed container header.  On disk the directory offset comes first,
/// followed by the magic and the reserved word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub directory_offset: u32,
    pub magic: [u8; 4],
    pub reserved: u32,
}

impl Header {
    pub fn new(directory_offset: u32) -> Self {
        Self {
            directory_offset,
            magic: *MAGIC,
            reserved: RESERVED,
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.directory_offset)?;
        writer.write_all(&self.magic)?;
        writer.write_u32::<LittleEndian>(self.reserved)?;
        Ok(())
    }

    /// Parse the header from the front of `data`.  The reserved word is
    /// carried through but not validated.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(PfsError::corrupted(format!(
                "{} bytes is too short for the {HEADER_SIZE}-byte header",
                data.len()
            )));
        }
        let mut reader = &data[..HEADER_SIZE];
        let directory_offset = reader.read_u32::<LittleEndian>()?;
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(PfsError::corrupted(format!("invalid magic {magic:02x?}")));
        }
        let reserved = reader.read_u32::<LittleEndian>()?;
        Ok(Self {
            directory_offset,
            magic,
            reserved,
        })
    }
}
