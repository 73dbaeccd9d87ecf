//! Chunk framing of a single file's payload.
//!
//! A payload is a run of chunks, each an 8-byte header followed by one
//! independently compressed zlib stream:
//!
//! ```text
//! +-------------------+-------------------+------------------------+
//! | deflated_len: u32 | inflated_len: u32 | deflated_len bytes ... |
//! +-------------------+-------------------+------------------------+
//! ```
//!
//! `inflated_len` is the raw size of that chunk alone, not a running total.
//! Every length is checked against the bytes actually available before use.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use std::ops::Range;

use crate::codec::{deflate, inflate_append};
use crate::error::{PfsError, Result};

pub const CHUNK_HEADER_SIZE: usize = 8;
/// Raw bytes per chunk written by every known producer of the format.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub deflated_len: u32,
    pub inflated_len: u32,
}

impl ChunkHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.deflated_len)?;
        writer.write_u32::<LittleEndian>(self.inflated_len)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            deflated_len: reader.read_u32::<LittleEndian>()?,
            inflated_len: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Split `data` into `chunk_size` pieces, compress each and frame them.
pub fn encode_payload(data: &[u8], chunk_size: usize, level: u32) -> Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();
    for chunk in data.chunks(chunk_size.max(1)) {
        let compressed = deflate(chunk, level)?;
        let header = ChunkHeader {
            deflated_len: u32::try_from(compressed.len())
                .map_err(|_| PfsError::Compression("compressed chunk exceeds 4 GiB".into()))?,
            inflated_len: u32::try_from(chunk.len())
                .map_err(|_| PfsError::Misuse("chunk size exceeds 4 GiB"))?,
        };
        out.try_reserve(CHUNK_HEADER_SIZE + compressed.len())?;
        header.write(&mut out)?;
        out.extend_from_slice(&compressed);
    }
    Ok(out)
}

/// Walks chunk headers over a byte region, bounds-checking every step.
struct ChunkWalker<'d> {
    data: &'d [u8],
    pos: usize,
    /// Raw bytes still owed by the payload.
    remaining: u32,
}

impl<'d> ChunkWalker<'d> {
    fn new(data: &'d [u8], start: usize, inflated_len: u32) -> Self {
        Self { data, pos: start, remaining: inflated_len }
    }

    fn next_chunk(&mut self) -> Result<Option<(ChunkHeader, Range<usize>)>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let body_start = self
            .pos
            .checked_add(CHUNK_HEADER_SIZE)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                PfsError::corrupted(format!("chunk header at {} runs past end of data", self.pos))
            })?;
        let header = ChunkHeader::read(&self.data[self.pos..body_start])?;

        let body_end = body_start
            .checked_add(header.deflated_len as usize)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                PfsError::corrupted(format!(
                    "chunk at {} declares {} deflated bytes, only {} remain",
                    self.pos,
                    header.deflated_len,
                    self.data.len() - body_start
                ))
            })?;

        if header.inflated_len == 0 || header.inflated_len > self.remaining {
            return Err(PfsError::corrupted(format!(
                "chunk at {} inflates to {} bytes, payload expects {} more",
                self.pos, header.inflated_len, self.remaining
            )));
        }

        self.remaining -= header.inflated_len;
        self.pos = body_end;
        Ok(Some((header, body_start..body_end)))
    }
}

/// Measure the compressed span of a payload starting at `start` in `data`
/// without decompressing it.  Returns the span length in bytes.
pub fn measure_payload(data: &[u8], start: usize, inflated_len: u32) -> Result<usize> {
    let mut walker = ChunkWalker::new(data, start, inflated_len);
    while walker.next_chunk()?.is_some() {}
    Ok(walker.pos - start)
}

/// Headers of every chunk in a payload, in order.
pub fn chunk_headers(payload: &[u8], inflated_len: u32) -> Result<Vec<ChunkHeader>> {
    let mut walker = ChunkWalker::new(payload, 0, inflated_len);
    let mut headers = Vec::new();
    while let Some((header, _)) = walker.next_chunk()? {
        headers.push(header);
    }
    Ok(headers)
}

/// Decompress a whole payload into a buffer of exactly `inflated_len` bytes.
/// Reads never leave `payload`.  The output grows chunk by chunk as each
/// one inflates, so declared sizes are never allocated up front.
pub fn decode_payload(payload: &[u8], inflated_len: u32) -> Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();
    let mut walker = ChunkWalker::new(payload, 0, inflated_len);
    while let Some((header, body)) = walker.next_chunk()? {
        inflate_append(&payload[body], header.inflated_len as usize, &mut out)?;
    }
    debug_assert_eq!(out.len(), inflated_len as usize);
    Ok(out)
}
