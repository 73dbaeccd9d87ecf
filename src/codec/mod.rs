//! DEFLATE primitive.
//!
//! Every chunk is a single zlib stream (RFC 1950 header + DEFLATE body +
//! Adler-32), matching what zlib's `compress2`/`uncompress` produce and
//! consume.  The rest of the crate only sees [`deflate`] and
//! [`inflate_append`]; nothing else touches `flate2`.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use tracing::trace;

use crate::error::{PfsError, Result};

/// Highest zlib effort level.
pub const BEST_LEVEL: u32 = 9;

/// Compress one chunk into a standalone zlib stream.
pub fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(BEST_LEVEL)));
    encoder
        .write_all(data)
        .map_err(|e| PfsError::Compression(format!("deflate failed: {e}")))?;
    let out = encoder
        .finish()
        .map_err(|e| PfsError::Compression(format!("deflate failed: {e}")))?;
    trace!("deflate: {} bytes -> {} bytes", data.len(), out.len());
    Ok(out)
}

/// Upper bound on how far a DEFLATE stream can expand its input.
const MAX_RATIO: usize = 1032;

/// Inflate one zlib stream onto the end of `out`.  The stream must decode
/// to exactly `expected` bytes; short or long output is a compression error
/// and leaves `out` as it was.
///
/// `out` grows with the bytes actually produced, so a bogus `expected`
/// never commits more memory than the stream can back.
pub fn inflate_append(src: &[u8], expected: usize, out: &mut Vec<u8>) -> Result<()> {
    let start = out.len();
    out.try_reserve(expected.min(src.len().saturating_mul(MAX_RATIO)))?;

    let mut decoder = ZlibDecoder::new(src).take(expected as u64 + 1);
    if let Err(e) = decoder.read_to_end(out) {
        out.truncate(start);
        return Err(PfsError::Compression(format!("inflate failed: {e}")));
    }

    let produced = out.len() - start;
    if produced != expected {
        out.truncate(start);
        return Err(PfsError::Compression(if produced > expected {
            format!("chunk inflates past its declared {expected} bytes")
        } else {
            format!("chunk inflates to {produced} bytes, header declares {expected}")
        }));
    }
    trace!("inflate: {} bytes -> {expected} bytes", src.len());
    Ok(())
}
