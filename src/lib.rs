pub mod archive;
pub mod block;
pub mod buffer;
pub mod codec;
pub mod crc;
pub mod directory;
pub mod error;
pub mod header;
pub mod index;
mod reader;
mod writer;

pub use archive::{Archive, FileInfo, PackOptions};
pub use block::{ChunkHeader, decode_payload, encode_payload};
pub use buffer::Bytes;
pub use error::{ErrorKind, PfsError, Result};
pub use header::Header;
