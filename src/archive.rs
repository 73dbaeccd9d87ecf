//! High-level [`Archive`] API, the main embedding surface.
//!
//! ```no_run
//! use pfs::Archive;
//!
//! // Build
//! let mut ar = Archive::new();
//! ar.insert("readme.txt", b"Hello, world!")?;
//! ar.write_to_path("out.pfs")?;
//!
//! // Read
//! let ar = Archive::open("out.pfs")?;
//! let data = ar.read_file("readme.txt")?;
//! assert_eq!(data, b"Hello, world!");
//! # Ok::<(), pfs::PfsError>(())
//! ```
//!
//! # Ownership
//! An `Archive<'a>` reads from three kinds of storage: the backing buffer it
//! was opened from, its own decompressed name table, and payloads attached
//! by [`insert`](Archive::insert) or the duplicate operations.  The backing
//! buffer and attached payloads are either owned or borrowed for `'a`.
//! Archives opened with [`from_slice`](Archive::from_slice) borrow the
//! caller's bytes; [`duplicate_borrowed`](Archive::duplicate_borrowed)
//! borrows the source archive.  In both cases the borrow checker keeps the
//! source alive for as long as the archive is used.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::block::{self, encode_payload, ChunkHeader, DEFAULT_CHUNK_SIZE};
use crate::buffer::Bytes;
use crate::codec::BEST_LEVEL;
use crate::error::{PfsError, Result};
use crate::index::{Entry, EntryTable};
use crate::reader::parse_index;
use crate::writer::serialize;

// ── PackOptions ───────────────────────────────────────────────────────────────

/// Compression settings used when inserting files and writing the name table.
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Raw bytes per chunk.  Readers accept any chunk size.
    pub chunk_size: usize,
    /// zlib level, 0 (store) to 9 (best).
    pub level:      u32,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            level:      BEST_LEVEL,
        }
    }
}

impl PackOptions {
    fn normalized(self) -> Self {
        Self {
            chunk_size: self.chunk_size.max(1),
            level:      self.level.min(BEST_LEVEL),
        }
    }
}

// ── FileInfo ──────────────────────────────────────────────────────────────────

/// Lightweight descriptor returned by [`Archive::iter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo<'s> {
    pub name:            &'s str,
    pub crc:             u32,
    pub size:            u32,
    pub compressed_size: u32,
}

// ── Archive ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Archive<'a> {
    index:   EntryTable<'a>,
    backing: Option<Bytes<'a>>,
    options: PackOptions,
}

impl Default for Archive<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Archive<'a> {
    // ── Constructors ─────────────────────────────────────────────────────────

    /// An empty archive with no backing buffer.
    pub fn new() -> Self {
        Self::with_options(PackOptions::default())
    }

    pub fn with_options(options: PackOptions) -> Self {
        Self {
            index:   EntryTable::default(),
            backing: None,
            options: options.normalized(),
        }
    }

    /// Read a whole archive file into memory and parse it.
    ///
    /// # Errors
    /// A missing or zero-length file is [`PfsError::NotFound`].  File names
    /// must be UTF-8: an archive whose name table holds any other encoding
    /// (legacy Latin-1 packs, for instance) is refused as
    /// [`PfsError::Corrupted`] rather than opened with mangled names.  The
    /// same holds for the in-memory constructors.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(PfsError::Misuse("empty path"));
        }
        let data = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PfsError::NotFound(path.display().to_string()),
            _ => PfsError::File(e),
        })?;
        if data.is_empty() {
            return Err(PfsError::NotFound(path.display().to_string()));
        }
        debug!("opened {} ({} bytes)", path.display(), data.len());
        Self::from_vec(data)
    }

    /// Parse a copy of `data`; the archive owns the copy.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(PfsError::Misuse("empty archive buffer"));
        }
        let mut copy = Vec::new();
        copy.try_reserve_exact(data.len())?;
        copy.extend_from_slice(data);
        Self::from_backing(Bytes::Owned(copy))
    }

    /// Parse `data`, taking ownership without copying.
    pub fn from_vec(data: Vec<u8>) -> Result<Self> {
        Self::from_backing(Bytes::Owned(data))
    }

    /// Parse `data` in place.  The archive borrows it for `'a`.
    pub fn from_slice(data: &'a [u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(PfsError::Misuse("empty archive buffer"));
        }
        Self::from_backing(Bytes::Borrowed(data))
    }

    fn from_backing(backing: Bytes<'a>) -> Result<Self> {
        let index = parse_index(&backing)?;
        Ok(Self {
            index,
            backing: Some(backing),
            options: PackOptions::default(),
        })
    }

    // ── Configuration ────────────────────────────────────────────────────────

    pub fn options(&self) -> &PackOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: PackOptions) {
        self.options = options.normalized();
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn entry(&self, index: usize) -> Result<&Entry<'a>> {
        self.index.get(index).ok_or(PfsError::OutOfBounds {
            index,
            count: self.index.len(),
        })
    }

    /// Name of the file at `index`.  Indices shift after a removal.
    pub fn name(&self, index: usize) -> Result<&str> {
        let entry = self.entry(index)?;
        Ok(self.index.name_of(entry))
    }

    /// Inflated size of the file at `index`.
    pub fn size(&self, index: usize) -> Result<u32> {
        Ok(self.entry(index)?.inflated_len)
    }

    /// Deflated size of the file at `index`, chunk headers included.
    pub fn compressed_size(&self, index: usize) -> Result<u32> {
        Ok(self.entry(index)?.deflated_len)
    }

    /// Directory CRC of the file at `index`.
    pub fn crc(&self, index: usize) -> Result<u32> {
        Ok(self.entry(index)?.crc)
    }

    pub fn iter(&self) -> impl Iterator<Item = FileInfo<'_>> + '_ {
        self.index.iter().map(|e| FileInfo {
            name:            self.index.name_of(e),
            crc:             e.crc,
            size:            e.inflated_len,
            compressed_size: e.deflated_len,
        })
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        if name.is_empty() {
            return Err(PfsError::Misuse("empty file name"));
        }
        self.index
            .position(name)
            .ok_or_else(|| PfsError::NotFound(name.to_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        !name.is_empty() && self.index.position(name).is_some()
    }

    /// True if any bytes this archive reads from are borrowed.
    pub fn is_borrowed(&self) -> bool {
        self.backing.as_ref().is_some_and(|b| !b.is_owned())
            || self
                .index
                .iter()
                .any(|e| e.attached().is_some_and(|p| !p.is_owned()))
    }

    // ── Read ─────────────────────────────────────────────────────────────────

    /// Decompress a file by name.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self.entry(self.index_of(name)?)?;
        let payload = self.payload_of(entry)?;
        trace!("reading {name}: {} -> {} bytes", entry.deflated_len, entry.inflated_len);
        block::decode_payload(payload, entry.inflated_len)
    }

    /// Chunk headers of a file's compressed payload.
    pub fn chunks(&self, name: &str) -> Result<Vec<ChunkHeader>> {
        let entry = self.entry(self.index_of(name)?)?;
        block::chunk_headers(self.payload_of(entry)?, entry.inflated_len)
    }

    // ── Edit ─────────────────────────────────────────────────────────────────

    /// Compress `data` and store it under `name`, replacing any previous
    /// contents of that name.
    pub fn insert(&mut self, name: &str, data: &[u8]) -> Result<()> {
        check_name(name)?;
        if data.is_empty() {
            return Err(PfsError::Misuse("empty file data"));
        }
        let inflated_len =
            u32::try_from(data.len()).map_err(|_| PfsError::Misuse("file exceeds 4 GiB"))?;

        let payload = encode_payload(data, self.options.chunk_size, self.options.level)?;
        trace!("insert {name}: {} -> {} bytes", data.len(), payload.len());
        self.attach(name, Bytes::Owned(payload), inflated_len)
    }

    /// Copy the compressed bytes of `name` from `src` into this archive.
    pub fn duplicate(&mut self, src: &Archive<'_>, name: &str) -> Result<()> {
        check_name(name)?;
        let entry = src.entry(src.index_of(name)?)?;
        let payload = src.payload_of(entry)?;

        let mut copy = Vec::new();
        copy.try_reserve_exact(payload.len())?;
        copy.extend_from_slice(payload);
        trace!("duplicate {name}: copied {} bytes", copy.len());
        self.attach(name, Bytes::Owned(copy), entry.inflated_len)
    }

    /// Reference the compressed bytes of `name` in `src` without copying.
    ///
    /// `src` stays borrowed for as long as this archive lives, so it can
    /// neither be dropped nor modified in the meantime:
    ///
    /// ```compile_fail
    /// use pfs::Archive;
    ///
    /// let mut dst = Archive::new();
    /// {
    ///     let mut src = Archive::new();
    ///     src.insert("a.txt", b"hello").unwrap();
    ///     dst.duplicate_borrowed(&src, "a.txt").unwrap();
    /// } // `src` dropped here while `dst` still borrows it
    /// dst.read_file("a.txt").unwrap();
    /// ```
    ///
    /// ```
    /// use pfs::Archive;
    ///
    /// let mut src = Archive::new();
    /// src.insert("a.txt", b"hello")?;
    /// let mut dst = Archive::new();
    /// dst.duplicate_borrowed(&src, "a.txt")?;
    /// assert!(dst.is_borrowed());
    /// assert_eq!(dst.read_file("a.txt")?, b"hello");
    /// # Ok::<(), pfs::PfsError>(())
    /// ```
    pub fn duplicate_borrowed(&mut self, src: &'a Archive<'_>, name: &str) -> Result<()> {
        check_name(name)?;
        let entry = src.entry(src.index_of(name)?)?;
        let payload = src.payload_of(entry)?;
        trace!("duplicate {name}: borrowed {} bytes", payload.len());
        self.attach(name, Bytes::Borrowed(payload), entry.inflated_len)
    }

    fn attach(&mut self, name: &str, payload: Bytes<'a>, inflated_len: u32) -> Result<()> {
        // Checked before a slot is taken so a failure leaves the index as it was.
        let deflated_len = deflated_len(payload.len())?;
        let index = self.index.get_or_append(name)?;
        if let Some(entry) = self.index.get_mut(index) {
            entry.attach(payload, deflated_len, inflated_len);
        }
        Ok(())
    }

    /// Remove `name`.  The last file moves into its index.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let index = self.index_of(name)?;
        // Owned name and payload buffers drop with the returned entry.
        self.index.swap_remove(index);
        trace!("removed {name} from index {index}");
        Ok(())
    }

    // ── Write ─────────────────────────────────────────────────────────────────

    /// Serialize the current state into a complete archive image.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let bytes = self.to_bytes()?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(PfsError::Misuse("empty path"));
        }
        let bytes = self.to_bytes()?;
        fs::write(path, &bytes)?;
        debug!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    // ── Internals shared with the writer ─────────────────────────────────────

    pub(crate) fn index(&self) -> &EntryTable<'a> {
        &self.index
    }

    /// Compressed bytes of `entry`: its attached payload if any, otherwise
    /// its span of the backing buffer.
    pub(crate) fn payload_of<'s>(&'s self, entry: &'s Entry<'_>) -> Result<&'s [u8]> {
        if let Some(payload) = entry.attached() {
            return Ok(payload.as_slice());
        }
        let backing = self.backing.as_deref().unwrap_or_default();
        let start = entry.offset as usize;
        start
            .checked_add(entry.deflated_len as usize)
            .and_then(|end| backing.get(start..end))
            .ok_or_else(|| {
                PfsError::corrupted(format!(
                    "payload {start}+{} outside backing buffer of {} bytes",
                    entry.deflated_len,
                    backing.len()
                ))
            })
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PfsError::Misuse("empty file name"));
    }
    if name.contains('\0') {
        return Err(PfsError::Misuse("file name contains NUL"));
    }
    Ok(())
}

fn deflated_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| PfsError::Misuse("compressed file exceeds 4 GiB"))
}
