//! In-memory file index: entries plus an index-aligned array of name hashes.
//!
//! Lookup is a linear scan over the hashes with an exact string comparison
//! on every hash hit, so colliding names always resolve to the right entry.
//! Storage grows by doubling, and grows exactly when the current count is
//! zero or a power of two, i.e. when the previous allocation is full.
//! Removal swaps the last entry into the removed slot.

pub mod names;

use std::ops::Range;

use crate::buffer::Bytes;
use crate::crc::{name_crc, name_hash};
use crate::error::Result;

/// Where an entry's name lives.
#[derive(Debug, Clone)]
pub(crate) enum EntryName {
    /// Byte range inside the archive's decompressed name table.
    Table(Range<usize>),
    Owned(String),
}

/// One packed file.
#[derive(Debug, Clone)]
pub(crate) struct Entry<'a> {
    pub(crate) name: EntryName,
    /// Directory CRC.  Read verbatim for loaded entries, computed over the
    /// NUL-terminated name for inserted ones.
    pub(crate) crc: u32,
    /// Start of the compressed payload in the backing buffer.  Only
    /// meaningful while `payload` is `None`.
    pub(crate) offset: u32,
    pub(crate) inflated_len: u32,
    pub(crate) deflated_len: u32,
    /// Compressed bytes attached by insertion or duplication.  When set it
    /// is authoritative and `offset` is ignored.
    pub(crate) payload: Option<Bytes<'a>>,
}

impl<'a> Entry<'a> {
    /// An entry read from the directory, before its name is known.
    pub(crate) fn loaded(crc: u32, offset: u32, inflated_len: u32, deflated_len: u32) -> Self {
        Self {
            name: EntryName::Table(0..0),
            crc,
            offset,
            inflated_len,
            deflated_len,
            payload: None,
        }
    }

    fn inserted(name: &str) -> Self {
        Self {
            name: EntryName::Owned(name.to_owned()),
            crc: name_crc(name),
            offset: 0,
            inflated_len: 0,
            deflated_len: 0,
            payload: None,
        }
    }

    /// Replace the attached payload; an owned predecessor is freed here.
    /// `deflated_len` is `payload.len()`, already checked to fit a u32.
    pub(crate) fn attach(&mut self, payload: Bytes<'a>, deflated_len: u32, inflated_len: u32) {
        self.deflated_len = deflated_len;
        self.inflated_len = inflated_len;
        self.payload = Some(payload);
    }

    pub(crate) fn attached(&self) -> Option<&Bytes<'a>> {
        self.payload.as_ref()
    }
}

#[derive(Debug, Default)]
pub(crate) struct EntryTable<'a> {
    entries: Vec<Entry<'a>>,
    hashes: Vec<u32>,
    /// Decompressed name table of an opened archive.  `EntryName::Table`
    /// ranges point into it, so it lives as long as the table does.
    name_table: Vec<u8>,
}

impl<'a> EntryTable<'a> {
    /// Build the index of an opened archive.  `entries[i]` is named by
    /// `names[i]` within `name_table`; both must have the same length.
    pub(crate) fn from_loaded(
        mut entries: Vec<Entry<'a>>,
        names: Vec<Range<usize>>,
        name_table: Vec<u8>,
    ) -> Result<Self> {
        debug_assert_eq!(entries.len(), names.len());
        let mut hashes: Vec<u32> = Vec::new();
        hashes.try_reserve_exact(entries.capacity())?;
        for (entry, range) in entries.iter_mut().zip(names) {
            hashes.push(name_hash(name_bytes(&name_table, &range)));
            entry.name = EntryName::Table(range);
        }
        Ok(Self { entries, hashes, name_table })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slots allocated for entries (and, in lockstep, hashes).
    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Entry<'a>> {
        self.entries.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Entry<'a>> {
        self.entries.get_mut(index)
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, Entry<'a>> {
        self.entries.iter()
    }

    #[cfg(test)]
    fn hash_at(&self, index: usize) -> Option<u32> {
        self.hashes.get(index).copied()
    }

    pub(crate) fn name_of<'s>(&'s self, entry: &'s Entry<'_>) -> &'s str {
        match &entry.name {
            // Validated as UTF-8 when the name table was decoded.
            EntryName::Table(range) => {
                std::str::from_utf8(name_bytes(&self.name_table, range)).unwrap_or_default()
            }
            EntryName::Owned(name) => name,
        }
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        let hash = name_hash(name.as_bytes());
        self.hashes
            .iter()
            .enumerate()
            .filter(|&(_, &h)| h == hash)
            .map(|(i, _)| i)
            .find(|&i| self.name_of(&self.entries[i]) == name)
    }

    /// Index of `name`, appending a fresh entry for it if absent.
    pub(crate) fn get_or_append(&mut self, name: &str) -> Result<usize> {
        if let Some(index) = self.position(name) {
            return Ok(index);
        }
        self.grow_if_full()?;
        self.hashes.push(name_hash(name.as_bytes()));
        self.entries.push(Entry::inserted(name));
        Ok(self.entries.len() - 1)
    }

    /// Double the storage when the count sits on a power of two (or zero),
    /// which is exactly when the previous allocation has been filled.
    fn grow_if_full(&mut self) -> Result<()> {
        let len = self.entries.len();
        if len == 0 || len.is_power_of_two() {
            let cap = if len == 0 { 1 } else { len * 2 };
            self.entries.try_reserve_exact(cap - len)?;
            self.hashes.try_reserve_exact(cap - len)?;
        }
        Ok(())
    }

    /// Remove by swapping the last entry into `index`.  The removed entry
    /// is returned so its owned buffers drop with it.
    pub(crate) fn swap_remove(&mut self, index: usize) -> Entry<'a> {
        self.hashes.swap_remove(index);
        self.entries.swap_remove(index)
    }
}

fn name_bytes<'t>(table: &'t [u8], range: &Range<usize>) -> &'t [u8] {
    table.get(range.clone()).unwrap_or_default()
}
