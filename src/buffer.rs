//! Owned-or-borrowed byte storage.
//!
//! Every buffer an [`Archive`](crate::Archive) reads from lives in one of
//! these.  `Borrowed` ties the archive to the lifetime `'a` of whatever it
//! borrows from, so the compiler rejects any archive that would outlive a
//! caller's buffer or a zero-copy duplication source.  Dropping an owned
//! buffer frees it; dropping a borrowed one does nothing.

use std::fmt;
use std::ops::Deref;

#[derive(Clone)]
pub enum Bytes<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
}

impl Bytes<'_> {
    pub fn is_owned(&self) -> bool {
        matches!(self, Bytes::Owned(_))
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            Bytes::Owned(v) => v,
            Bytes::Borrowed(s) => s,
        }
    }
}

impl Deref for Bytes<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for Bytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = if self.is_owned() { "Owned" } else { "Borrowed" };
        write!(f, "{tag}({} bytes)", self.len())
    }
}
