//! Parse a complete archive buffer into an [`EntryTable`].
//!
//! Every offset and length read from the buffer is checked before it is
//! used.  Compressed sizes are never trusted from disk: each directory
//! record's span is re-measured by walking its chunk headers.  The parse
//! either returns a complete index or an error; nothing partial escapes.

use tracing::{debug, trace, warn};

use crate::block::{decode_payload, measure_payload};
use crate::directory::{self, RECORD_SIZE};
use crate::error::{PfsError, Result};
use crate::header::Header;
use crate::index::names;
use crate::index::{Entry, EntryTable};

pub(crate) fn parse_index<'a>(data: &[u8]) -> Result<EntryTable<'a>> {
    let header = Header::parse(data)?;
    let dir = header.directory_offset as usize;
    let count = directory::read_count(data, dir)? as usize;

    // One real file plus the name table is the minimum with any content.
    if count <= 1 {
        debug!("directory lists {count} record(s); archive is empty");
        return Ok(EntryTable::default());
    }

    let start = dir + 4;
    count
        .checked_mul(RECORD_SIZE)
        .and_then(|len| start.checked_add(len))
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            PfsError::corrupted(format!(
                "directory of {count} records at {dir} runs past the {}-byte archive",
                data.len()
            ))
        })?;

    let mut entries: Vec<Entry<'a>> = Vec::new();
    entries.try_reserve_exact(count.next_power_of_two())?;
    for i in 0..count {
        let record = directory::read_record(data, start, i)?;
        let span = measure_payload(data, record.offset as usize, record.inflated_len)?;
        let deflated_len = u32::try_from(span)
            .map_err(|_| PfsError::corrupted(format!("record {i} spans more than 4 GiB")))?;
        trace!(
            "record {i}: crc={:08x} offset={} inflated={} deflated={deflated_len}",
            record.crc, record.offset, record.inflated_len
        );
        entries.push(Entry::loaded(record.crc, record.offset, record.inflated_len, deflated_len));
    }

    // The directory is in CRC order; payloads were packed in entry order,
    // with the name table last.
    entries.sort_by_key(|e| e.offset);
    let table_entry = entries
        .pop()
        .ok_or_else(|| PfsError::corrupted("directory has no name table"))?;

    let start = table_entry.offset as usize;
    let span = &data[start..start + table_entry.deflated_len as usize];
    let name_table = decode_payload(span, table_entry.inflated_len)?;
    let mut ranges = names::decode(&name_table, entries.len())?;

    if let Some(k) = names::find_trace(&name_table, &ranges) {
        debug!("dropping {} at position {k}", names::TRACE_FILE);
        ranges.remove(k);
        entries.remove(k);
    }
    if entries.len() > ranges.len() {
        warn!(
            "name table names {} of {} files; ignoring the rest",
            ranges.len(),
            entries.len()
        );
        entries.truncate(ranges.len());
    }

    debug!(
        "parsed {} file(s), name table {} bytes",
        entries.len(),
        name_table.len()
    );
    EntryTable::from_loaded(entries, ranges, name_table)
}
