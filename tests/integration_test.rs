use std::collections::{BTreeMap, BTreeSet};

use pfs::block::DEFAULT_CHUNK_SIZE;
use pfs::codec::BEST_LEVEL;
use pfs::crc::name_crc;
use pfs::directory::{self, DirectoryRecord, NAME_TABLE_CRC};
use pfs::header::{Header, HEADER_SIZE, RESERVED};
use pfs::index::names::{self, TRACE_FILE};
use pfs::{encode_payload, Archive, ErrorKind};
use proptest::prelude::*;
use tempfile::{NamedTempFile, TempDir};

/// Assemble an archive image by hand so tests can control the name table.
fn build_raw(files: &[(&str, &[u8])], listed_names: &[&str]) -> Vec<u8> {
    let table = names::encode(listed_names.iter().copied()).unwrap();
    build_raw_with_table(files, &table)
}

fn build_raw_with_table(files: &[(&str, &[u8])], table: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    Header::new(0).write(&mut out).unwrap();

    let mut records = Vec::new();
    for (name, data) in files {
        records.push(DirectoryRecord {
            crc:          name_crc(name),
            offset:       out.len() as u32,
            inflated_len: data.len() as u32,
        });
        out.extend(encode_payload(data, DEFAULT_CHUNK_SIZE, BEST_LEVEL).unwrap());
    }

    records.push(DirectoryRecord {
        crc:          NAME_TABLE_CRC,
        offset:       out.len() as u32,
        inflated_len: table.len() as u32,
    });
    out.extend(encode_payload(table, DEFAULT_CHUNK_SIZE, BEST_LEVEL).unwrap());

    let dir = out.len() as u32;
    Header::new(dir).write(&mut out[..HEADER_SIZE]).unwrap();
    directory::write_sorted(&mut records, &mut out).unwrap();
    out
}

fn crc_set(ar: &Archive<'_>) -> BTreeSet<u32> {
    ar.iter().map(|f| f.crc).collect()
}

#[test]
fn test_write_and_reopen_from_disk() {
    let temp_file = NamedTempFile::new().unwrap();
    let large: Vec<u8> = (0..50_000u32).map(|i| (i * 7 % 256) as u8).collect();

    {
        let mut ar = Archive::new();
        ar.insert("alpha.txt", b"Alpha file contents").unwrap();
        ar.insert("beta.bin", &large).unwrap();
        ar.insert("gamma.txt", b"Gamma").unwrap();
        ar.write_to_path(temp_file.path()).unwrap();
    }

    let ar = Archive::open(temp_file.path()).unwrap();
    assert_eq!(ar.len(), 3);
    assert_eq!(ar.read_file("alpha.txt").unwrap(), b"Alpha file contents");
    assert_eq!(ar.read_file("beta.bin").unwrap(), large);
    assert_eq!(ar.read_file("gamma.txt").unwrap(), b"Gamma");
    assert_eq!(ar.size(ar.index_of("beta.bin").unwrap()).unwrap(), 50_000);
    assert_eq!(ar.chunks("beta.bin").unwrap().len(), 7);
    assert!(!ar.is_borrowed());
}

#[test]
fn test_reopened_order_follows_packing_order() {
    let mut ar = Archive::new();
    for name in ["z", "m", "a", "q"] {
        ar.insert(name, name.as_bytes()).unwrap();
    }
    let ar = Archive::from_vec(ar.to_bytes().unwrap()).unwrap();
    let names: Vec<&str> = ar.iter().map(|f| f.name).collect();
    assert_eq!(names, ["z", "m", "a", "q"]);
}

#[test]
fn test_header_and_directory_layout() {
    let mut ar = Archive::new();
    ar.insert("a.txt", &[b'A'; 20000]).unwrap();
    ar.insert("b.txt", b"b").unwrap();
    let image = ar.to_bytes().unwrap();

    let header = Header::parse(&image).unwrap();
    assert_eq!(header.reserved, RESERVED);
    let dir = header.directory_offset as usize;
    assert_eq!(directory::read_count(&image, dir).unwrap(), 3);

    let crcs: Vec<u32> = (0..3)
        .map(|i| directory::read_record(&image, dir + 4, i).unwrap().crc)
        .collect();
    let mut sorted = crcs.clone();
    sorted.sort_unstable();
    assert_eq!(crcs, sorted);
    assert!(crcs.contains(&NAME_TABLE_CRC));
    assert!(crcs.contains(&name_crc("a.txt")));
}

#[test]
fn test_trace_file_dropped_on_reopen() {
    let mut ar = Archive::new();
    ar.insert("keep.txt", b"keep").unwrap();
    ar.insert(TRACE_FILE, b"debug noise").unwrap();
    ar.insert("also.txt", b"also").unwrap();
    assert_eq!(ar.len(), 3);

    let ar = Archive::from_vec(ar.to_bytes().unwrap()).unwrap();
    assert_eq!(ar.len(), 2);
    assert!(!ar.contains(TRACE_FILE));
    assert_eq!(ar.read_file("keep.txt").unwrap(), b"keep");
    assert_eq!(ar.read_file("also.txt").unwrap(), b"also");
}

#[test]
fn test_only_first_trace_file_is_dropped() {
    let files: [(&str, &[u8]); 4] =
        [("a", b"aaa"), (TRACE_FILE, b"first"), ("b", b"bbb"), (TRACE_FILE, b"second")];
    let listed: Vec<&str> = files.iter().map(|(n, _)| *n).collect();
    let image = build_raw(&files, &listed);

    let ar = Archive::from_slice(&image).unwrap();
    assert_eq!(ar.len(), 3);
    assert_eq!(ar.read_file("a").unwrap(), b"aaa");
    assert_eq!(ar.read_file("b").unwrap(), b"bbb");
    assert_eq!(ar.read_file(TRACE_FILE).unwrap(), b"second");
}

#[test]
fn test_fewer_names_than_records_truncates() {
    let files: [(&str, &[u8]); 3] = [("a", b"1"), ("b", b"22"), ("c", b"333")];
    let image = build_raw(&files, &["a", "b"]);
    let ar = Archive::from_slice(&image).unwrap();
    assert_eq!(ar.len(), 2);
    assert_eq!(ar.read_file("b").unwrap(), b"22");
    assert_eq!(ar.read_file("c").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_single_record_directory_is_empty_archive() {
    let image = Archive::new().to_bytes().unwrap();
    let ar = Archive::from_slice(&image).unwrap();
    assert!(ar.is_empty());
    assert_eq!(ar.name(0).unwrap_err().kind(), ErrorKind::OutOfBounds);
}

#[test]
fn test_reopen_and_write_back_keeps_crc_set() {
    let mut ar = Archive::new();
    for i in 0..10 {
        ar.insert(&format!("file_{i}.dat"), format!("payload {i}").as_bytes()).unwrap();
    }
    let first = ar.to_bytes().unwrap();

    let reopened = Archive::from_slice(&first).unwrap();
    let second = reopened.to_bytes().unwrap();
    let again = Archive::from_slice(&second).unwrap();

    assert_eq!(crc_set(&reopened), crc_set(&again));
    assert_eq!(crc_set(&ar), crc_set(&again));
    for i in 0..10 {
        let name = format!("file_{i}.dat");
        assert_eq!(again.read_file(&name).unwrap(), format!("payload {i}").as_bytes());
    }
}

#[test]
fn test_loaded_crc_is_trusted_verbatim() {
    let mut image = build_raw(&[("a", b"x"), ("b", b"y")], &["a", "b"]);
    // Overwrite the CRC of whichever record sorts first (not the name table).
    let dir = Header::parse(&image).unwrap().directory_offset as usize;
    let first = directory::read_record(&image, dir + 4, 0).unwrap();
    assert_ne!(first.crc, NAME_TABLE_CRC);
    image[dir + 4..dir + 8].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());

    let ar = Archive::from_slice(&image).unwrap();
    assert!(crc_set(&ar).contains(&0xDEAD_BEEF));
}

#[test]
fn test_borrowed_and_copied_open() {
    let mut ar = Archive::new();
    ar.insert("x", b"xyz").unwrap();
    let image = ar.to_bytes().unwrap();

    {
        let borrowed = Archive::from_slice(&image).unwrap();
        assert!(borrowed.is_borrowed());
        assert_eq!(borrowed.read_file("x").unwrap(), b"xyz");
    }

    let copied = Archive::from_bytes(&image).unwrap();
    drop(image);
    assert!(!copied.is_borrowed());
    assert_eq!(copied.read_file("x").unwrap(), b"xyz");
}

#[test]
fn test_duplicate_between_opened_archives() {
    let mut src = Archive::new();
    src.insert("shared.bin", &[9u8; 9000]).unwrap();
    src.insert("other.bin", b"other").unwrap();
    let src_image = src.to_bytes().unwrap();
    let src = Archive::from_slice(&src_image).unwrap();

    let mut dst = Archive::new();
    dst.insert("own.txt", b"own").unwrap();
    dst.duplicate(&src, "other.bin").unwrap();
    dst.duplicate_borrowed(&src, "shared.bin").unwrap();
    assert_eq!(dst.len(), 3);
    assert_eq!(
        dst.compressed_size(dst.index_of("shared.bin").unwrap()).unwrap(),
        src.compressed_size(src.index_of("shared.bin").unwrap()).unwrap()
    );

    let dst_image = dst.to_bytes().unwrap();
    drop(dst);
    drop(src);

    let reopened = Archive::from_vec(dst_image).unwrap();
    assert_eq!(reopened.read_file("shared.bin").unwrap(), vec![9u8; 9000]);
    assert_eq!(reopened.read_file("other.bin").unwrap(), b"other");
    assert_eq!(reopened.read_file("own.txt").unwrap(), b"own");
}

#[test]
fn test_duplicate_overwrites_existing_entry() {
    let mut src = Archive::new();
    src.insert("f", b"from source").unwrap();
    let mut dst = Archive::new();
    dst.insert("f", b"original").unwrap();
    dst.duplicate(&src, "f").unwrap();
    assert_eq!(dst.len(), 1);
    assert_eq!(dst.read_file("f").unwrap(), b"from source");
}

#[test]
fn test_colliding_names_survive_reopen() {
    let mut ar = Archive::new();
    ar.insert("aks", b"first").unwrap();
    ar.insert("aml", b"second").unwrap();
    let ar = Archive::from_vec(ar.to_bytes().unwrap()).unwrap();
    assert_eq!(ar.read_file("aks").unwrap(), b"first");
    assert_eq!(ar.read_file("aml").unwrap(), b"second");
    assert_eq!(ar.name(ar.index_of("aml").unwrap()).unwrap(), "aml");
}

#[test]
fn test_remove_after_reopen() {
    let mut ar = Archive::new();
    for name in ["one", "two", "three", "four"] {
        ar.insert(name, name.as_bytes()).unwrap();
    }
    let mut ar = Archive::from_vec(ar.to_bytes().unwrap()).unwrap();
    let last = ar.name(3).unwrap().to_owned();
    ar.remove("one").unwrap();
    assert_eq!(ar.len(), 3);
    assert_eq!(ar.name(0).unwrap(), last);

    let ar = Archive::from_vec(ar.to_bytes().unwrap()).unwrap();
    let names: BTreeSet<&str> = ar.iter().map(|f| f.name).collect();
    assert_eq!(names, BTreeSet::from(["two", "three", "four"]));
    assert_eq!(ar.read_file("four").unwrap(), b"four");
}

#[test]
fn test_write_to_writer_matches_to_bytes() {
    let mut ar = Archive::new();
    ar.insert("w", b"written").unwrap();
    let mut buf = Vec::new();
    ar.write_to(&mut buf).unwrap();
    assert_eq!(buf, ar.to_bytes().unwrap());
}

// ── Corruption ──────────────────────────────────────────────────────────────

fn valid_image() -> Vec<u8> {
    let mut ar = Archive::new();
    ar.insert("a.txt", &[b'A'; 20000]).unwrap();
    ar.insert("b.txt", b"bee").unwrap();
    ar.to_bytes().unwrap()
}

#[test]
fn test_wrong_magic_is_corrupted() {
    let mut image = valid_image();
    image[4] = b'Q';
    assert_eq!(Archive::from_slice(&image).unwrap_err().kind(), ErrorKind::Corrupted);
}

#[test]
fn test_truncated_header_is_corrupted() {
    assert_eq!(Archive::from_slice(b"PFS ").unwrap_err().kind(), ErrorKind::Corrupted);
}

#[test]
fn test_directory_offset_past_end_is_corrupted() {
    let mut image = valid_image();
    let len = image.len() as u32;
    image[..4].copy_from_slice(&(len - 2).to_le_bytes());
    assert_eq!(Archive::from_slice(&image).unwrap_err().kind(), ErrorKind::Corrupted);
    image[..4].copy_from_slice(&u32::MAX.to_le_bytes());
    assert_eq!(Archive::from_slice(&image).unwrap_err().kind(), ErrorKind::Corrupted);
}

#[test]
fn test_directory_count_past_end_is_corrupted() {
    let mut image = valid_image();
    let dir = Header::parse(&image).unwrap().directory_offset as usize;
    image[dir..dir + 4].copy_from_slice(&1_000_000u32.to_le_bytes());
    assert_eq!(Archive::from_slice(&image).unwrap_err().kind(), ErrorKind::Corrupted);
}

#[test]
fn test_chunk_longer_than_buffer_is_corrupted() {
    let mut image = valid_image();
    // First payload starts right after the header.
    image[HEADER_SIZE..HEADER_SIZE + 4].copy_from_slice(&0xFFFF_FF00u32.to_le_bytes());
    assert_eq!(Archive::from_slice(&image).unwrap_err().kind(), ErrorKind::Corrupted);
}

#[test]
fn test_record_offset_past_end_is_corrupted() {
    let mut image = valid_image();
    let dir = Header::parse(&image).unwrap().directory_offset as usize;
    let field = dir + 4 + 4;
    let past_end = image.len() as u32 + 100;
    image[field..field + 4].copy_from_slice(&past_end.to_le_bytes());
    assert_eq!(Archive::from_slice(&image).unwrap_err().kind(), ErrorKind::Corrupted);
}

#[test]
fn test_truncated_image_is_corrupted() {
    let image = valid_image();
    let cut = &image[..image.len() - 5];
    assert_eq!(Archive::from_slice(cut).unwrap_err().kind(), ErrorKind::Corrupted);
}

#[test]
fn test_broken_name_table_stream_is_compression_error() {
    let mut image = valid_image();
    let dir = Header::parse(&image).unwrap().directory_offset as usize;
    let table = (0..3)
        .map(|i| directory::read_record(&image, dir + 4, i).unwrap())
        .find(|r| r.crc == NAME_TABLE_CRC)
        .unwrap();
    let body = table.offset as usize + 8;
    for b in &mut image[body..dir] {
        *b = 0xFF;
    }
    assert_eq!(Archive::from_slice(&image).unwrap_err().kind(), ErrorKind::Compression);
}

#[test]
fn test_broken_file_stream_fails_on_read_only() {
    let mut image = valid_image();
    // Damage the zlib body of the first chunk of "a.txt"; framing stays intact.
    let body = HEADER_SIZE + 8;
    image[body] = 0xFF;
    image[body + 1] = 0xFF;
    let ar = Archive::from_slice(&image).unwrap();
    assert_eq!(ar.read_file("a.txt").unwrap_err().kind(), ErrorKind::Compression);
    assert_eq!(ar.read_file("b.txt").unwrap(), b"bee");
}

#[test]
fn test_non_utf8_name_is_corrupted() {
    let mut table = Vec::new();
    table.extend_from_slice(&1u32.to_le_bytes());
    table.extend_from_slice(&5u32.to_le_bytes());
    table.extend_from_slice(b"caf\xe9\0");
    let image = build_raw_with_table(&[("cafe", b"latte")], &table);
    assert_eq!(Archive::from_slice(&image).unwrap_err().kind(), ErrorKind::Corrupted);
}

#[test]
fn test_tiny_image_claiming_huge_sizes_fails_without_allocating() {
    const CLAIMED: u32 = 1 << 30;
    let mut image = Vec::new();
    Header::new(22).write(&mut image).unwrap();
    image.extend_from_slice(&2u32.to_le_bytes());
    image.extend_from_slice(&CLAIMED.to_le_bytes());
    image.extend_from_slice(&[0x78, 0x9c]);
    image.extend_from_slice(&2u32.to_le_bytes());
    for crc in [0x1234_5678, NAME_TABLE_CRC] {
        DirectoryRecord { crc, offset: HEADER_SIZE as u32, inflated_len: CLAIMED }
            .write(&mut image)
            .unwrap();
    }
    assert_eq!(image.len(), 50);

    let err = Archive::from_slice(&image).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compression);
}

// ── Open from path ──────────────────────────────────────────────────────────

#[test]
fn test_open_missing_and_empty_files() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.pfs");
    assert_eq!(Archive::open(&missing).unwrap_err().kind(), ErrorKind::NotFound);

    let empty = NamedTempFile::new().unwrap();
    assert_eq!(Archive::open(empty.path()).unwrap_err().kind(), ErrorKind::NotFound);

    assert_eq!(Archive::open("").unwrap_err().kind(), ErrorKind::Misuse);
    assert_eq!(Archive::from_bytes(&[]).unwrap_err().kind(), ErrorKind::Misuse);
}

#[test]
fn test_write_into_missing_directory_is_file_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no/such/dir/out.pfs");
    let err = Archive::new().write_to_path(path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::File);
}

// ── Properties ──────────────────────────────────────────────────────────────

fn file_set() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(
        "[a-z0-9_]{1,12}(\\.[a-z]{1,3})?".prop_filter("reserved name", |n| n != TRACE_FILE),
        prop::collection::vec(any::<u8>(), 1..20_000),
        0..8,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_write_reopen_roundtrip(files in file_set()) {
        let mut ar = Archive::new();
        for (name, data) in &files {
            ar.insert(name, data).unwrap();
        }
        let reopened = Archive::from_vec(ar.to_bytes().unwrap()).unwrap();

        prop_assert_eq!(reopened.len(), files.len());
        let names: BTreeSet<&str> = reopened.iter().map(|f| f.name).collect();
        let expected: BTreeSet<&str> = files.keys().map(String::as_str).collect();
        prop_assert_eq!(names, expected);
        for (name, data) in &files {
            prop_assert_eq!(&reopened.read_file(name).unwrap(), data);
        }
    }

    #[test]
    fn prop_swap_remove_moves_last(files in file_set(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!files.is_empty());
        let mut ar = Archive::new();
        for (name, data) in &files {
            ar.insert(name, data).unwrap();
        }
        let count = ar.len();
        let i = pick.index(count);
        let victim = ar.name(i).unwrap().to_owned();
        let last = ar.name(count - 1).unwrap().to_owned();

        ar.remove(&victim).unwrap();
        prop_assert_eq!(ar.len(), count - 1);
        prop_assert!(!ar.contains(&victim));
        if i < count - 1 {
            prop_assert_eq!(ar.name(i).unwrap(), last.as_str());
            prop_assert_eq!(&ar.read_file(&last).unwrap(), &files[&last]);
        }
    }
}
