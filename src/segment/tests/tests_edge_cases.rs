//! Edge cases: empty segments, missing or malformed index files, removal
//! flag monotonicity, unusual keys.
//!
//! ## See also
//! - [`tests_corruption`] — malformed data-file regions (fail-soft paths)

use std::fs;

use tempfile::TempDir;

use super::helpers::{init_tracing, open_segment, write_segment};
use crate::segment::{SegmentError, SegmentReader};

/// # Scenario
/// A segment with zero keys: empty data file, zero-count offset index.
///
/// # Expected behavior
/// Opens fine; lookups return nothing, scans are exhausted immediately.
#[test]
fn empty_segment() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let segment = open_segment(tmp.path(), "seg_1", &[]);

    assert_eq!(segment.key_count(), 0);
    assert!(segment.is_empty());
    assert_eq!(segment.get("anything").unwrap(), None);

    let mut scan = segment.scan(None, None).unwrap();
    assert_eq!(scan.next_entry().unwrap(), None);

    let mut scan = segment.scan(Some("a"), Some("z")).unwrap();
    assert_eq!(scan.next_entry().unwrap(), None);
}

/// # Scenario
/// Open with a data-file path that does not exist.
///
/// # Expected behavior
/// Construction fails immediately with an I/O error.
#[test]
fn missing_data_file_fails_open() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let (_, offsets_path) = write_segment(tmp.path(), "seg_1", &[("a", Some("1"))]);

    let err = SegmentReader::open(tmp.path().join("nope.data"), offsets_path).unwrap_err();
    assert!(matches!(err, SegmentError::Io(_)));
}

/// # Scenario
/// Open with an offset-index path that does not exist.
///
/// # Expected behavior
/// Construction fails immediately with an I/O error.
#[test]
fn missing_offsets_file_fails_open() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let (data_path, _) = write_segment(tmp.path(), "seg_1", &[("a", Some("1"))]);

    let err = SegmentReader::open(data_path, tmp.path().join("nope.index")).unwrap_err();
    assert!(matches!(err, SegmentError::Io(_)));
}

/// # Scenario
/// The offset index promises more offsets than its body holds.
///
/// # Expected behavior
/// Construction is fatal — the count must agree with the offsets present.
#[test]
fn truncated_offset_index_fails_open() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let (data_path, offsets_path) =
        write_segment(tmp.path(), "seg_1", &[("a", Some("1")), ("b", Some("2"))]);

    let mut bytes = fs::read(&offsets_path).unwrap();
    bytes.truncate(bytes.len() - 4);
    fs::write(&offsets_path, &bytes).unwrap();

    let err = SegmentReader::open(data_path, offsets_path).unwrap_err();
    assert!(matches!(err, SegmentError::Index(_)));
}

/// # Scenario
/// The offset index carries bytes past its last promised offset.
///
/// # Expected behavior
/// Construction is fatal — trailing bytes mean the index and data file
/// disagree about the key count.
#[test]
fn trailing_index_bytes_fail_open() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let (data_path, offsets_path) = write_segment(tmp.path(), "seg_1", &[("a", Some("1"))]);

    let mut bytes = fs::read(&offsets_path).unwrap();
    bytes.extend_from_slice(&[0u8; 3]);
    fs::write(&offsets_path, &bytes).unwrap();

    let err = SegmentReader::open(data_path, offsets_path).unwrap_err();
    assert!(matches!(err, SegmentError::Index(_)));
}

/// # Scenario
/// Flip the removal flag twice.
///
/// # Expected behavior
/// False after construction; true after the first `set_removed`; still true
/// after the second — the flag is one-way and idempotent.
#[test]
fn removal_flag_is_monotonic() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let segment = open_segment(tmp.path(), "seg_1", &[("a", Some("1"))]);

    assert!(!segment.is_removed());
    segment.set_removed();
    assert!(segment.is_removed());
    segment.set_removed();
    assert!(segment.is_removed());
}

/// # Scenario
/// The empty string used as a key.
///
/// # Expected behavior
/// A zero-length key is a legal record; it can be found and scanned like
/// any other.
#[test]
fn empty_string_key() {
    init_tracing();

    let tmp = TempDir::new().unwrap();
    let segment = open_segment(tmp.path(), "seg_1", &[("", Some("root")), ("a", Some("1"))]);

    let entry = segment.get("").unwrap().unwrap();
    assert_eq!(entry.key, "");
    assert_eq!(entry.value.as_deref(), Some("root"));
}
