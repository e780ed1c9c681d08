use std::fs;
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

use crate::codec;
use crate::segment::SegmentReader;

/// Initialize tracing subscriber controlled by `RUST_LOG` env var.
/// Safe to call multiple times — only the first call takes effect.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Write a segment (data file + offset index) from already-sorted entries,
/// in the paired-writer wire format.  `None` values become tombstones.
///
/// Returns `(data_path, offsets_path)`.
pub fn write_segment(
    dir: &Path,
    name: &str,
    entries: &[(&str, Option<&str>)],
) -> (PathBuf, PathBuf) {
    let data_path = dir.join(format!("{name}.data"));
    let offsets_path = dir.join(format!("{name}.index"));

    let mut data = Vec::new();
    let mut offsets = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        offsets.push(data.len() as u64);
        codec::write_string(&mut data, Some(key)).unwrap();
        codec::write_string(&mut data, *value).unwrap();
    }
    fs::write(&data_path, &data).unwrap();

    let mut index = Vec::new();
    codec::write_offsets(&mut index, &offsets).unwrap();
    fs::write(&offsets_path, &index).unwrap();

    (data_path, offsets_path)
}

/// Write a segment and open a reader over it.
pub fn open_segment(dir: &Path, name: &str, entries: &[(&str, Option<&str>)]) -> SegmentReader {
    let (data_path, offsets_path) = write_segment(dir, name, entries);
    SegmentReader::open(data_path, offsets_path).unwrap()
}
