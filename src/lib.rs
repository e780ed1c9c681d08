//! # sortseg
//!
//! An immutable, on-disk **sorted string segment reader** — the read side of
//! an LSM-style key-value store.  A segment is one data file of key/value
//! records in strictly ascending key order plus a companion offset index;
//! this crate binary-searches the index for point lookups, resolves range
//! scans with the same search, and reports tombstones explicitly so upper
//! layers can shadow older segments.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sortseg::SegmentReader;
//!
//! let segment = SegmentReader::open("storage/data_1.bin", "storage/offsets_1.bin").unwrap();
//!
//! // Point lookup — tombstones come back as an entry with no value.
//! if let Some(entry) = segment.get("apple").unwrap() {
//!     match entry.value {
//!         Some(value) => println!("apple = {value}"),
//!         None => println!("apple was deleted"),
//!     }
//! }
//!
//! // Range scan over ["b", "f") — each cursor owns its own position.
//! let mut scan = segment.scan(Some("b"), Some("f")).unwrap();
//! while let Some(entry) = scan.next_entry().unwrap() {
//!     println!("{} -> {:?}", entry.key, entry.value);
//! }
//!
//! // Lifecycle bookkeeping for external compaction management.
//! segment.set_removed();
//! assert!(segment.is_removed());
//! segment.close();
//! ```
//!
//! ## Features
//!
//! - **Sparse-index binary search** — point lookups probe the data file at
//!   midpoints of a fully-loaded offset array; no full-file scans.
//! - **Tombstone awareness** — logically deleted keys stay visible as
//!   entries with an absent value.
//! - **Concurrent readers** — physical file access serializes on one lock at
//!   probe granularity; scans carry independent cursors.
//! - **Fail-soft corruption handling** — a truncated or malformed record
//!   reads as absence of data, never as a segment-wide failure.
//! - **Writer-compatible codec** — the [`codec`] module pins down the exact
//!   big-endian, UTF-16 wire format the external flush path produces.

pub mod codec;
pub(crate) mod segment;

pub use segment::{Entry, SegmentError, SegmentReader, SegmentScan};
