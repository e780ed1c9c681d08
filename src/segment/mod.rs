//! Segment Reader Module
//!
//! This module implements an **immutable**, **disk-backed** sorted string
//! segment reader suitable for the read path of LSM-style key-value storage
//! engines.  A segment is one data file of key/value records in strictly
//! ascending key order plus a companion offset index; the reader provides
//! **point lookups**, **range scans**, and **tombstone-aware** results under
//! concurrent access from multiple callers.
//!
//! ## Design Overview
//!
//! The offset index is loaded fully into memory at open time, one 8-byte file
//! position per key.  Lookups binary-search the offset array and probe the
//! data file at each midpoint; scans resolve their starting position with the
//! same search and then walk offsets sequentially.  Values recorded with the
//! absent marker are **tombstones**: the key is reported present with no
//! value, so upper layers can shadow older segments correctly.
//!
//! # On-disk layout
//!
//! ```text
//! data file:    [KEY_LEN_BE][KEY_UTF16][VAL_LEN_BE][VAL_UTF16]   × N records
//! offset index: [COUNT_BE][OFFSET_BE × N]
//! ```
//!
//! - Keys appear in strictly ascending order; `offset[i]` points at the
//!   length prefix of key `i`.
//! - A value length of `-1` encodes an absent value (tombstone); length `0`
//!   is a present empty string.  See [`crate::codec`] for the exact format.
//!
//! # Concurrency model
//!
//! - All physical file access (seek + decode) serializes behind a single
//!   `Mutex<File>` owned by the reader.  The lock is held for exactly one
//!   record's seek+decode unit — one probe during binary search, one record
//!   during a scan step — never across a whole search loop, so concurrent
//!   callers interleave at probe granularity.
//! - The offset array is written once at construction and never mutated, so
//!   reads need no synchronization.
//! - The removal flag is an `AtomicBool`, flipped one way (false → true) and
//!   readable concurrently.
//! - Each [`SegmentScan`] carries its own cursor, so any number of scans may
//!   run concurrently over one reader.
//!
//! # Failure semantics
//!
//! - Construction-time problems (missing file, truncated or oversized offset
//!   index) are fatal and surface immediately.
//! - Mid-read decode failures — truncated records, malformed length prefixes,
//!   invalid UTF-16 — are treated as **absence of data**: a lookup returns no
//!   entry, a scan ends.  A short or scribbled region never poisons the whole
//!   segment.
//! - Device-level I/O errors and lock poisoning propagate to the immediate
//!   caller; there is no internal retry.

// ------------------------------------------------------------------------------------------------
// Sub-modules
// ------------------------------------------------------------------------------------------------

pub mod scan;

#[cfg(test)]
mod tests;

pub use scan::SegmentScan;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufReader, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::{self, CodecError};

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by segment reader operations.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Wire-format error while loading the offset index at construction.
    #[error("offset index error: {0}")]
    Index(#[from] CodecError),

    /// Internal invariant violation or poisoned lock.
    #[error("Internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Entry
// ------------------------------------------------------------------------------------------------

/// A single key/value pair materialized from a segment.
///
/// `value == None` is a **tombstone**: the key was logically deleted and the
/// deletion is recorded explicitly so it can shadow older segments.  An empty
/// string value is a present value, distinct from a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The key as stored in the data file.
    pub key: String,

    /// The value, or `None` for a tombstone.
    pub value: Option<String>,
}

impl Entry {
    /// Returns `true` if this entry records a logical deletion.
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

// ------------------------------------------------------------------------------------------------
// Segment Reader
// ------------------------------------------------------------------------------------------------

/// Reader over one immutable sorted string segment.
///
/// See the [module-level documentation](self) for format, concurrency, and
/// failure semantics.
#[derive(Debug)]
pub struct SegmentReader {
    /// Shared random-access handle to the data file.  All seek+decode
    /// sequences hold this lock so the file position can never be corrupted
    /// by an interleaved reader.
    file: Mutex<File>,

    /// Byte offset of each record's key-length prefix, ascending key order.
    /// Loaded once at construction, never mutated.
    offsets: Vec<u64>,

    /// One-way lifecycle flag managed by external code (e.g. compaction
    /// marking this segment for deletion).  The reader itself ignores it.
    removed: AtomicBool,
}

impl SegmentReader {
    /// Opens a segment from its data file and offset index file.
    ///
    /// The data file is opened for random-access reads and the offset index
    /// is loaded fully into memory: a count prefix, then exactly that many
    /// 8-byte offsets.
    ///
    /// # Errors
    ///
    /// - [`SegmentError::Io`] if either file is missing or unreadable.
    /// - [`SegmentError::Index`] if the offset index is truncated, carries
    ///   trailing bytes, or has a malformed count — the count must agree
    ///   with the offsets actually present.
    pub fn open(
        data_path: impl AsRef<Path>,
        offsets_path: impl AsRef<Path>,
    ) -> Result<Self, SegmentError> {
        let file = File::open(&data_path)?;

        let index_file = File::open(&offsets_path)?;
        let mut index_reader = BufReader::new(index_file);
        let offsets = codec::read_offsets(&mut index_reader)?;

        debug!(
            data = %data_path.as_ref().display(),
            keys = offsets.len(),
            "segment opened"
        );

        Ok(Self {
            file: Mutex::new(file),
            offsets,
            removed: AtomicBool::new(false),
        })
    }

    /// Number of keys stored in this segment.
    pub fn key_count(&self) -> usize {
        self.offsets.len()
    }

    /// Returns `true` if the segment holds no keys.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    // --------------------------------------------------------------------------------------------
    // Point lookup
    // --------------------------------------------------------------------------------------------

    /// Looks up a single key by binary search over the offset array.
    ///
    /// Each probe seeks to one record and decodes its key under the file
    /// lock; the lock is released between probes so concurrent callers
    /// interleave at probe granularity.  On an exact match the value is
    /// decoded under the same lock hold and the entry returned immediately —
    /// including tombstones, which come back with `value == None`.
    ///
    /// Returns `Ok(None)` when the key is not present, and also when a probe
    /// lands on a malformed or truncated record (fail-soft: a corrupt region
    /// reads as absence, not as a segment-wide error).
    ///
    /// # Errors
    ///
    /// Device-level I/O failures and lock poisoning are fatal for the call.
    pub fn get(&self, key: &str) -> Result<Option<Entry>, SegmentError> {
        let mut lo = 0usize;
        let mut hi = self.offsets.len();

        while lo < hi {
            let mid = lo + (hi - lo) / 2;

            let mut file = self.lock_file()?;
            file.seek(SeekFrom::Start(self.offsets[mid]))?;

            let Some(probe) = read_key(&mut file)? else {
                return Ok(None);
            };

            match probe.as_str().cmp(key) {
                Ordering::Less => {
                    drop(file);
                    lo = mid + 1;
                }
                Ordering::Greater => {
                    drop(file);
                    hi = mid;
                }
                Ordering::Equal => {
                    // Value decode shares the probe's lock hold: the file
                    // position must not move between key and value.
                    let value = match codec::read_string(&mut *file) {
                        Ok(value) => value,
                        Err(e) if e.is_corruption() => {
                            warn!(key, error = %e, "malformed value record, treating as absent");
                            return Ok(None);
                        }
                        Err(CodecError::Io(e)) => return Err(SegmentError::Io(e)),
                        Err(e) => return Err(SegmentError::Internal(e.to_string())),
                    };
                    return Ok(Some(Entry { key: probe, value }));
                }
            }
        }

        Ok(None)
    }

    // --------------------------------------------------------------------------------------------
    // Range-scan bootstrap
    // --------------------------------------------------------------------------------------------

    /// Finds the leftmost offset index whose key is `>= from` and, when `to`
    /// is given, `< to`.
    ///
    /// An exact match on `from` returns that index immediately.  On an
    /// overshoot the probe becomes the provisional leftmost candidate (only
    /// if it clears the `to` fence) and the search keeps narrowing toward
    /// smaller indices, so the final candidate is always the leftmost valid
    /// one.  Returns `Ok(None)` when no candidate exists: the segment is
    /// empty, `from` exceeds every stored key, or every key `>= from` falls
    /// outside `[from, to)`.
    ///
    /// A malformed probe record aborts the search with `Ok(None)`.
    pub fn find_nearest_start_index(
        &self,
        from: &str,
        to: Option<&str>,
    ) -> Result<Option<usize>, SegmentError> {
        let mut lo = 0usize;
        let mut hi = self.offsets.len();
        let mut candidate = None;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;

            let mut file = self.lock_file()?;
            file.seek(SeekFrom::Start(self.offsets[mid]))?;

            let Some(probe) = read_key(&mut file)? else {
                return Ok(None);
            };
            drop(file);

            match probe.as_str().cmp(from) {
                Ordering::Less => lo = mid + 1,
                Ordering::Equal => return Ok(Some(mid)),
                Ordering::Greater => {
                    if to.is_none_or(|t| probe.as_str() < t) {
                        candidate = Some(mid);
                    }
                    hi = mid;
                }
            }
        }

        Ok(candidate)
    }

    // --------------------------------------------------------------------------------------------
    // Range scan
    // --------------------------------------------------------------------------------------------

    /// Starts a forward scan over keys in `[from, to)`.
    ///
    /// `from == None` starts at the first key; otherwise the starting
    /// position is resolved with [`Self::find_nearest_start_index`], and a
    /// miss yields a cursor that is exhausted from the first call.
    /// `to == None` leaves the scan unbounded on the right; otherwise the
    /// scan stops before the first key `>= to`.
    ///
    /// The returned cursor owns its position and bound, so independent scans
    /// can run concurrently over the same reader — they only share the file
    /// lock, one record at a time.
    pub fn scan(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<SegmentScan<'_>, SegmentError> {
        let start = match from {
            None => Some(0),
            Some(from) => self.find_nearest_start_index(from, to)?,
        };
        Ok(SegmentScan::new(self, start, to.map(String::from)))
    }

    // --------------------------------------------------------------------------------------------
    // Lifecycle
    // --------------------------------------------------------------------------------------------

    /// Marks this segment as removed.
    ///
    /// The flag flips one way (false → true) and stays set; calling this
    /// again has no effect.  The reader itself does not act on the flag —
    /// it exists for external lifecycle management, e.g. excluding a
    /// segment slated for deletion from future lookups.
    pub fn set_removed(&self) {
        let _ = self.removed.compare_exchange(
            false,
            true,
            AtomicOrdering::AcqRel,
            AtomicOrdering::Acquire,
        );
    }

    /// Returns `true` once [`Self::set_removed`] has been called.
    pub fn is_removed(&self) -> bool {
        self.removed.load(AtomicOrdering::Acquire)
    }

    /// Closes the reader, releasing the file handle.
    ///
    /// Close consumes the reader, so a double close is unrepresentable.
    /// Dropping the reader without calling `close` releases the handle
    /// just the same; this method only makes the release explicit at call
    /// sites that want it visible.
    pub fn close(self) {
        debug!(keys = self.offsets.len(), "segment closed");
    }

    // --------------------------------------------------------------------------------------------
    // Internal helpers
    // --------------------------------------------------------------------------------------------

    /// Acquires the file lock, surfacing poisoning as an internal error.
    pub(crate) fn lock_file(&self) -> Result<std::sync::MutexGuard<'_, File>, SegmentError> {
        self.file
            .lock()
            .map_err(|_| SegmentError::Internal("segment file lock poisoned".into()))
    }

    /// Byte offset of the record at `index`.
    pub(crate) fn offset_at(&self, index: usize) -> u64 {
        self.offsets[index]
    }
}

// ------------------------------------------------------------------------------------------------
// Record decoding helpers
// ------------------------------------------------------------------------------------------------

/// Decodes the key slot at the file's current position.
///
/// Returns `Ok(None)` on any malformed region: a truncated prefix or
/// payload, a bad length, invalid UTF-16, or an absent marker in the key
/// slot (keys cannot be absent, so the marker there means the record is
/// garbage).  Device-level I/O errors propagate.
pub(crate) fn read_key(file: &mut File) -> Result<Option<String>, SegmentError> {
    match codec::read_string(file) {
        Ok(Some(key)) => Ok(Some(key)),
        Ok(None) => {
            warn!("absent marker in key slot, treating record as malformed");
            Ok(None)
        }
        Err(e) if e.is_corruption() => {
            warn!(error = %e, "malformed key record, treating as absent");
            Ok(None)
        }
        Err(CodecError::Io(e)) => Err(SegmentError::Io(e)),
        Err(e) => Err(SegmentError::Internal(e.to_string())),
    }
}
