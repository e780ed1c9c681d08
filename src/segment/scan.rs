//! Forward scan cursor over a segment.
//!
//! A [`SegmentScan`] is a value object returned by
//! [`SegmentReader::scan`](super::SegmentReader::scan): it owns its next
//! position and its exclusive upper bound, so any number of scans can run
//! concurrently over one reader.  Each step locks the shared file handle for
//! exactly one record's seek+decode, then releases it — scans interleave with
//! lookups and with each other at record granularity.
//!
//! The scan is forward-only and not restartable.  Once exhausted — the end of
//! the segment, a key at or past the upper bound, or a malformed record —
//! every further call keeps reporting end-of-scan.

use std::io::{Seek, SeekFrom};

use tracing::warn;

use crate::codec::{self, CodecError};

use super::{Entry, SegmentError, SegmentReader, read_key};

// ------------------------------------------------------------------------------------------------
// Scan cursor
// ------------------------------------------------------------------------------------------------

/// Cursor for one in-progress forward range scan.
///
/// Yields entries in ascending key order, tombstones included (an entry with
/// `value == None`).  Construct via
/// [`SegmentReader::scan`](super::SegmentReader::scan).
#[derive(Debug)]
pub struct SegmentScan<'a> {
    /// The segment being scanned.
    segment: &'a SegmentReader,

    /// Offset-array index of the next record to read.  `None` once the scan
    /// is exhausted — also the initial state when the bootstrap search found
    /// no key inside the requested window.
    next_index: Option<usize>,

    /// Exclusive upper bound: the scan ends before the first key `>= bound`.
    /// `None` leaves the scan unbounded on the right.
    end_bound: Option<String>,
}

impl<'a> SegmentScan<'a> {
    pub(crate) fn new(
        segment: &'a SegmentReader,
        start: Option<usize>,
        end_bound: Option<String>,
    ) -> Self {
        Self {
            segment,
            next_index: start,
            end_bound,
        }
    }

    /// Reads the record under the cursor and advances by one.
    ///
    /// Returns `Ok(None)` at end-of-scan: past the last record, at the first
    /// key `>= ` the upper bound, or on a malformed record (fail-soft — the
    /// scan ends rather than erroring).  End-of-scan is sticky: once reached,
    /// every further call returns `Ok(None)` without touching the file.
    ///
    /// # Errors
    ///
    /// Device-level I/O failures and lock poisoning are fatal for the call.
    pub fn next_entry(&mut self) -> Result<Option<Entry>, SegmentError> {
        let Some(index) = self.next_index else {
            return Ok(None);
        };
        if index >= self.segment.key_count() {
            self.next_index = None;
            return Ok(None);
        }

        let mut file = self.segment.lock_file()?;
        file.seek(SeekFrom::Start(self.segment.offset_at(index)))?;
        self.next_index = Some(index + 1);

        let Some(key) = read_key(&mut file)? else {
            self.next_index = None;
            return Ok(None);
        };

        if let Some(bound) = &self.end_bound {
            if key.as_str() >= bound.as_str() {
                self.next_index = None;
                return Ok(None);
            }
        }

        let value = match codec::read_string(&mut *file) {
            Ok(value) => value,
            Err(e) if e.is_corruption() => {
                warn!(key = %key, error = %e, "malformed value record, ending scan");
                self.next_index = None;
                return Ok(None);
            }
            Err(CodecError::Io(e)) => return Err(SegmentError::Io(e)),
            Err(e) => return Err(SegmentError::Internal(e.to_string())),
        };

        Ok(Some(Entry { key, value }))
    }
}

impl Iterator for SegmentScan<'_> {
    type Item = Result<Entry, SegmentError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
