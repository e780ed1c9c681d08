//! Segment wire format — length-prefixed UTF-16 strings and the offset index.
//!
//! This module pins down the byte-level format shared by segment files and the
//! external flush path that produces them.  Because the format is owned here,
//! the on-disk representation **never** changes due to a dependency upgrade,
//! and both sides of the pipeline stay bit-compatible.
//!
//! # Wire format
//!
//! | Item              | Encoding                                              |
//! |-------------------|-------------------------------------------------------|
//! | String slot       | `[i32 BE length L][L × u16 BE code units]`            |
//! | Absent value      | `L == -1`, no payload bytes                           |
//! | Empty string      | `L == 0`, no payload bytes (distinct from absent)     |
//! | Offset index      | `[i32 BE count N][N × u64 BE offsets]`                |
//!
//! All multi-byte integers are **big-endian**.  String lengths count UTF-16
//! code units (2 bytes each), not characters and not bytes.  A data file is a
//! plain concatenation of records, each record being one key slot immediately
//! followed by one value slot; the offset index stores the byte position of
//! each record's key-length prefix.
//!
//! # Safety limits
//!
//! Variable-length decoders enforce upper bounds so that a corrupted length
//! prefix cannot trigger a multi-gigabyte allocation:
//!
//! - [`MAX_STRING_UNITS`]: maximum UTF-16 code units per string (default: 128 M
//!   units, 256 MiB of payload).
//! - [`MAX_INDEX_ENTRIES`]: maximum entry count for an offset index
//!   (default: 16 M).
//!
//! # Error classification
//!
//! [`CodecError::is_corruption`] separates *malformed-region* errors
//! (truncation, bad length prefix, bad UTF-16) from *device-level* I/O errors.
//! The segment reader treats the former as absence of data (fail-soft) and
//! propagates the latter to the caller.


use std::io::{self, Read, Write};

use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Constants and safety limits
// ------------------------------------------------------------------------------------------------

/// Length-prefix value that encodes an absent (tombstone) string slot.
pub const ABSENT_MARKER: i32 = -1;

/// Maximum UTF-16 code units for a single decoded string (128 M units).
///
/// Any decoded length field exceeding this value is rejected before
/// allocating, preventing allocation bombs from corrupted data.
pub const MAX_STRING_UNITS: i32 = 128 * 1024 * 1024;

/// Maximum entry count for a decoded offset index (16 M).
pub const MAX_INDEX_ENTRIES: i32 = 16 * 1024 * 1024;

// ------------------------------------------------------------------------------------------------
// Error type
// ------------------------------------------------------------------------------------------------

/// Errors produced while encoding or decoding the segment wire format.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying I/O error.  `ErrorKind::UnexpectedEof` indicates a
    /// truncated region and classifies as corruption.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A length or count prefix was negative (and not the absent marker).
    #[error("invalid length prefix: {0}")]
    InvalidLength(i32),

    /// A string payload was not valid UTF-16 (unpaired surrogate).
    #[error("invalid UTF-16 payload")]
    InvalidUtf16,

    /// A length or count exceeded its safety limit.
    #[error("length overflow: {0}")]
    LengthOverflow(String),

    /// The offset index byte length disagrees with its count prefix.
    #[error("offset index size mismatch: {0}")]
    IndexSizeMismatch(String),
}

impl CodecError {
    /// Returns `true` for errors that indicate a malformed or truncated
    /// region of the file rather than a failing device.
    ///
    /// The segment reader maps corruption to "no result" (lookups) or
    /// "end of scan" (scans) and propagates everything else as fatal.
    pub fn is_corruption(&self) -> bool {
        match self {
            CodecError::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            CodecError::InvalidLength(_)
            | CodecError::InvalidUtf16
            | CodecError::LengthOverflow(_)
            | CodecError::IndexSizeMismatch(_) => true,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// String slots
// ------------------------------------------------------------------------------------------------

/// Decode one string slot from the reader's current position.
///
/// Returns `Ok(None)` when the slot carries the absent marker (`-1` length),
/// which represents a tombstoned value.  `Ok(Some(String::new()))` is a
/// present, empty string — the two are distinct on the wire.
///
/// # Errors
///
/// - [`CodecError::Io`] with `UnexpectedEof` on a truncated prefix or payload.
/// - [`CodecError::InvalidLength`] on a negative length other than `-1`.
/// - [`CodecError::LengthOverflow`] on a length above [`MAX_STRING_UNITS`].
/// - [`CodecError::InvalidUtf16`] on an unpaired surrogate in the payload.
pub fn read_string<R: Read>(reader: &mut R) -> Result<Option<String>, CodecError> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix)?;
    let len = i32::from_be_bytes(prefix);

    if len == ABSENT_MARKER {
        return Ok(None);
    }
    if len < 0 {
        return Err(CodecError::InvalidLength(len));
    }
    if len > MAX_STRING_UNITS {
        return Err(CodecError::LengthOverflow(format!(
            "string length {len} exceeds MAX_STRING_UNITS ({MAX_STRING_UNITS})"
        )));
    }

    let mut payload = vec![0u8; len as usize * 2];
    reader.read_exact(&mut payload)?;

    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    match String::from_utf16(&units) {
        Ok(s) => Ok(Some(s)),
        Err(_) => Err(CodecError::InvalidUtf16),
    }
}

/// Encode one string slot.
///
/// `None` writes the absent marker with no payload; `Some(s)` writes the
/// UTF-16 code-unit count followed by the big-endian code units.
///
/// # Errors
///
/// Returns [`CodecError::LengthOverflow`] if the string exceeds
/// [`MAX_STRING_UNITS`] code units, and [`CodecError::Io`] on write failure.
pub fn write_string<W: Write>(writer: &mut W, value: Option<&str>) -> Result<(), CodecError> {
    let Some(value) = value else {
        writer.write_all(&ABSENT_MARKER.to_be_bytes())?;
        return Ok(());
    };

    let units: Vec<u16> = value.encode_utf16().collect();
    let len = i32::try_from(units.len())
        .ok()
        .filter(|&l| l <= MAX_STRING_UNITS)
        .ok_or_else(|| {
            CodecError::LengthOverflow(format!(
                "string length {} exceeds MAX_STRING_UNITS ({MAX_STRING_UNITS})",
                units.len()
            ))
        })?;

    writer.write_all(&len.to_be_bytes())?;
    for unit in units {
        writer.write_all(&unit.to_be_bytes())?;
    }
    Ok(())
}

// ------------------------------------------------------------------------------------------------
// Offset index
// ------------------------------------------------------------------------------------------------

/// Decode a full offset index: a count prefix followed by exactly that many
/// 8-byte offsets.
///
/// The index must end where the count says it does — a short body and
/// trailing bytes are both rejected, so the entry count always agrees with
/// the offsets actually present.
///
/// # Errors
///
/// - [`CodecError::InvalidLength`] on a negative count.
/// - [`CodecError::LengthOverflow`] on a count above [`MAX_INDEX_ENTRIES`].
/// - [`CodecError::Io`] with `UnexpectedEof` on a short body.
/// - [`CodecError::IndexSizeMismatch`] on trailing bytes after the last offset.
pub fn read_offsets<R: Read>(reader: &mut R) -> Result<Vec<u64>, CodecError> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix)?;
    let count = i32::from_be_bytes(prefix);

    if count < 0 {
        return Err(CodecError::InvalidLength(count));
    }
    if count > MAX_INDEX_ENTRIES {
        return Err(CodecError::LengthOverflow(format!(
            "offset count {count} exceeds MAX_INDEX_ENTRIES ({MAX_INDEX_ENTRIES})"
        )));
    }

    let mut offsets = Vec::with_capacity(count as usize);
    let mut buf = [0u8; 8];
    for _ in 0..count {
        reader.read_exact(&mut buf)?;
        offsets.push(u64::from_be_bytes(buf));
    }

    // The count prefix is authoritative; anything after the last offset
    // means the index and the data file disagree about the key count.
    let mut probe = [0u8; 1];
    if reader.read(&mut probe)? != 0 {
        return Err(CodecError::IndexSizeMismatch(format!(
            "trailing bytes after {count} offsets"
        )));
    }

    Ok(offsets)
}

/// Encode a full offset index: count prefix plus 8-byte big-endian offsets.
///
/// # Errors
///
/// Returns [`CodecError::LengthOverflow`] if there are more than
/// [`MAX_INDEX_ENTRIES`] offsets, and [`CodecError::Io`] on write failure.
pub fn write_offsets<W: Write>(writer: &mut W, offsets: &[u64]) -> Result<(), CodecError> {
    let count = i32::try_from(offsets.len())
        .ok()
        .filter(|&c| c <= MAX_INDEX_ENTRIES)
        .ok_or_else(|| {
            CodecError::LengthOverflow(format!(
                "offset count {} exceeds MAX_INDEX_ENTRIES ({MAX_INDEX_ENTRIES})",
                offsets.len()
            ))
        })?;

    writer.write_all(&count.to_be_bytes())?;
    for offset in offsets {
        writer.write_all(&offset.to_be_bytes())?;
    }
    Ok(())
}
