//! The pattern index reader.
//!
//! The ROM carries a fixed-size table of 683 twelve-byte records at
//! [`Rom::INDEX_BASE`]. Each record either describes one pattern or is an
//! unused slot. Unused slots are skipped without comment; a record with a
//! recognized header but an undecodable field is reported by slot and
//! skipped, so one bad record never hides the rest of the table.
//!
//! [`Rom::INDEX_BASE`]: ../rom/struct.Rom.html#associatedconstant.INDEX_BASE

use std::fmt;

use crate::bcd;
use crate::error;
use crate::error::Errors;
use crate::rom::Rom;

/// The number of record slots in the index table.
pub const RECORD_COUNT: usize = 683;

/// The size of one index record, in bytes.
pub const RECORD_SIZE: usize = 12;

/// The kind of bitmap a pattern stores.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PatternKind {
  /// A single-plane bitmap, one bit per pixel.
  Monochrome,
  /// Three stacked bit-planes per visible row, colored by the memo array.
  Multicolor,
}

impl PatternKind {
  /// Decodes a record header into a kind, if it is a recognized marker.
  fn from_header(header: &[u8]) -> Option<Self> {
    match header {
      [0x02, 0x00] => Some(PatternKind::Monochrome),
      [0x03, 0x00] => Some(PatternKind::Multicolor),
      _ => None,
    }
  }
}

impl fmt::Display for PatternKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Monochrome => write!(f, "monochrome"),
      Self::Multicolor => write!(f, "multicolor"),
    }
  }
}

/// One entry of the ROM's pattern index.
///
/// Descriptors are produced in index order by [`read_index`] and consumed
/// by the bitmap codec; nothing mutates them afterwards. The reader does
/// not enforce uniqueness of `number` or `offset` across the table.
///
/// [`read_index`]: fn.read_index.html
#[derive(Clone, Debug)]
pub struct PatternDescriptor {
  /// The kind of bitmap this pattern stores.
  pub kind: PatternKind,
  /// The decimal pattern number.
  pub number: u32,
  /// Width of the stored bitmap, in pixels.
  pub width: usize,
  /// Height of the stored bitmap, in rows. For multicolor patterns this
  /// counts the stacked planes, which is three times the visible height.
  pub height: usize,
  /// Absolute byte address of the pattern's memo array.
  pub offset: usize,
}

/// An error produced while decoding an index record.
#[derive(Debug)]
pub enum IndexError {
  /// Indicates that a record field is not valid BCD.
  BadBcd {
    /// The record's slot in the table.
    slot: usize,
    /// The name of the offending field.
    field: &'static str,
    /// The underlying nibble error.
    cause: bcd::BadBcd,
  },
  /// Indicates that a record describes an empty bitmap.
  ZeroDimension {
    /// The record's slot in the table.
    slot: usize,
    /// The decoded width.
    width: usize,
    /// The decoded height.
    height: usize,
  },
  /// Indicates that a record's offset points outside the image.
  OffsetOutOfRange {
    /// The record's slot in the table.
    slot: usize,
    /// The decoded offset.
    offset: usize,
    /// The image size the offset must stay below.
    len: usize,
  },
}

impl fmt::Display for IndexError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::BadBcd { field, cause, .. } => {
        write!(f, "bad {} field: {}", field, cause)
      }
      Self::ZeroDimension { width, height, .. } => {
        write!(f, "empty bitmap: {}x{}", width, height)
      }
      Self::OffsetOutOfRange { offset, len, .. } => {
        write!(
          f,
          "pattern offset {:#x} is outside the {:#x}-byte image",
          offset, len
        )
      }
    }
  }
}

impl error::Error for IndexError {
  fn cause(&self) -> error::Cause<'_> {
    let slot = match self {
      Self::BadBcd { slot, .. } => slot,
      Self::ZeroDimension { slot, .. } => slot,
      Self::OffsetOutOfRange { slot, .. } => slot,
    };
    error::Cause::Record(*slot)
  }

  fn action(&self) -> Option<error::Action> {
    Some(error::Action::Indexing)
  }
}

/// Walks the index table, producing the valid descriptors in index order
/// (not sorted by offset), together with any per-record errors.
pub fn read_index(rom: &Rom) -> (Vec<PatternDescriptor>, Errors<IndexError>) {
  let mut patterns = Vec::new();
  let mut errors = Errors::new();
  let bytes = rom.bytes();

  for slot in 0..RECORD_COUNT {
    let start = Rom::INDEX_BASE + slot * RECORD_SIZE;
    let record = &bytes[start..start + RECORD_SIZE];

    let kind = match PatternKind::from_header(&record[0..2]) {
      Some(kind) => kind,
      // An unused slot.
      None => continue,
    };

    macro_rules! bcd_field {
      ($name:literal, $range:expr) => {
        match bcd::decode_bcd(&record[$range]) {
          Ok(value) => value,
          Err(cause) => {
            errors.push(IndexError::BadBcd {
              slot,
              field: $name,
              cause,
            });
            continue;
          }
        }
      };
    }

    let number = bcd_field!("number", 2..4);
    let width = bcd_field!("width", 4..6) as usize;
    let height = bcd_field!("height", 6..8) as usize;
    // Byte 8 is unused; the swapped three-byte offset sits at 9..12.
    let offset =
      bcd::decode_offset([record[9], record[10], record[11]]) as usize;

    if width == 0 || height == 0 {
      errors.push(IndexError::ZeroDimension {
        slot,
        width,
        height,
      });
      continue;
    }
    if offset >= bytes.len() {
      errors.push(IndexError::OffsetOutOfRange {
        slot,
        offset,
        len: bytes.len(),
      });
      continue;
    }

    patterns.push(PatternDescriptor {
      kind,
      number,
      width,
      height,
      offset,
    });
  }

  (patterns, errors)
}
