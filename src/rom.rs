//! Types and functions for manipulating KH-970 ROM images.
//!
//! The ROM is a flat byte buffer with a fixed layout: machine code lives
//! below `INDEX_BASE`, the 683-slot pattern index table sits at
//! `INDEX_BASE`, and the bit-packed pattern data follows it. [`Rom`] owns
//! the raw bytes and hands out the ranges the rest of the crate operates
//! on.
//!
//! [`Rom`]: struct.Rom.html

use std::fmt;
use std::ops::Range;

use crate::index;

/// A loaded KH-970 ROM image.
#[derive(Clone)]
pub struct Rom {
  bytes: Box<[u8]>,
}

impl Rom {
  /// The base address of the pattern index table.
  pub const INDEX_BASE: usize = 0x50000;

  /// Creates a new `Rom` from raw image bytes.
  ///
  /// Fails if the buffer cannot hold the full pattern index table. An
  /// undersized image is the only fatal condition in the tool; everything
  /// past the table is handled record-by-record.
  pub fn new(bytes: Vec<u8>) -> Result<Self, BadImage> {
    let need =
      Self::INDEX_BASE + index::RECORD_COUNT * index::RECORD_SIZE;
    if bytes.len() < need {
      return Err(BadImage {
        len: bytes.len(),
        need,
      });
    }
    Ok(Rom {
      bytes: bytes.into_boxed_slice(),
    })
  }

  /// Returns the raw ROM bytes.
  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  /// Returns the number of bytes in this image.
  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  /// Returns the half-open byte range the matching pipeline searches:
  /// everything from the pattern index table to the end of the image.
  pub fn search_window(&self) -> Range<usize> {
    Self::INDEX_BASE..self.bytes.len()
  }
}

/// An error indicating that an image is too small to contain the pattern
/// index table.
#[derive(Copy, Clone, Debug)]
pub struct BadImage {
  /// The actual image size.
  pub len: usize,
  /// The minimum size the fixed layout requires.
  pub need: usize,
}

impl fmt::Display for BadImage {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(
      f,
      "ROM image is {:#x} bytes; the pattern index needs at least {:#x}",
      self.len, self.need
    )
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn undersized_image_is_rejected() {
    assert!(Rom::new(vec![0; Rom::INDEX_BASE]).is_err());

    let len = Rom::INDEX_BASE + index::RECORD_COUNT * index::RECORD_SIZE;
    let rom = Rom::new(vec![0; len]).unwrap();
    assert_eq!(rom.len(), len);
    assert_eq!(rom.search_window(), Rom::INDEX_BASE..len);
  }
}
