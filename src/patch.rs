//! Redacted ROM images.
//!
//! Zeroing every accepted match's range out of a ROM copy leaves exactly
//! the bytes no candidate accounted for; a fully explained pattern region
//! zeroes out entirely. The copy is the verification pipeline's one
//! designed-for output file besides the rasters.

use crate::rom::Rom;
use crate::scan::Match;

/// Returns a copy of the ROM with every accepted match's range
/// overwritten with zero bytes. Gaps and the index table are untouched.
pub fn zero_ranges(rom: &Rom, matches: &[Match]) -> Vec<u8> {
  let mut bytes = rom.bytes().to_vec();
  for m in matches {
    let end = m.end.min(bytes.len());
    for byte in &mut bytes[m.start.min(end)..end] {
      *byte = 0;
    }
  }
  bytes
}
