//! The bitmap codec: memo arrays, bit-packed planes, and color
//! composition.
//!
//! A pattern's data starts with its memo array: one 4-bit value per stored
//! row, packed two rows per byte, bottom row first. The bit-packed pixel
//! rows follow immediately, bottom-to-top, each padded to a byte boundary
//! with LSB-first bits. Monochrome patterns map each bit to a pixel and
//! carry their memo values along as an annotation; multicolor patterns
//! store three planes per visible row and use the memo values of the
//! planes as color indices.

use std::fmt;

use crate::bcd;
use crate::error;
use crate::index::PatternDescriptor;
use crate::index::PatternKind;
use crate::rom::Rom;

/// The fixed four-shade palette for multicolor patterns, as RGB triples:
/// white, light gray, dark gray, black.
pub const PALETTE: [[u8; 3]; 4] = [
  [255, 255, 255],
  [170, 170, 170],
  [85, 85, 85],
  [0, 0, 0],
];

/// The label under which a pattern's memo string is attached.
pub const MEMO_LABEL: &str = "AYAB";

/// Returns the length in bytes of a pattern's memo array, for `height`
/// stored rows: two rows pack into each byte.
pub fn memo_len(height: usize) -> usize {
  (height + 1) / 2
}

/// A decoded pattern raster.
///
/// Rows are stored top to bottom, reversed from the ROM's bottom-to-top
/// storage order. For monochrome patterns every pixel is 0 (blank) or 1
/// (inked); for multicolor patterns pixels are indices into [`PALETTE`].
///
/// [`PALETTE`]: constant.PALETTE.html
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Bitmap {
  /// The decimal number of the pattern this raster was decoded from.
  pub number: u32,
  /// The kind of pattern this raster was decoded from.
  pub kind: PatternKind,
  /// Width in pixels.
  pub width: usize,
  /// Height in pixels. For multicolor patterns this is the visible
  /// height, a third of the stored row count.
  pub height: usize,
  /// Row-major pixel values, `width * height` entries.
  pub pixels: Vec<u8>,
  /// The memo symbol string, in storage (bottom-to-top) row order.
  /// Monochrome only, and only when some memo value is non-zero.
  pub memo: Option<String>,
}

/// An error produced while decoding one pattern's bitmap.
#[derive(Debug)]
pub enum DecodeError {
  /// Indicates that the pattern's data runs past the end of the image.
  Truncated {
    /// The pattern's decimal number.
    number: u32,
    /// One past the last byte the pattern needs.
    need: usize,
    /// The image size.
    len: usize,
  },
  /// Indicates that a memo nibble is not a recognized value.
  BadMemo {
    /// The pattern's decimal number.
    number: u32,
    /// The stored (bottom-to-top) row the nibble annotates.
    row: usize,
    /// The underlying nibble error.
    cause: bcd::BadMemo,
  },
  /// Indicates that a multicolor plane selected a memo value outside the
  /// four-entry palette.
  ColorOutOfPalette {
    /// The pattern's decimal number.
    number: u32,
    /// The stored row whose memo value was selected.
    row: usize,
    /// The selected value.
    value: u8,
  },
}

impl fmt::Display for DecodeError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Truncated { need, len, .. } => write!(
        f,
        "pattern data runs past the end of the image ({:#x} > {:#x})",
        need, len
      ),
      Self::BadMemo { row, cause, .. } => {
        write!(f, "row {}: {}", row, cause)
      }
      Self::ColorOutOfPalette { row, value, .. } => write!(
        f,
        "row {}: memo value {} is outside the color palette",
        row, value
      ),
    }
  }
}

impl error::Error for DecodeError {
  fn cause(&self) -> error::Cause<'_> {
    let number = match self {
      Self::Truncated { number, .. } => number,
      Self::BadMemo { number, .. } => number,
      Self::ColorOutOfPalette { number, .. } => number,
    };
    error::Cause::Pattern(*number)
  }

  fn action(&self) -> Option<error::Action> {
    Some(error::Action::Decoding)
  }
}

/// Decodes the bitmap a descriptor points at, dispatching on its kind.
///
/// A malformed pattern fails with an error naming it; the caller is
/// expected to report the error and carry on with the rest of the batch.
pub fn decode(rom: &Rom, desc: &PatternDescriptor) -> Result<Bitmap, DecodeError> {
  match desc.kind {
    PatternKind::Monochrome => decode_monochrome(rom, desc),
    PatternKind::Multicolor => decode_multicolor(rom, desc),
  }
}

fn decode_monochrome(
  rom: &Rom,
  desc: &PatternDescriptor,
) -> Result<Bitmap, DecodeError> {
  let memo = parse_memo(rom, desc)?;
  let rows = decode_rows(rom, desc)?;

  let mut pixels = Vec::with_capacity(desc.width * desc.height);
  for row in rows.iter().rev() {
    pixels.extend_from_slice(row);
  }

  let memo = if memo.iter().any(|&v| v != 0) {
    Some(memo_text(&memo))
  } else {
    None
  };

  Ok(Bitmap {
    number: desc.number,
    kind: desc.kind,
    width: desc.width,
    height: desc.height,
    pixels,
    memo,
  })
}

fn decode_multicolor(
  rom: &Rom,
  desc: &PatternDescriptor,
) -> Result<Bitmap, DecodeError> {
  let memo = parse_memo(rom, desc)?;
  let rows = decode_rows(rom, desc)?;
  let visible = desc.height / 3;

  // Visible rows in storage order; reversed for presentation below.
  let mut composed = Vec::with_capacity(visible);
  for r in 0..visible {
    let base = r * 3;
    let mut row = Vec::with_capacity(desc.width);
    for x in 0..desc.width {
      let mut color = 0;
      for plane in 0..3 {
        if rows[base + plane][x] != 0 {
          let value = memo[base + plane];
          if value as usize >= PALETTE.len() {
            return Err(DecodeError::ColorOutOfPalette {
              number: desc.number,
              row: base + plane,
              value,
            });
          }
          color = value;
          break;
        }
      }
      row.push(color);
    }
    composed.push(row);
  }

  let mut pixels = Vec::with_capacity(desc.width * visible);
  for row in composed.iter().rev() {
    pixels.extend_from_slice(row);
  }

  Ok(Bitmap {
    number: desc.number,
    kind: desc.kind,
    width: desc.width,
    height: visible,
    pixels,
    memo: None,
  })
}

/// Decodes the memo array: one value per stored row, bottom to top. Even
/// rows occupy the low nibble of their byte, odd rows the high nibble.
fn parse_memo(
  rom: &Rom,
  desc: &PatternDescriptor,
) -> Result<Vec<u8>, DecodeError> {
  let data = slice(rom, desc, desc.offset, memo_len(desc.height))?;
  let mut values = Vec::with_capacity(desc.height);
  for row in 0..desc.height {
    let byte = data[row / 2];
    let value = if row % 2 == 0 { byte & 0x0f } else { byte >> 4 };
    if let Err(cause) = bcd::memo_symbol(value) {
      return Err(DecodeError::BadMemo {
        number: desc.number,
        row,
        cause,
      });
    }
    values.push(value);
  }
  Ok(values)
}

/// Reads the raw bit rows: one 0/1 value per pixel, rows in storage
/// (bottom-to-top) order. A set bit is an inked pixel.
fn decode_rows(
  rom: &Rom,
  desc: &PatternDescriptor,
) -> Result<Vec<Vec<u8>>, DecodeError> {
  let stride = (desc.width + 7) / 8;
  let base = desc.offset + memo_len(desc.height);
  let data = slice(rom, desc, base, stride * desc.height)?;

  let mut rows = Vec::with_capacity(desc.height);
  for row in 0..desc.height {
    let bytes = &data[row * stride..(row + 1) * stride];
    let mut pixels = Vec::with_capacity(desc.width);
    for x in 0..desc.width {
      pixels.push(bytes[x / 8] >> (x % 8) & 1);
    }
    rows.push(pixels);
  }
  Ok(rows)
}

/// Renders a memo value sequence as its symbol string, in the order given.
fn memo_text(values: &[u8]) -> String {
  // Values are validated by parse_memo; unknown nibbles cannot reach here.
  values
    .iter()
    .filter_map(|&v| bcd::memo_symbol(v).ok())
    .collect()
}

fn slice<'rom>(
  rom: &'rom Rom,
  desc: &PatternDescriptor,
  start: usize,
  len: usize,
) -> Result<&'rom [u8], DecodeError> {
  match rom.bytes().get(start..start + len) {
    Some(data) => Ok(data),
    None => Err(DecodeError::Truncated {
      number: desc.number,
      need: start + len,
      len: rom.len(),
    }),
  }
}

#[cfg(test)]
mod test {
  use super::*;

  const DATA: usize = 0x52004;

  /// Builds a ROM whose pattern data region starts with `data` at `DATA`.
  fn rom_with_data(data: &[u8]) -> Rom {
    let mut bytes = vec![0u8; 0x54000];
    bytes[DATA..DATA + data.len()].copy_from_slice(data);
    Rom::new(bytes).unwrap()
  }

  fn mono(number: u32, width: usize, height: usize) -> PatternDescriptor {
    PatternDescriptor {
      kind: PatternKind::Monochrome,
      number,
      width,
      height,
      offset: DATA,
    }
  }

  fn multi(number: u32, width: usize, height: usize) -> PatternDescriptor {
    PatternDescriptor {
      kind: PatternKind::Multicolor,
      number,
      width,
      height,
      offset: DATA,
    }
  }

  #[test]
  fn solid_square_decodes_without_memo() {
    // Four zeroed memo bytes, then an 8x8 fully-inked square.
    let mut data = vec![0u8; 4];
    data.extend_from_slice(&[0xff; 8]);
    let rom = rom_with_data(&data);

    let bitmap = decode(&rom, &mono(1, 8, 8)).unwrap();
    assert_eq!(bitmap.width, 8);
    assert_eq!(bitmap.height, 8);
    assert_eq!(bitmap.pixels, vec![1; 64]);
    assert_eq!(bitmap.memo, None);
  }

  #[test]
  fn rows_are_presented_top_to_bottom() {
    // 8x2: stored bottom row has pixel 0 inked, stored top row pixel 7.
    let rom = rom_with_data(&[0x00, 0x01, 0x80]);

    let bitmap = decode(&rom, &mono(2, 8, 2)).unwrap();
    let mut want = vec![0u8; 16];
    want[7] = 1; // presentation row 0 = stored row 1
    want[8] = 1; // presentation row 1 = stored row 0
    assert_eq!(bitmap.pixels, want);
  }

  #[test]
  fn bits_are_lsb_first() {
    // One row of 8 pixels from the byte 0x09: pixels 0 and 3 inked.
    let rom = rom_with_data(&[0x00, 0x09]);

    let bitmap = decode(&rom, &mono(3, 8, 1)).unwrap();
    assert_eq!(bitmap.pixels, vec![1, 0, 0, 1, 0, 0, 0, 0]);
  }

  #[test]
  fn non_zero_memo_is_attached_in_storage_order() {
    // Two rows; memo byte 0xa5 holds row 0 = 5 (low nibble) and
    // row 1 = 10 (high nibble).
    let rom = rom_with_data(&[0xa5, 0xff, 0xff]);

    let bitmap = decode(&rom, &mono(4, 8, 2)).unwrap();
    assert_eq!(bitmap.memo.as_deref(), Some("5N"));
  }

  #[test]
  fn invalid_memo_value_fails_the_pattern() {
    // Memo nibble 9 is not a recognized value.
    let rom = rom_with_data(&[0x09, 0xff, 0xff]);

    match decode(&rom, &mono(5, 8, 2)) {
      Err(DecodeError::BadMemo { number: 5, row: 0, .. }) => {}
      result => panic!("expected BadMemo, got {:?}", result),
    }
  }

  #[test]
  fn multicolor_composes_first_set_plane() {
    // 8x6 stored rows = two visible rows of three planes each.
    // Memo: rows 0..6 = [1, 2, 3, 0, 1, 2].
    let data = [
      0x21, 0x03, 0x21, // memo
      0xff, 0x00, 0x00, // visible row 0: plane 0 wins everywhere
      0x00, 0x0f, 0xff, // visible row 1: plane 1 wins for x < 4
    ];
    let rom = rom_with_data(&data);

    let bitmap = decode(&rom, &multi(6, 8, 6)).unwrap();
    assert_eq!(bitmap.width, 8);
    assert_eq!(bitmap.height, 2);

    // Presentation reverses the two visible rows.
    let mut want = Vec::new();
    want.extend_from_slice(&[1, 1, 1, 1, 2, 2, 2, 2]); // visible row 1
    want.extend_from_slice(&[1; 8]); // visible row 0
    assert_eq!(bitmap.pixels, want);
  }

  #[test]
  fn multicolor_unset_planes_are_palette_white() {
    let data = [
      0x21, 0x03, // memo rows 0..3
      0x00, 0x00, 0x00, // all planes clear
    ];
    let rom = rom_with_data(&data);

    let bitmap = decode(&rom, &multi(7, 8, 3)).unwrap();
    assert_eq!(bitmap.height, 1);
    assert_eq!(bitmap.pixels, vec![0; 8]);
  }

  #[test]
  fn multicolor_selected_color_must_fit_the_palette() {
    // Plane 0's memo value is 5: selectable, but outside the palette.
    let data = [
      0x05, 0x00, // memo
      0xff, 0x00, 0x00,
    ];
    let rom = rom_with_data(&data);

    match decode(&rom, &multi(8, 8, 3)) {
      Err(DecodeError::ColorOutOfPalette { number: 8, row: 0, value: 5 }) => {}
      result => panic!("expected ColorOutOfPalette, got {:?}", result),
    }
  }

  #[test]
  fn index_record_to_raster_end_to_end() {
    let mut bytes = vec![0u8; 0x54000];
    // Slot 0: monochrome, number 1, 8x8, data at 0x52004.
    let record = [
      0x02, 0x00, 0x01, 0x00, 0x08, 0x00, 0x08, 0x00, 0x00, 0x05, 0x04, 0x20,
    ];
    bytes[Rom::INDEX_BASE..Rom::INDEX_BASE + record.len()]
      .copy_from_slice(&record);
    // Four zeroed memo bytes, then a fully-inked 8x8 square.
    for byte in &mut bytes[DATA + 4..DATA + 12] {
      *byte = 0xff;
    }
    let rom = Rom::new(bytes).unwrap();

    let (patterns, errors) = crate::index::read_index(&rom);
    assert!(errors.is_ok());
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].offset, DATA);

    let bitmap = decode(&rom, &patterns[0]).unwrap();
    assert_eq!(bitmap.number, 1);
    assert_eq!((bitmap.width, bitmap.height), (8, 8));
    assert_eq!(bitmap.pixels, vec![1; 64]);
    assert_eq!(bitmap.memo, None);
  }

  #[test]
  fn truncated_pattern_fails_the_pattern() {
    let desc = PatternDescriptor {
      kind: PatternKind::Monochrome,
      number: 9,
      width: 8,
      height: 8,
      offset: 0x53fff,
    };
    let rom = rom_with_data(&[]);

    match decode(&rom, &desc) {
      Err(DecodeError::Truncated { number: 9, .. }) => {}
      result => panic!("expected Truncated, got {:?}", result),
    }
  }
}
