//! PNG output for decoded patterns.
//!
//! Monochrome patterns are written as 8-bit grayscale, inked pixels
//! black; multicolor patterns as indexed color over the fixed four-shade
//! palette. A pattern's memo string rides along as a `tEXt` chunk so that
//! downstream tooling can recover the machine's row annotations from the
//! image alone.

use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::path::Path;

use crate::bitmap::Bitmap;
use crate::bitmap::MEMO_LABEL;
use crate::bitmap::PALETTE;
use crate::index::PatternKind;

/// Writes `bitmap` as a PNG at `path`.
pub fn write_png(bitmap: &Bitmap, path: &Path) -> io::Result<()> {
  let file = File::create(path)?;
  let w = BufWriter::new(file);

  let mut encoder =
    png::Encoder::new(w, bitmap.width as u32, bitmap.height as u32);
  encoder.set_depth(png::BitDepth::Eight);

  let data: Vec<u8> = match bitmap.kind {
    PatternKind::Monochrome => {
      encoder.set_color(png::ColorType::Grayscale);
      bitmap
        .pixels
        .iter()
        .map(|&p| if p == 0 { 255 } else { 0 })
        .collect()
    }
    PatternKind::Multicolor => {
      encoder.set_color(png::ColorType::Indexed);
      encoder.set_palette(PALETTE.concat());
      bitmap.pixels.clone()
    }
  };

  if let Some(memo) = &bitmap.memo {
    encoder
      .add_text_chunk(
        "Comment".to_string(),
        format!("{}:{}", MEMO_LABEL, memo),
      )
      .map_err(to_io)?;
  }

  let mut writer = encoder.write_header().map_err(to_io)?;
  writer.write_image_data(&data).map_err(to_io)?;
  Ok(())
}

fn to_io(e: png::EncodingError) -> io::Error {
  io::Error::new(io::ErrorKind::Other, e)
}
