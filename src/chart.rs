//! Candidate pattern charts.
//!
//! The matching pipeline's inputs come from external cropping and PDF
//! extraction tools as text charts: one line per row, top to bottom, `#`
//! for an inked pixel and `.` for a blank one. Packing follows the ROM's
//! own row encoding (bottom row first, rows padded to a byte boundary,
//! LSB-first bits), so a packed candidate compares byte-for-byte against
//! ROM content past the memo prefix.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::bitmap;
use crate::error;

/// A candidate pattern, packed and ready to search for.
#[derive(Debug)]
pub struct Candidate {
  /// The candidate's name: its chart's file stem.
  pub name: String,
  /// The chart file this candidate was loaded from.
  pub path: PathBuf,
  /// Width in pixels, before padding.
  pub width: usize,
  /// Height in rows.
  pub height: usize,
  /// The packed bitstream.
  pub bytes: Vec<u8>,
}

/// An error produced while loading a chart file.
#[derive(Debug)]
pub enum ChartError {
  /// Indicates that the file could not be read.
  Io {
    /// The chart's path.
    path: PathBuf,
    /// The underlying I/O error.
    cause: io::Error,
  },
  /// Indicates a character other than `#` or `.` in a row.
  BadPixel {
    /// The chart's path.
    path: PathBuf,
    /// The 1-based line the character appears on.
    line: usize,
    /// The character itself.
    ch: char,
  },
  /// Indicates a row whose width differs from the first row's.
  RaggedRow {
    /// The chart's path.
    path: PathBuf,
    /// The 1-based line of the odd row.
    line: usize,
    /// The odd row's width.
    width: usize,
    /// The width of the first row.
    expected: usize,
  },
  /// Indicates a chart with no pixels at all.
  Empty {
    /// The chart's path.
    path: PathBuf,
  },
}

impl fmt::Display for ChartError {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Io { cause, .. } => write!(f, "could not read chart: {}", cause),
      Self::BadPixel { line, ch, .. } => {
        write!(f, "line {}: unexpected character {:?}", line, ch)
      }
      Self::RaggedRow {
        line,
        width,
        expected,
        ..
      } => write!(
        f,
        "line {}: row is {} pixels wide; expected {}",
        line, width, expected
      ),
      Self::Empty { .. } => write!(f, "chart has no pixels"),
    }
  }
}

impl error::Error for ChartError {
  fn cause(&self) -> error::Cause<'_> {
    let path = match self {
      Self::Io { path, .. } => path,
      Self::BadPixel { path, .. } => path,
      Self::RaggedRow { path, .. } => path,
      Self::Empty { path } => path,
    };
    error::Cause::File(path)
  }

  fn action(&self) -> Option<error::Action> {
    Some(error::Action::Loading)
  }
}

/// Loads and packs the chart at `path`.
pub fn load(path: &Path) -> Result<Candidate, ChartError> {
  let text = fs::read_to_string(path).map_err(|cause| ChartError::Io {
    path: path.to_path_buf(),
    cause,
  })?;

  let mut grid = Vec::new();
  let mut width = 0;
  for (i, line) in text.lines().enumerate() {
    let mut row = Vec::with_capacity(line.len());
    for ch in line.chars() {
      match ch {
        '#' => row.push(true),
        '.' => row.push(false),
        ch => {
          return Err(ChartError::BadPixel {
            path: path.to_path_buf(),
            line: i + 1,
            ch,
          })
        }
      }
    }
    if i == 0 {
      width = row.len();
    } else if row.len() != width {
      return Err(ChartError::RaggedRow {
        path: path.to_path_buf(),
        line: i + 1,
        width: row.len(),
        expected: width,
      });
    }
    grid.push(row);
  }

  if width == 0 || grid.is_empty() {
    return Err(ChartError::Empty {
      path: path.to_path_buf(),
    });
  }

  let name = match path.file_stem() {
    Some(stem) => stem.to_string_lossy().into_owned(),
    None => path.display().to_string(),
  };

  Ok(Candidate {
    name,
    path: path.to_path_buf(),
    width,
    height: grid.len(),
    bytes: pack(&grid),
  })
}

/// Loads every chart in `paths`, collecting per-file errors so that one
/// unreadable chart doesn't sink the batch.
pub fn load_all(
  paths: &[PathBuf],
) -> (Vec<Candidate>, error::Errors<ChartError>) {
  let mut candidates = Vec::with_capacity(paths.len());
  let mut errors = error::Errors::new();
  for path in paths {
    match load(path) {
      Ok(candidate) => candidates.push(candidate),
      Err(e) => errors.push(e),
    }
  }
  (candidates, errors)
}

/// Packs a top-to-bottom grid of inked flags into the ROM's row encoding:
/// bottom row first, rows padded to a byte boundary, LSB-first bits.
pub fn pack(grid: &[Vec<bool>]) -> Vec<u8> {
  let width = grid.first().map(|row| row.len()).unwrap_or(0);
  let stride = (width + 7) / 8;

  let mut bytes = Vec::with_capacity(stride * grid.len());
  for row in grid.iter().rev() {
    let mut packed = vec![0u8; stride];
    for (x, &inked) in row.iter().enumerate() {
      if inked {
        packed[x / 8] |= 1 << (x % 8);
      }
    }
    bytes.extend_from_slice(&packed);
  }
  bytes
}

/// Regenerates chart text from a matched ROM range.
///
/// `bytes` is the full claimed range, memo prefix included; the prefix is
/// skipped the same way the search primitives skip it. Padding bits past
/// `width` are dropped.
pub fn unpack(bytes: &[u8], width: usize, height: usize) -> String {
  let data = &bytes[bitmap::memo_len(height)..];
  let stride = data.len() / height;

  let mut text = String::with_capacity((width + 1) * height);
  for row in (0..height).rev() {
    let bytes = &data[row * stride..row * stride + stride];
    for x in 0..width {
      let bit = bytes[x / 8] >> (x % 8) & 1;
      text.push(if bit != 0 { '#' } else { '.' });
    }
    text.push('\n');
  }
  text
}
