//! Error printing facilities.
//!
//! These functions are used to simplify the display of various STITCHROM
//! errors to the user. The [`Error`] trait describes how a Rust error type
//! can be converted into a simple diagnostic, and [`Errors`] accumulates
//! diagnostics over a batch, so that one bad pattern never aborts the rest
//! of a run.
//!
//! [`Error`]: trait.Error.html
//! [`Errors`]: struct.Errors.html

use std::fmt;
use std::io;
use std::path::Path;

/// An error which can be described as a diagnostic.
///
/// Types that implement `Error` must also implement [`std::fmt::Display`]. For
/// the user-displayed error to look right, this implementation should only be
/// one line long.
///
/// [`std::fmt::Display`]: https://doc.rust-lang.org/std/fmt/trait.Display.html
pub trait Error: fmt::Debug + fmt::Display {
  /// Returns a `Cause` describing the input that resulted in the error.
  fn cause(&self) -> Cause<'_>;
  /// Returns an action this error is associated with, if any at all.
  fn action(&self) -> Option<Action>;
}

/// A collection of errors that may built up over the course of an action.
///
/// The type parameter `E` should be a type implementing [`Error`].
///
/// [`Error`]: trait.Error.html
pub struct Errors<E>(Vec<E>);

impl<E> Errors<E> {
  /// Creates an empty `Errors`.
  pub fn new() -> Self {
    Errors(Vec::new())
  }

  /// Returns true if this `Errors` hasn't had any errors added yet.
  pub fn is_ok(&self) -> bool {
    self.0.is_empty()
  }

  /// Adds a new error to this `Errors`.
  pub fn push(&mut self, error: E) {
    self.0.push(error);
  }
}

impl<E: Error> Errors<E> {
  /// Dumps this collection of errors as user-displayable text into `sink`.
  ///
  /// Returns `Ok(true)` if anything was written.
  pub fn dump_to(&self, mut sink: impl io::Write) -> io::Result<bool> {
    if self.0.is_empty() {
      return Ok(false);
    }

    for error in &self.0 {
      writeln!(sink, "error: {}", error)?;
      let doing = match error.action() {
        Some(action) => action.describe(),
        None => "processing",
      };
      match error.cause() {
        Cause::Pattern(number) => {
          writeln!(sink, "  while {} pattern {}", doing, number)?
        }
        Cause::Record(slot) => {
          writeln!(sink, "  while {} record {}", doing, slot)?
        }
        Cause::File(path) => {
          writeln!(sink, "  while {} {}", doing, path.display())?
        }
      }
    }

    Ok(true)
  }
}

/// The place where an error occured, to varrying degrees of specificity.
pub enum Cause<'a> {
  /// A pattern, identified by its decimal pattern number.
  Pattern(u32),
  /// A slot in the ROM's pattern index table.
  Record(usize),
  /// A file, for when we don't know much about where the error came from
  /// within.
  File(&'a Path),
}

/// An action that STITCHROM performs, which an error may be associated with.
pub enum Action {
  /// The index step, walking the ROM's pattern index table.
  Indexing,
  /// The decode step, converting pattern data into rasters.
  Decoding,
  /// The load step, reading candidate charts.
  Loading,
}

impl Action {
  fn describe(self) -> &'static str {
    match self {
      Self::Indexing => "indexing",
      Self::Decoding => "decoding",
      Self::Loading => "loading",
    }
  }
}
