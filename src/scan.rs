//! The ROM matching engine.
//!
//! Candidate bitstreams are located in the ROM by ordered exact search
//! with a tolerance-bounded fuzzy fallback. Both searches are restricted
//! to the current *gap set*: the address ranges not yet claimed by an
//! accepted match. Every acceptance recomputes the gaps, so longer, more
//! specific candidates shrink the space the shorter and more ambiguous
//! ones are allowed to match in. Acceptance order is part of the
//! contract: reordering it changes which gaps later candidates see.

use std::ops::Range;

use crate::bitmap;
use crate::chart::Candidate;
use crate::rom::Rom;

/// The default fuzzy-search tolerance: the accepted bit-error budget as a
/// fraction of a candidate's total bits. The value is empirical, carried
/// over from the original survey of the ROM, not derived from the format.
pub const DEFAULT_TOLERANCE: f64 = 0.10;

/// The number of positions reported for ambiguous searches and offset
/// cross-references.
pub const DIAGNOSTIC_LIMIT: usize = 5;

/// A contiguous half-open range of ROM address space not yet claimed by
/// any accepted match.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Gap {
  /// First byte of the gap.
  pub start: usize,
  /// One past the last byte of the gap.
  pub end: usize,
}

/// A located candidate.
#[derive(Clone, Debug)]
pub struct Match {
  /// The candidate's name.
  pub name: String,
  /// First byte of the claimed range, the memo prefix included.
  pub start: usize,
  /// One past the last byte of the claimed range.
  pub end: usize,
  /// Bit distance for fuzzy matches; `None` for exact matches.
  pub distance: Option<u32>,
}

/// The outcome of an exact search.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ExactOutcome {
  /// No occurrence in any gap.
  NoMatch,
  /// Exactly one occurrence across all gaps.
  Single {
    /// First byte of the claimed range.
    start: usize,
    /// One past the last byte of the claimed range.
    end: usize,
  },
  /// Two or more occurrences. Nothing is accepted; the positions (up to
  /// [`DIAGNOSTIC_LIMIT`]) are kept for diagnostics.
  ///
  /// [`DIAGNOSTIC_LIMIT`]: constant.DIAGNOSTIC_LIMIT.html
  Ambiguous(Vec<usize>),
}

/// The outcome of a fuzzy search.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FuzzyOutcome {
  /// No window within tolerance.
  NoMatch,
  /// A unique minimum-distance window.
  Single {
    /// First byte of the claimed range.
    start: usize,
    /// One past the last byte of the claimed range.
    end: usize,
    /// The measured bit distance.
    distance: u32,
  },
  /// Multiple windows tied at the minimum distance. Nothing is accepted.
  Ambiguous {
    /// The tied bit distance.
    distance: u32,
    /// Up to [`DIAGNOSTIC_LIMIT`] of the tied positions.
    ///
    /// [`DIAGNOSTIC_LIMIT`]: constant.DIAGNOSTIC_LIMIT.html
    positions: Vec<usize>,
  },
}

/// Ambiguity diagnostics for one candidate.
#[derive(Clone, Debug)]
pub struct Ambiguity {
  /// The candidate's name.
  pub name: String,
  /// The repeated or tied positions, up to [`DIAGNOSTIC_LIMIT`].
  ///
  /// [`DIAGNOSTIC_LIMIT`]: constant.DIAGNOSTIC_LIMIT.html
  pub positions: Vec<usize>,
  /// The tied bit distance, for fuzzy ambiguities.
  pub distance: Option<u32>,
}

/// The results of a batch scan.
#[derive(Clone, Debug)]
pub struct ScanResults {
  /// Accepted matches, in acceptance order.
  pub matches: Vec<Match>,
  /// Candidates with multiple equally good positions; never accepted.
  pub ambiguous: Vec<Ambiguity>,
  /// Candidates located by neither pass.
  pub not_found: Vec<String>,
}

/// The matching engine: borrows the ROM, owns the evolving gap set and
/// the accepted-match list. One `Matcher` is instantiated per run.
pub struct Matcher<'rom> {
  rom: &'rom Rom,
  gaps: Vec<Gap>,
  matches: Vec<Match>,
  tolerance: f64,
}

impl<'rom> Matcher<'rom> {
  /// Creates a matcher over `rom` with [`DEFAULT_TOLERANCE`].
  ///
  /// [`DEFAULT_TOLERANCE`]: constant.DEFAULT_TOLERANCE.html
  pub fn new(rom: &'rom Rom) -> Self {
    Self::with_tolerance(rom, DEFAULT_TOLERANCE)
  }

  /// Creates a matcher with a custom fuzzy bit-error tolerance.
  pub fn with_tolerance(rom: &'rom Rom, tolerance: f64) -> Self {
    let window = rom.search_window();
    Matcher {
      rom,
      gaps: vec![Gap {
        start: window.start,
        end: window.end,
      }],
      matches: Vec::new(),
      tolerance,
    }
  }

  /// Returns the current gap set, ordered by address.
  pub fn gaps(&self) -> &[Gap] {
    &self.gaps
  }

  /// Returns the accepted matches, in acceptance order.
  pub fn matches(&self) -> &[Match] {
    &self.matches
  }

  /// Searches the current gaps for literal occurrences of `pattern`.
  ///
  /// Searching starts `ceil(height / 2)` bytes into each gap: a located
  /// pattern's memo array precedes its pixel data in the ROM, and memo
  /// content varies independently of the bitstream, so it is skipped
  /// rather than required to match.
  pub fn exact_search(&self, pattern: &[u8], height: usize) -> ExactOutcome {
    let prefix = bitmap::memo_len(height);
    let bytes = self.rom.bytes();

    let mut positions = Vec::new();
    for gap in &self.gaps {
      if prefix + pattern.len() > gap.end - gap.start {
        continue;
      }
      let mut pos = gap.start + prefix;
      while let Some(found) = find(bytes, pattern, pos, gap.end) {
        positions.push(found);
        pos = found + 1;
      }
    }

    match positions.len() {
      0 => ExactOutcome::NoMatch,
      1 => ExactOutcome::Single {
        start: positions[0] - prefix,
        end: positions[0] + pattern.len(),
      },
      _ => {
        positions.truncate(DIAGNOSTIC_LIMIT);
        ExactOutcome::Ambiguous(positions)
      }
    }
  }

  /// Slides a `pattern`-sized window over every byte position in every
  /// gap and ranks windows by Hamming distance.
  ///
  /// A window qualifies if its distance is within the matcher's tolerance
  /// as a fraction of the pattern's total bits. The unique qualifying
  /// window of minimum distance wins; a tie is ambiguous and nothing is
  /// accepted.
  pub fn fuzzy_search(&self, pattern: &[u8], height: usize) -> FuzzyOutcome {
    let prefix = bitmap::memo_len(height);
    let bytes = self.rom.bytes();
    let max_errors = ((pattern.len() * 8) as f64 * self.tolerance) as u32;

    let mut best: Option<(usize, u32)> = None;
    let mut qualifying = Vec::new();
    for gap in &self.gaps {
      if pattern.len() > gap.end - gap.start {
        continue;
      }
      for pos in gap.start..=gap.end - pattern.len() {
        let distance = hamming(pattern, &bytes[pos..pos + pattern.len()]);
        if distance <= max_errors {
          if best.map(|(_, d)| distance < d).unwrap_or(true) {
            best = Some((pos, distance));
          }
          qualifying.push((pos, distance));
        }
      }
    }

    let (pos, distance) = match best {
      Some(best) => best,
      None => return FuzzyOutcome::NoMatch,
    };

    let mut tied: Vec<usize> = qualifying
      .iter()
      .filter(|&&(_, d)| d == distance)
      .map(|&(p, _)| p)
      .collect();
    if tied.len() > 1 {
      tied.truncate(DIAGNOSTIC_LIMIT);
      return FuzzyOutcome::Ambiguous {
        distance,
        positions: tied,
      };
    }

    FuzzyOutcome::Single {
      start: pos - prefix,
      end: pos + pattern.len(),
      distance,
    }
  }

  /// Accepts a match and recomputes the gap set.
  ///
  /// The gaps become the complement of all accepted ranges within the
  /// search window, so gaps and accepted ranges always tile the window
  /// exactly.
  pub fn accept(&mut self, m: Match) {
    self.matches.push(m);
    self.gaps = complement(&self.matches, self.rom.search_window());
  }

  /// Runs the two-pass batch over `candidates`.
  ///
  /// Candidates are tried longest-first, so the most specific patterns
  /// claim their ranges before shorter, more ambiguous ones search. The
  /// exact pass runs first; candidates it neither matched nor flagged
  /// ambiguous are retried with fuzzy search over whatever gaps remain,
  /// and every fuzzy acceptance narrows the gaps for the next one.
  pub fn run(&mut self, candidates: &[Candidate]) -> ScanResults {
    let mut order: Vec<&Candidate> = candidates.iter().collect();
    order.sort_by(|a, b| b.bytes.len().cmp(&a.bytes.len()));

    let mut ambiguous = Vec::new();
    let mut missed = Vec::new();
    for candidate in order {
      match self.exact_search(&candidate.bytes, candidate.height) {
        ExactOutcome::Single { start, end } => self.accept(Match {
          name: candidate.name.clone(),
          start,
          end,
          distance: None,
        }),
        ExactOutcome::Ambiguous(positions) => ambiguous.push(Ambiguity {
          name: candidate.name.clone(),
          positions,
          distance: None,
        }),
        ExactOutcome::NoMatch => missed.push(candidate),
      }
    }

    let mut not_found = Vec::new();
    for candidate in missed {
      match self.fuzzy_search(&candidate.bytes, candidate.height) {
        FuzzyOutcome::Single {
          start,
          end,
          distance,
        } => self.accept(Match {
          name: candidate.name.clone(),
          start,
          end,
          distance: Some(distance),
        }),
        FuzzyOutcome::Ambiguous {
          distance,
          positions,
        } => ambiguous.push(Ambiguity {
          name: candidate.name.clone(),
          positions,
          distance: Some(distance),
        }),
        FuzzyOutcome::NoMatch => not_found.push(candidate.name.clone()),
      }
    }

    ScanResults {
      matches: self.matches.clone(),
      ambiguous,
      not_found,
    }
  }
}

/// Scans the whole image for the two-byte little-endian encoding of
/// `target & 0xFFFF`, returning up to [`DIAGNOSTIC_LIMIT`] positions.
/// Occurrences may be data, code, or coincidence; this is a
/// cross-referencing aid, not a correctness signal.
///
/// [`DIAGNOSTIC_LIMIT`]: constant.DIAGNOSTIC_LIMIT.html
pub fn find_offset_references(rom: &Rom, target: usize) -> Vec<usize> {
  let needle = ((target & 0xffff) as u16).to_le_bytes();
  let bytes = rom.bytes();

  let mut refs = Vec::new();
  let mut pos = 0;
  while refs.len() < DIAGNOSTIC_LIMIT {
    match find(bytes, &needle, pos, bytes.len()) {
      Some(found) => {
        refs.push(found);
        pos = found + 1;
      }
      None => break,
    }
  }
  refs
}

/// Finds the first occurrence of `needle` that fits entirely within
/// `haystack[from..to]`.
fn find(
  haystack: &[u8],
  needle: &[u8],
  from: usize,
  to: usize,
) -> Option<usize> {
  if needle.is_empty() || to > haystack.len() || from + needle.len() > to {
    return None;
  }
  haystack[from..to]
    .windows(needle.len())
    .position(|window| window == needle)
    .map(|i| from + i)
}

/// Counts differing bits between two equal-length byte slices.
fn hamming(a: &[u8], b: &[u8]) -> u32 {
  a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Computes the complement of `matches` within `window`, as gaps ordered
/// by address.
fn complement(matches: &[Match], window: Range<usize>) -> Vec<Gap> {
  let mut ranges: Vec<(usize, usize)> =
    matches.iter().map(|m| (m.start, m.end)).collect();
  ranges.sort();

  let mut gaps = Vec::new();
  let mut last_end = window.start;
  for (start, end) in ranges {
    if start > last_end {
      gaps.push(Gap {
        start: last_end,
        end: start,
      });
    }
    if end > last_end {
      last_end = end;
    }
  }
  if last_end < window.end {
    gaps.push(Gap {
      start: last_end,
      end: window.end,
    });
  }
  gaps
}

#[cfg(test)]
mod test {
  use super::*;
  use std::path::PathBuf;

  const LEN: usize = 0x54000;

  fn rom_with(content: &[(usize, &[u8])]) -> Rom {
    let mut bytes = vec![0u8; LEN];
    for &(at, data) in content {
      bytes[at..at + data.len()].copy_from_slice(data);
    }
    Rom::new(bytes).unwrap()
  }

  fn candidate(name: &str, height: usize, bytes: &[u8]) -> Candidate {
    Candidate {
      name: name.to_string(),
      path: PathBuf::from(format!("{}.txt", name)),
      width: 8,
      height,
      bytes: bytes.to_vec(),
    }
  }

  /// Checks that gaps and accepted ranges tile the search window exactly.
  fn assert_tiles(matcher: &Matcher) {
    let mut spans: Vec<(usize, usize)> = matcher
      .gaps()
      .iter()
      .map(|g| (g.start, g.end))
      .chain(matcher.matches().iter().map(|m| (m.start, m.end)))
      .collect();
    spans.sort();

    let window = matcher.rom.search_window();
    let mut at = window.start;
    for (start, end) in spans {
      assert_eq!(start, at, "overlap or omission at {:#x}", start);
      at = end;
    }
    assert_eq!(at, window.end);
  }

  #[test]
  fn exact_search_is_reflexive() {
    let pattern = [0xde, 0xad, 0xbe, 0xef];
    let rom = rom_with(&[(0x52100, &pattern[..])]);
    let matcher = Matcher::new(&rom);

    // height 4 -> two bytes of memo prefix.
    assert_eq!(
      matcher.exact_search(&pattern, 4),
      ExactOutcome::Single {
        start: 0x52100 - 2,
        end: 0x52100 + 4,
      }
    );
  }

  #[test]
  fn duplicated_bytes_are_ambiguous() {
    let pattern = [0xde, 0xad, 0xbe, 0xef];
    let rom =
      rom_with(&[(0x52100, &pattern[..]), (0x53000, &pattern[..])]);
    let matcher = Matcher::new(&rom);

    assert_eq!(
      matcher.exact_search(&pattern, 4),
      ExactOutcome::Ambiguous(vec![0x52100, 0x53000])
    );
  }

  #[test]
  fn exact_search_skips_claimed_ranges() {
    let pattern = [0xde, 0xad, 0xbe, 0xef];
    let rom =
      rom_with(&[(0x52100, &pattern[..]), (0x53000, &pattern[..])]);
    let mut matcher = Matcher::new(&rom);

    matcher.accept(Match {
      name: "claimed".to_string(),
      start: 0x52100 - 2,
      end: 0x52100 + 4,
      distance: None,
    });

    assert_eq!(
      matcher.exact_search(&pattern, 4),
      ExactOutcome::Single {
        start: 0x53000 - 2,
        end: 0x53000 + 4,
      }
    );
    assert_tiles(&matcher);
  }

  #[test]
  fn fuzzy_search_accepts_within_tolerance() {
    // 4 bytes = 32 bits; tolerance 10% allows 3 errors. Corrupt 2 bits.
    let rom = rom_with(&[(0x52100, &[0xff, 0xfc, 0xff, 0xff][..])]);
    let matcher = Matcher::new(&rom);

    assert_eq!(
      matcher.fuzzy_search(&[0xff; 4], 4),
      FuzzyOutcome::Single {
        start: 0x52100 - 2,
        end: 0x52100 + 4,
        distance: 2,
      }
    );
  }

  #[test]
  fn fuzzy_search_rejects_beyond_tolerance() {
    // 4 corrupted bits exceed the 3-error budget.
    let rom = rom_with(&[(0x52100, &[0xff, 0xf0, 0xff, 0xff][..])]);
    let matcher = Matcher::new(&rom);

    assert_eq!(matcher.fuzzy_search(&[0xff; 4], 4), FuzzyOutcome::NoMatch);
  }

  #[test]
  fn fuzzy_ties_are_ambiguous() {
    let corrupt = [0xff, 0xfe, 0xff, 0xff];
    let rom =
      rom_with(&[(0x52100, &corrupt[..]), (0x53000, &corrupt[..])]);
    let matcher = Matcher::new(&rom);

    assert_eq!(
      matcher.fuzzy_search(&[0xff; 4], 4),
      FuzzyOutcome::Ambiguous {
        distance: 1,
        positions: vec![0x52100, 0x53000],
      }
    );
  }

  #[test]
  fn longer_candidates_claim_ranges_first() {
    // The short candidate's bytes occur inside the long one's range and
    // once more on their own; only the latter is in a gap once the long
    // candidate has been accepted.
    let long = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
    let short = [0x03, 0x04, 0x05];
    let rom = rom_with(&[(0x52000, &long[..]), (0x53000, &short[..])]);
    let mut matcher = Matcher::new(&rom);

    let results = matcher.run(&[
      candidate("short", 2, &short),
      candidate("long", 4, &long),
    ]);

    assert!(results.ambiguous.is_empty());
    assert!(results.not_found.is_empty());
    assert_eq!(results.matches.len(), 2);
    assert_eq!(results.matches[0].name, "long");
    assert_eq!(results.matches[0].start, 0x52000 - 2);
    assert_eq!(results.matches[1].name, "short");
    assert_eq!(results.matches[1].start, 0x53000 - 1);
    assert_tiles(&matcher);
  }

  #[test]
  fn batch_falls_back_to_fuzzy_and_reports_misses() {
    let found = [0xaa, 0xbb, 0xcc, 0xdd, 0xee];
    let corrupt = [0xff, 0xfe, 0xff, 0xff];
    let rom = rom_with(&[(0x52100, &found[..]), (0x53000, &corrupt[..])]);
    let mut matcher = Matcher::new(&rom);

    let results = matcher.run(&[
      candidate("exact", 2, &found),
      candidate("fuzzy", 4, &[0xff; 4]),
      candidate("missing", 2, &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
    ]);

    assert_eq!(results.matches.len(), 2);
    assert_eq!(results.matches[0].name, "exact");
    assert_eq!(results.matches[0].distance, None);
    assert_eq!(results.matches[1].name, "fuzzy");
    assert_eq!(results.matches[1].distance, Some(1));
    assert_eq!(results.not_found, vec!["missing".to_string()]);
    assert_tiles(&matcher);
  }

  #[test]
  fn gap_set_tiles_after_arbitrary_accepts() {
    let rom = rom_with(&[]);
    let mut matcher = Matcher::new(&rom);

    for &(start, end) in
      &[(0x52000, 0x52040), (0x53f00, LEN), (0x50000, 0x50010)]
    {
      matcher.accept(Match {
        name: format!("{:x}", start),
        start,
        end,
        distance: None,
      });
      assert_tiles(&matcher);
    }
  }

  #[test]
  fn offset_references_find_little_endian_pointers() {
    let rom = rom_with(&[
      (0x100, &[0x04, 0x20][..]),
      (0x52200, &[0x04, 0x20][..]),
    ]);
    assert_eq!(find_offset_references(&rom, 0x52004), vec![0x100, 0x52200]);
  }
}
