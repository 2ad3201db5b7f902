//! Serializable scan reports.
//!
//! Mirrors the console listing as data: matches ordered by ROM offset,
//! the unknown ranges between them, and the ambiguous and not-found name
//! lists.

#![allow(missing_docs)]

use serde::Serialize;

use crate::rom::Rom;
use crate::scan;
use crate::scan::ScanResults;

/// A whole scan, ready to serialize.
#[derive(Serialize)]
pub struct Report {
  pub matches: Vec<MatchEntry>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub unknown: Vec<RangeEntry>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub ambiguous: Vec<AmbiguityEntry>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub not_found: Vec<String>,
}

#[derive(Serialize)]
pub struct MatchEntry {
  pub name: String,
  pub start: usize,
  pub end: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub distance: Option<u32>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub refs: Vec<usize>,
}

#[derive(Serialize)]
pub struct RangeEntry {
  pub start: usize,
  pub end: usize,
}

#[derive(Serialize)]
pub struct AmbiguityEntry {
  pub name: String,
  pub positions: Vec<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub distance: Option<u32>,
}

impl Report {
  /// Builds a report from scan results: matches ordered by offset, the
  /// unknown ranges between non-adjacent matches inferred, names of
  /// not-found candidates sorted.
  pub fn new(rom: &Rom, results: &ScanResults) -> Self {
    let mut ordered: Vec<&scan::Match> = results.matches.iter().collect();
    ordered.sort_by_key(|m| m.start);

    let mut matches = Vec::with_capacity(ordered.len());
    let mut unknown = Vec::new();
    for (i, m) in ordered.iter().enumerate() {
      matches.push(MatchEntry {
        name: m.name.clone(),
        start: m.start,
        end: m.end,
        distance: m.distance,
        refs: scan::find_offset_references(rom, m.start),
      });
      if let Some(next) = ordered.get(i + 1) {
        if m.end != next.start {
          unknown.push(RangeEntry {
            start: m.end,
            end: next.start,
          });
        }
      }
    }

    let mut not_found = results.not_found.clone();
    not_found.sort();

    Report {
      matches,
      unknown,
      ambiguous: results
        .ambiguous
        .iter()
        .map(|a| AmbiguityEntry {
          name: a.name.clone(),
          positions: a.positions.clone(),
          distance: a.distance,
        })
        .collect(),
      not_found,
    }
  }
}
