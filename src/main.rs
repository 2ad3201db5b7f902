//! The STITCHROM command-line tool.

#![deny(missing_docs)]
#![deny(unused)]
#![deny(warnings)]
#![deny(unsafe_code)]

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process;

use structopt::StructOpt;

use stitchrom::bitmap;
use stitchrom::chart;
use stitchrom::error::Errors;
use stitchrom::index;
use stitchrom::patch;
use stitchrom::raster;
use stitchrom::report::Report;
use stitchrom::rom::Rom;
use stitchrom::scan;
use stitchrom::scan::Matcher;

#[derive(StructOpt)]
#[structopt(
  name = "stitchrom",
  about = "Brother KH-970 pattern ROM extraction and verification"
)]
enum Command {
  /// Decodes every pattern in the ROM into PNG images.
  Extract {
    /// The ROM image to read.
    #[structopt(long, parse(from_os_str))]
    rom: PathBuf,
    /// The directory images are written into.
    #[structopt(long, parse(from_os_str), default_value = "patterns")]
    out: PathBuf,
  },
  /// Locates candidate charts in the ROM and writes a redacted copy.
  Scan {
    /// The ROM image to search.
    #[structopt(long, parse(from_os_str))]
    rom: PathBuf,
    /// Candidate chart files: rows of `#` and `.`, top to bottom.
    #[structopt(parse(from_os_str), required = true)]
    charts: Vec<PathBuf>,
    /// Fuzzy bit-error tolerance, as a fraction of a pattern's bits.
    #[structopt(long, default_value = "0.1")]
    tolerance: f64,
    /// Where to write the redacted ROM. Derived from the ROM's name when
    /// not given.
    #[structopt(long, parse(from_os_str))]
    zeroed: Option<PathBuf>,
    /// Where to write a machine-readable report.
    #[structopt(long, parse(from_os_str))]
    report: Option<PathBuf>,
    /// Regenerate fuzzy-matched charts from ROM content.
    #[structopt(long)]
    rewrite: bool,
    /// Print the search window and per-candidate progress.
    #[structopt(short, long)]
    verbose: bool,
  },
}

fn main() {
  let result = match Command::from_args() {
    Command::Extract { rom, out } => extract(&rom, &out),
    Command::Scan {
      rom,
      charts,
      tolerance,
      zeroed,
      report,
      rewrite,
      verbose,
    } => scan_charts(
      &rom, &charts, tolerance, zeroed, report, rewrite, verbose,
    ),
  };

  if let Err(e) = result {
    eprintln!("error: {}", e);
    process::exit(2);
  }
}

/// Reads and validates the ROM image at `path`.
fn load_rom(path: &Path) -> io::Result<Rom> {
  let bytes = fs::read(path)?;
  Rom::new(bytes)
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

/// The decode pipeline: ROM to images.
fn extract(rom_path: &Path, out: &Path) -> io::Result<()> {
  let rom = load_rom(rom_path)?;
  fs::create_dir_all(out)?;

  let (patterns, index_errors) = index::read_index(&rom);

  let mut decode_errors = Errors::new();
  let mut saved = 0;
  for desc in &patterns {
    let bitmap = match bitmap::decode(&rom, desc) {
      Ok(bitmap) => bitmap,
      Err(e) => {
        decode_errors.push(e);
        continue;
      }
    };

    let path = out.join(format!("{:03}.png", desc.number));
    raster::write_png(&bitmap, &path)?;
    println!(
      "saved pattern {} ({}x{}, {}) to {}",
      desc.number,
      bitmap.width,
      bitmap.height,
      desc.kind,
      path.display()
    );
    saved += 1;
  }
  println!("{} of {} patterns extracted", saved, patterns.len());

  let mut failed = index_errors.dump_to(io::stderr())?;
  failed |= decode_errors.dump_to(io::stderr())?;
  if failed {
    process::exit(1);
  }
  Ok(())
}

/// The verification pipeline: candidate charts to located offsets and a
/// redacted ROM.
fn scan_charts(
  rom_path: &Path,
  chart_paths: &[PathBuf],
  tolerance: f64,
  zeroed: Option<PathBuf>,
  report_path: Option<PathBuf>,
  rewrite: bool,
  verbose: bool,
) -> io::Result<()> {
  let rom = load_rom(rom_path)?;

  let (candidates, chart_errors) = chart::load_all(chart_paths);
  let failed_loads = chart_errors.dump_to(io::stderr())?;
  if candidates.is_empty() {
    eprintln!("error: no usable charts");
    process::exit(1);
  }

  let mut matcher = Matcher::with_tolerance(&rom, tolerance);
  if verbose {
    for gap in matcher.gaps() {
      println!("searching {:06x}-{:06x}", gap.start, gap.end);
    }
    println!("loaded {} charts", candidates.len());
  }
  let results = matcher.run(&candidates);

  // The consolidated listing: matches by offset, unknown ranges between.
  let mut ordered: Vec<&scan::Match> = results.matches.iter().collect();
  ordered.sort_by_key(|m| m.start);
  for (i, m) in ordered.iter().enumerate() {
    let refs: String = scan::find_offset_references(&rom, m.start)
      .iter()
      .map(|r| format!(" @{:06x}", r))
      .collect();
    let fuzzy = match m.distance {
      Some(d) => format!(" (fuzzy: {} bits)", d),
      None => String::new(),
    };
    println!("{:06x}-{:06x}: {}{}{}", m.start, m.end, m.name, fuzzy, refs);

    if let Some(next) = ordered.get(i + 1) {
      if m.end != next.start {
        println!("{:06x}-{:06x}: <unknown>", m.end, next.start);
      }
    }
  }

  for a in &results.ambiguous {
    match a.distance {
      Some(d) => println!(
        "{} has {} positions at {} bits difference:",
        a.name,
        a.positions.len(),
        d
      ),
      None => println!("{} appears at multiple offsets:", a.name),
    }
    for pos in &a.positions {
      println!("  {:06x}", pos);
    }
  }

  if !results.not_found.is_empty() {
    let mut not_found = results.not_found.clone();
    not_found.sort();
    println!("not found in ROM:");
    for name in not_found {
      println!("  {}", name);
    }
  }

  if rewrite {
    for m in &results.matches {
      if m.distance.is_none() {
        continue;
      }
      if let Some(candidate) = candidates.iter().find(|c| c.name == m.name) {
        let text = chart::unpack(
          &rom.bytes()[m.start..m.end],
          candidate.width,
          candidate.height,
        );
        fs::write(&candidate.path, text)?;
        println!("rewrote {} from ROM content", candidate.path.display());
      }
    }
  }

  let zeroed = zeroed.unwrap_or_else(|| default_zeroed_path(rom_path));
  fs::write(&zeroed, patch::zero_ranges(&rom, &results.matches))?;
  println!("wrote redacted ROM to {}", zeroed.display());

  if let Some(path) = report_path {
    let report = Report::new(&rom, &results);
    let text = json5::to_string(&report)
      .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    fs::write(&path, text)?;
    println!("wrote report to {}", path.display());
  }

  if failed_loads {
    process::exit(1);
  }
  Ok(())
}

fn default_zeroed_path(rom: &Path) -> PathBuf {
  let stem = match rom.file_stem() {
    Some(stem) => stem.to_string_lossy().into_owned(),
    None => "rom".to_string(),
  };
  rom.with_file_name(format!("{}-zeroed.bin", stem))
}
