//! STITCHROM, an extraction and verification tool for Brother KH-970
//! knitting-machine pattern ROMs.

#![deny(missing_docs)]
#![deny(unused)]
#![deny(warnings)]
#![deny(unsafe_code)]

pub mod bcd;
pub mod bitmap;
pub mod chart;
pub mod error;
pub mod index;
pub mod patch;
pub mod raster;
pub mod report;
pub mod rom;
pub mod scan;
