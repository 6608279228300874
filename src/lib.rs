//! Decoder for Intan RHS neural recording files.
//!
//! An RHS file is a structured header (device version, sampling rates,
//! filter settings, channel catalogs) followed by a body of fixed-size
//! multiplexed data blocks. This crate reconstructs both into strongly-typed
//! in-memory arrays: one contiguous sample array per channel plus a shared
//! timestamp vector.
//!
//! The common entry point is [`load`]:
//!
//! ```no_run
//! let result = intan_rhs::load("path/to/your/file.rhs");
//! match result {
//!     Ok(rhs_file) => println!("Sample rate: {} Hz", rhs_file.header.sample_rate),
//!     Err(e) => println!("Error loading file: {}", e),
//! }
//! ```
//!
//! [`decode`] accepts any seekable byte source; [`decode_with`] adds
//! header-only decoding and cooperative cancellation.

mod bytes;
mod data;
mod error;
mod header;
pub mod types;

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

pub use error::RhsError;
pub use types::*;

/// Options controlling a decode call.
///
/// The default decodes the whole file with no cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Stop after the header; the result carries no sample data. The
    /// presence flag still reflects whether a data body exists, which makes
    /// this useful for quick metadata inspection of large files.
    pub header_only: bool,
    /// Checked between data blocks. When set, decoding stops and returns the
    /// blocks already consumed with `diagnostics.cancelled` set.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl DecodeOptions {
    pub fn header_only() -> Self {
        DecodeOptions {
            header_only: true,
            ..DecodeOptions::default()
        }
    }
}

/// Decodes an RHS file from a seekable byte source positioned at offset 0.
pub fn decode<R: Read + Seek>(reader: &mut R) -> Result<RhsFile, RhsError> {
    decode_with(reader, &DecodeOptions::default())
}

/// Decodes an RHS file with explicit [`DecodeOptions`].
pub fn decode_with<R: Read + Seek>(
    reader: &mut R,
    options: &DecodeOptions,
) -> Result<RhsFile, RhsError> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let header = header::read_header(reader)?;

    if options.header_only {
        let body_bytes = file_size.saturating_sub(reader.stream_position()?);
        let data_present = body_bytes / data::bytes_per_data_block(&header) as u64 > 0;
        return Ok(RhsFile {
            header,
            data: None,
            data_present,
            diagnostics: Diagnostics::default(),
        });
    }

    let (data, data_present, diagnostics) = data::read_data(
        &header,
        reader,
        file_size,
        options.cancel.as_deref(),
    )?;

    Ok(RhsFile {
        header,
        data,
        data_present,
        diagnostics,
    })
}

/// Loads an RHS file from disk and returns a struct representation.
///
/// Uses buffered I/O; for large files the whole recording is held in memory.
///
/// # Examples
///
/// ```no_run
/// use intan_rhs::load;
///
/// let rhs_file = load("path/to/your/file.rhs").unwrap();
/// println!("Duration: {:.2} s", rhs_file.duration());
/// ```
pub fn load<P: AsRef<Path>>(file_path: P) -> Result<RhsFile, RhsError> {
    let tic = Instant::now();

    let file = File::open(file_path.as_ref())?;
    let mut reader = BufReader::with_capacity(65536, file);

    let rhs_file = decode(&mut reader)?;

    log::info!("Done. Elapsed time: {:.1} seconds", tic.elapsed().as_secs_f64());

    Ok(rhs_file)
}

/// Reads only the header of an RHS file, skipping the data body entirely.
pub fn load_header<P: AsRef<Path>>(file_path: P) -> Result<RhsHeader, RhsError> {
    let file = File::open(file_path.as_ref())?;
    let mut reader = BufReader::with_capacity(65536, file);

    let rhs_file = decode_with(&mut reader, &DecodeOptions::header_only())?;
    Ok(rhs_file.header)
}
