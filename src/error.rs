use std::io;

use thiserror::Error;

/// Errors produced while decoding an RHS file.
///
/// Header-region errors (`InvalidMagic`, `UnsupportedVersion`,
/// `TruncatedHeader`) are fatal: no partial header is ever returned, since
/// sizing of every channel array depends on a fully valid header. A data body
/// that ends mid-block is *not* an error; the decoder keeps the complete
/// blocks and reports the remainder through
/// [`Diagnostics`](crate::types::Diagnostics).
#[derive(Debug, Error)]
pub enum RhsError {
    /// The first four bytes did not match the RHS magic number.
    #[error("not an RHS file: found magic 0x{found:08x}")]
    InvalidMagic {
        /// The value actually read from the file.
        found: u32,
    },

    /// The file declares a format version this crate does not know how to lay out.
    #[error("unsupported RHS file version {major}.{minor}")]
    UnsupportedVersion { major: i32, minor: i32 },

    /// The byte source ended inside the header region.
    #[error("file truncated inside header at byte offset {offset}")]
    TruncatedHeader {
        /// Cursor position reached when the source ran out.
        offset: u64,
    },

    /// A data block's embedded sample index was negative, meaning the computed
    /// block boundary has desynchronized from the byte stream.
    #[error("invalid sample index {value} in data block {block}")]
    InvalidBlockIndex { block: usize, value: i32 },

    /// A channel record carried a signal-type tag outside the RHS layout table.
    #[error("invalid channel signal type {code}")]
    InvalidChannelType { code: i32 },

    /// A length-prefixed string claimed more bytes than remain in the file,
    /// or contained invalid UTF-16 data.
    #[error("unreadable string at byte offset {offset}")]
    StringRead { offset: u64 },

    /// An I/O error from the underlying byte source.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
