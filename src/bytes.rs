//! Little-endian scalar and string readers shared by the header decoder.
//!
//! Every helper maps an unexpected end-of-file onto
//! [`RhsError::TruncatedHeader`] carrying the byte offset reached, so header
//! parsing code can use `?` without losing position information.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::RhsError;

fn map_eof<R: Seek>(reader: &mut R, error: std::io::Error) -> RhsError {
    if error.kind() == ErrorKind::UnexpectedEof {
        let offset = reader.stream_position().unwrap_or(0);
        RhsError::TruncatedHeader { offset }
    } else {
        RhsError::Io(error)
    }
}

pub fn read_i16<R: Read + Seek>(reader: &mut R) -> Result<i16, RhsError> {
    reader
        .read_i16::<LittleEndian>()
        .map_err(|e| map_eof(&mut *reader, e))
}

pub fn read_u32<R: Read + Seek>(reader: &mut R) -> Result<u32, RhsError> {
    reader
        .read_u32::<LittleEndian>()
        .map_err(|e| map_eof(&mut *reader, e))
}

pub fn read_f32<R: Read + Seek>(reader: &mut R) -> Result<f32, RhsError> {
    reader
        .read_f32::<LittleEndian>()
        .map_err(|e| map_eof(&mut *reader, e))
}

/// Reads a QString (UTF-16 string with a 4-byte length prefix).
///
/// RHS files store strings in Qt's serialized form: a u32 byte length
/// followed by UTF-16 code units. The special length 0xFFFFFFFF denotes an
/// empty string.
pub fn read_qstring<R: Read + Seek>(reader: &mut R) -> Result<String, RhsError> {
    let length = read_u32(reader)?;

    if length == 0xFFFF_FFFF {
        return Ok(String::new());
    }

    // Reject lengths that cannot fit in the remainder of the file before
    // attempting a huge allocation.
    let current_position = reader.stream_position()?;
    let file_length = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(current_position))?;

    if u64::from(length) > file_length.saturating_sub(current_position) {
        return Err(RhsError::StringRead {
            offset: current_position,
        });
    }

    let num_units = (length as usize) / 2;

    let mut units = Vec::with_capacity(num_units);
    for _ in 0..num_units {
        let c = reader
            .read_u16::<LittleEndian>()
            .map_err(|e| map_eof(&mut *reader, e))?;
        units.push(c);
    }

    String::from_utf16(&units).map_err(|_| RhsError::StringRead {
        offset: current_position,
    })
}
