//! Low-level byte reading utilities

use byteorder::{BigEndian, ReadBytesExt};

use super::error::{DictError, Result};

/// Read a 4 or 8 byte big-endian number from a slice cursor.
///
/// Used for the offset and size fields of index records. Width depends on
/// the `idxoffsetbits` metadata flag (32-bit offsets by default, 64-bit
/// when the flag says "64").
pub fn read_be_number(reader: &mut &[u8], number_width: usize) -> Result<u64> {
    if reader.len() < number_width {
        return Err(DictError::Format(format!(
            "truncated record: need {} bytes, {} remain",
            number_width,
            reader.len()
        )));
    }
    match number_width {
        8 => Ok(reader.read_u64::<BigEndian>()?),
        4 => Ok(u64::from(reader.read_u32::<BigEndian>()?)),
        _ => Err(DictError::Format(format!(
            "invalid number width: {}",
            number_width
        ))),
    }
}

/// Read a 4 byte big-endian number from a slice cursor.
pub fn read_be_u32(reader: &mut &[u8]) -> Result<u32> {
    if reader.len() < 4 {
        return Err(DictError::Format(format!(
            "truncated record: need 4 bytes, {} remain",
            reader.len()
        )));
    }
    Ok(reader.read_u32::<BigEndian>()?)
}

/// Read a NUL-terminated string from a byte slice and advance the slice
/// past the terminator.
///
/// Returns `None` when no terminator exists in the remaining bytes; the
/// caller decides whether that is a truncated record or a legal trailing
/// segment. Terms are decoded lossily: StarDict strings are UTF-8 by
/// specification, and a damaged term should not fail the whole file.
pub fn read_nul_terminated(reader: &mut &[u8]) -> Option<String> {
    let end_pos = reader.iter().position(|&byte| byte == 0)?;
    let text = String::from_utf8_lossy(&reader[..end_pos]).into_owned();
    *reader = &reader[end_pos + 1..];
    Some(text)
}
