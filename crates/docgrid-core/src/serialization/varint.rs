//! Variable-length integer encodings.
//!
//! The high bits of the first byte select the width; the value takes the
//! remaining bits, big-endian.
//!
//! | scheme | 1 byte   | 2 bytes            | 4 bytes                  | 8 bytes             |
//! |--------|----------|--------------------|--------------------------|---------------------|
//! | 1-2-4  | `< 0x80` | `< 0x4000`, `10..` | `< 0x4000_0000`, `11..`  |                     |
//! | 1-4    | `< 0x80` |                    | `< 0x8000_0000`, `1...`  |                     |
//! | 2-4-8  |          | `< 0x8000`         | `< 0x4000_0000`, `10..`  | `< 2^62`, `11..`    |

use bytes::{BufMut, BytesMut};

use crate::serialization::reader::ByteReader;
use crate::types::error::{DecodeResult, EncodeError, EncodeResult};

/// Largest value the 1-2-4 scheme can hold
pub const MAX_1_2_4: u32 = 0x3FFF_FFFF;
/// Largest value the 1-4 scheme can hold
pub const MAX_1_4: u32 = 0x7FFF_FFFF;
/// Largest value the 2-4-8 scheme can hold
pub const MAX_2_4_8: u64 = 0x3FFF_FFFF_FFFF_FFFF;

/// Write a value in 1, 2 or 4 bytes
pub fn write_1_2_4(out: &mut BytesMut, value: u32) -> EncodeResult<()> {
    match value {
        0..=0x7F => out.put_u8(value as u8),
        0x80..=0x3FFF => out.put_u16(value as u16 | 0x8000),
        0x4000..=MAX_1_2_4 => out.put_u32(value | 0xC000_0000),
        _ => return Err(EncodeError::OutOfRange { value: value as u64, scheme: "1-2-4" }),
    }
    Ok(())
}

/// Read a 1-2-4 encoded value
pub fn read_1_2_4(r: &mut ByteReader) -> DecodeResult<u32> {
    let first = r.peek_u8()?;
    if first & 0x80 == 0 {
        r.read_u8().map(u32::from)
    } else if first & 0x40 == 0 {
        r.read_u16().map(|v| u32::from(v & 0x3FFF))
    } else {
        r.read_u32().map(|v| v & MAX_1_2_4)
    }
}

/// Write a value in 1 or 4 bytes
pub fn write_1_4(out: &mut BytesMut, value: u32) -> EncodeResult<()> {
    match value {
        0..=0x7F => out.put_u8(value as u8),
        0x80..=MAX_1_4 => out.put_u32(value | 0x8000_0000),
        _ => return Err(EncodeError::OutOfRange { value: value as u64, scheme: "1-4" }),
    }
    Ok(())
}

/// Read a 1-4 encoded value
pub fn read_1_4(r: &mut ByteReader) -> DecodeResult<u32> {
    if r.peek_u8()? & 0x80 == 0 {
        r.read_u8().map(u32::from)
    } else {
        r.read_u32().map(|v| v & MAX_1_4)
    }
}

/// Write a value in 2, 4 or 8 bytes
pub fn write_2_4_8(out: &mut BytesMut, value: u64) -> EncodeResult<()> {
    match value {
        0..=0x7FFF => out.put_u16(value as u16),
        0x8000..=0x3FFF_FFFF => out.put_u32(value as u32 | 0x8000_0000),
        0x4000_0000..=MAX_2_4_8 => out.put_u64(value | 0xC000_0000_0000_0000),
        _ => return Err(EncodeError::OutOfRange { value, scheme: "2-4-8" }),
    }
    Ok(())
}

/// Read a 2-4-8 encoded value
pub fn read_2_4_8(r: &mut ByteReader) -> DecodeResult<u64> {
    let first = r.peek_u8()?;
    if first & 0x80 == 0 {
        r.read_u16().map(u64::from)
    } else if first & 0x40 == 0 {
        r.read_u32().map(|v| u64::from(v & 0x3FFF_FFFF))
    } else {
        r.read_u64().map(|v| v & MAX_2_4_8)
    }
}
