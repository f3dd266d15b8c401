//! Bounds-checked big-endian reader over a shared buffer.
//!
//! Every read checks the remaining length first and fails with
//! [`DecodeError::UnexpectedEof`] instead of panicking. Sub-slices are taken
//! from the underlying [`Bytes`] without copying.

use bytes::Bytes;

use crate::types::error::{DecodeError, DecodeResult};

/// Cursor over a [`Bytes`] buffer
#[derive(Debug, Clone)]
pub struct ByteReader {
    buf: Bytes,
    pos: usize,
}

macro_rules! read_be {
    ($name:ident, $ty:ty) => {
        #[doc = concat!("Read a big-endian `", stringify!($ty), "`")]
        pub fn $name(&mut self) -> DecodeResult<$ty> {
            const N: usize = std::mem::size_of::<$ty>();
            self.ensure(N)?;
            let mut raw = [0u8; N];
            raw.copy_from_slice(&self.buf[self.pos..self.pos + N]);
            self.pos += N;
            Ok(<$ty>::from_be_bytes(raw))
        }
    };
}

impl ByteReader {
    /// Reader positioned at the start of `buf`
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self { buf: buf.into(), pos: 0 }
    }

    /// Current offset from the start of the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor back to an earlier offset
    pub fn rewind_to(&mut self, pos: usize) {
        self.pos = pos.min(self.buf.len());
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether everything has been read
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fail unless at least `n` bytes remain
    pub fn ensure(&self, n: usize) -> DecodeResult<()> {
        if self.remaining() < n {
            return Err(DecodeError::eof(n, self.remaining()));
        }
        Ok(())
    }

    /// Next byte without consuming it
    pub fn peek_u8(&self) -> DecodeResult<u8> {
        self.ensure(1)?;
        Ok(self.buf[self.pos])
    }

    read_be!(read_u8, u8);
    read_be!(read_i8, i8);
    read_be!(read_u16, u16);
    read_be!(read_i16, i16);
    read_be!(read_u32, u32);
    read_be!(read_i32, i32);
    read_be!(read_u64, u64);
    read_be!(read_i64, i64);

    /// Read a big-endian IEEE-754 single
    pub fn read_f32(&mut self) -> DecodeResult<f32> {
        self.read_u32().map(f32::from_bits)
    }

    /// Read a big-endian IEEE-754 double
    pub fn read_f64(&mut self) -> DecodeResult<f64> {
        self.read_u64().map(f64::from_bits)
    }

    /// Take the next `n` bytes as a shared slice
    pub fn read_bytes(&mut self, n: usize) -> DecodeResult<Bytes> {
        self.ensure(n)?;
        let out = self.buf.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(out)
    }

    /// Skip `n` bytes
    pub fn skip(&mut self, n: usize) -> DecodeResult<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Read a NUL-terminated UTF-8 string, consuming the terminator
    pub fn read_cstring(&mut self) -> DecodeResult<String> {
        let rest = &self.buf[self.pos..];
        let Some(len) = rest.iter().position(|b| *b == 0) else {
            return Err(DecodeError::eof(rest.len() + 1, rest.len()));
        };
        let text = std::str::from_utf8(&rest[..len])
            .map_err(|_| DecodeError::InvalidUtf8)?
            .to_string();
        self.pos += len + 1;
        Ok(text)
    }

    /// Split off the next `n` bytes as an independent reader
    pub fn sub_reader(&mut self, n: usize) -> DecodeResult<ByteReader> {
        self.read_bytes(n).map(ByteReader::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian() {
        let mut r = ByteReader::new(vec![0x00, 0x01, 0xff, 0xff, 0xff, 0xfe, 0x3f, 0xf0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(r.read_u16().unwrap(), 1);
        assert_eq!(r.read_i32().unwrap(), -2);
        assert_eq!(r.read_f64().unwrap(), 1.0);
        assert!(r.is_empty());
    }

    #[test]
    fn short_read_is_eof_not_panic() {
        let mut r = ByteReader::new(vec![1, 2, 3]);
        assert_eq!(r.read_u32(), Err(DecodeError::eof(4, 3)));
        assert_eq!(r.position(), 0);
        assert!(r.read_bytes(4).is_err());
    }

    #[test]
    fn cstring_requires_terminator() {
        let mut r = ByteReader::new(b"abc\0def".to_vec());
        assert_eq!(r.read_cstring().unwrap(), "abc");
        assert!(matches!(r.read_cstring(), Err(DecodeError::UnexpectedEof { .. })));
        assert_eq!(r.remaining(), 3);
    }

    #[test]
    fn rewind_restores_position() {
        let mut r = ByteReader::new(vec![7, 8, 9]);
        let mark = r.position();
        r.skip(2).unwrap();
        r.rewind_to(mark);
        assert_eq!(r.read_u8().unwrap(), 7);
    }
}
