//! Byte-stream collaborators: a bounds-checked reader over an input slice
//! and a seekable in-memory writer.

use std::io::SeekFrom;

use crate::error::RasterError;
use crate::pack::Endian;

/// Read cursor over an in-memory stream. Every failed read reports the
/// offset at which the stream ran out.
#[derive(Clone, Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Whole underlying stream.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn tell(&self) -> u64 {
        self.pos as u64
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Move the cursor. Positions past the end are rejected.
    pub fn seek(&mut self, from: SeekFrom) -> Result<u64, RasterError> {
        let target = match from {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(d) => self.pos as i128 + i128::from(d),
            SeekFrom::End(d) => self.data.len() as i128 + i128::from(d),
        };
        if target < 0 || target > self.data.len() as i128 {
            return Err(self.end_of_stream());
        }
        self.pos = target as usize;
        Ok(self.pos as u64)
    }

    /// Exactly `n` bytes, or `UnexpectedEndOfStream`.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], RasterError> {
        let end = self.pos.checked_add(n).ok_or_else(|| self.end_of_stream())?;
        let bytes = self.data.get(self.pos..end).ok_or_else(|| self.end_of_stream())?;
        self.pos = end;
        Ok(bytes)
    }

    /// Up to `n` bytes; fewer at end of stream.
    pub fn read_available(&mut self, n: usize) -> &'a [u8] {
        let end = self.pos.saturating_add(n).min(self.data.len());
        let bytes = &self.data[self.pos.min(end)..end];
        self.pos = end;
        bytes
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let b = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(b)
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn read_u16(&mut self, order: Endian) -> Result<u16, RasterError> {
        let b = self.read_array::<2>()?;
        Ok(match order {
            Endian::Big => u16::from_be_bytes(b),
            Endian::Little => u16::from_le_bytes(b),
        })
    }

    pub fn read_u32(&mut self, order: Endian) -> Result<u32, RasterError> {
        let b = self.read_array::<4>()?;
        Ok(match order {
            Endian::Big => u32::from_be_bytes(b),
            Endian::Little => u32::from_le_bytes(b),
        })
    }

    pub fn read_u64(&mut self, order: Endian) -> Result<u64, RasterError> {
        let b = self.read_array::<8>()?;
        Ok(match order {
            Endian::Big => u64::from_be_bytes(b),
            Endian::Little => u64::from_le_bytes(b),
        })
    }

    /// `len` bytes at an absolute offset, without moving the cursor.
    pub fn slice_at(&self, offset: u64, len: u64) -> Result<&'a [u8], RasterError> {
        let start = usize::try_from(offset).map_err(|_| self.end_of_stream())?;
        let len = usize::try_from(len).map_err(|_| self.end_of_stream())?;
        let end = start.checked_add(len).ok_or_else(|| self.end_of_stream())?;
        self.data.get(start..end).ok_or_else(|| self.end_of_stream())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], RasterError> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn end_of_stream(&self) -> RasterError {
        RasterError::UnexpectedEndOfStream {
            offset: self.data.len() as u64,
        }
    }
}

/// Seekable in-memory output stream. Writes before the end overwrite.
#[derive(Clone, Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
    pos: usize,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            pos: 0,
        }
    }

    pub fn tell(&self) -> u64 {
        self.pos as u64
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Move the cursor. Seeking past the end zero-fills on the next write.
    pub fn seek(&mut self, from: SeekFrom) -> Result<u64, RasterError> {
        let target = match from {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(d) => self.pos as i128 + i128::from(d),
            SeekFrom::End(d) => self.buf.len() as i128 + i128::from(d),
        };
        let target = usize::try_from(target).map_err(|_| {
            RasterError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek before start of stream",
            ))
        })?;
        self.pos = target;
        Ok(target as u64)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), RasterError> {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            self.buf.try_reserve(end - self.buf.len())?;
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    pub fn write_str(&mut self, s: &str) -> Result<(), RasterError> {
        self.write_bytes(s.as_bytes())
    }

    pub fn write_u16(&mut self, v: u16, order: Endian) -> Result<(), RasterError> {
        match order {
            Endian::Big => self.write_bytes(&v.to_be_bytes()),
            Endian::Little => self.write_bytes(&v.to_le_bytes()),
        }
    }

    pub fn write_u32(&mut self, v: u32, order: Endian) -> Result<(), RasterError> {
        match order {
            Endian::Big => self.write_bytes(&v.to_be_bytes()),
            Endian::Little => self.write_bytes(&v.to_le_bytes()),
        }
    }

    pub fn write_u64(&mut self, v: u64, order: Endian) -> Result<(), RasterError> {
        match order {
            Endian::Big => self.write_bytes(&v.to_be_bytes()),
            Endian::Little => self.write_bytes(&v.to_le_bytes()),
        }
    }

    /// Pad with a zero byte so the cursor sits on an even offset.
    pub fn align_word(&mut self) -> Result<(), RasterError> {
        if self.pos % 2 == 1 {
            self.write_bytes(&[0])?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_reports_end_offset() {
        let mut r = ByteReader::new(&[1, 2, 3]);
        assert_eq!(r.read_bytes(2).unwrap(), &[1, 2]);
        let err = r.read_bytes(2).unwrap_err();
        assert!(matches!(err, RasterError::UnexpectedEndOfStream { offset: 3 }));
        assert_eq!(r.tell(), 2);
        assert_eq!(r.read_available(5), &[3]);
        assert!(r.eof());
    }

    #[test]
    fn reader_seek_and_ints() {
        let mut r = ByteReader::new(&[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(r.read_u16(Endian::Little).unwrap(), 0x3412);
        r.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(r.read_u32(Endian::Big).unwrap(), 0x1234_5678);
        assert!(r.seek(SeekFrom::Current(1)).is_err());
        assert_eq!(r.slice_at(1, 2).unwrap(), &[0x34, 0x56]);
    }

    #[test]
    fn writer_patches_in_place() {
        let mut w = ByteWriter::new();
        w.write_u32(0, Endian::Little).unwrap();
        w.write_str("ab").unwrap();
        w.seek(SeekFrom::Start(0)).unwrap();
        w.write_u32(6, Endian::Little).unwrap();
        w.seek(SeekFrom::End(0)).unwrap();
        w.write_bytes(&[9]).unwrap();
        w.align_word().unwrap();
        assert_eq!(w.into_inner(), vec![6, 0, 0, 0, b'a', b'b', 9, 0]);
    }
}
