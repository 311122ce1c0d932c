//! Seekable byte sources and bounded record readers.

use std::io::{self, Read, Seek, SeekFrom};

use crate::{Error, Result};

/// A seekable byte source: `read(n)`, `seek(offset)` and `size()`.
///
/// Implemented for every `Read + Seek` type (files, cursors).
pub trait ByteSource: Read + Seek {
    /// Total length of the source in bytes. Restores the cursor.
    fn size(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        if pos != end {
            self.seek(SeekFrom::Start(pos))?;
        }
        Ok(end)
    }
}

impl<T: Read + Seek> ByteSource for T {}

/// Seek to `offset`, refusing positions past `limit` (the source size).
pub(crate) fn seek_checked<S: Seek + ?Sized>(source: &mut S, offset: u64, limit: u64) -> Result<()> {
    if offset > limit {
        return Err(Error::TruncatedStream {
            offset,
            need: offset - limit,
            have: 0,
        });
    }
    source.seek(SeekFrom::Start(offset))?;
    Ok(())
}

/// Reader over the content of one record.
///
/// Schemas get one of these instead of the raw source: reads stop at the
/// record's end, so an over-reading schema sees end-of-file instead of its
/// sibling's bytes.
pub struct RecordReader<'a> {
    inner: &'a mut dyn ByteSource,
    start: u64,
    len: u64,
    pos: u64,
}

impl<'a> RecordReader<'a> {
    /// Bound `inner`, positioned at absolute offset `start`, to `len` bytes.
    pub fn new(inner: &'a mut dyn ByteSource, start: u64, len: u64) -> Self {
        Self {
            inner,
            start,
            len,
            pos: 0,
        }
    }

    /// Absolute offset of the first content byte.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Absolute offset of the next byte to be read.
    pub fn offset(&self) -> u64 {
        self.start + self.pos
    }

    /// Content length.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the content is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> u64 {
        self.pos
    }

    /// Bytes left before the record end.
    pub fn remaining(&self) -> u64 {
        self.len - self.pos
    }

    /// Fill `buf` completely or fail with `UnexpectedEof`.
    pub fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read `N` bytes without consuming them.
    pub fn peek_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        if N as u64 > self.remaining() {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        self.inner.seek(SeekFrom::Current(-(N as i64)))?;
        Ok(buf)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> io::Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a big-endian u16.
    pub fn read_u16_be(&mut self) -> io::Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Read a little-endian u16.
    pub fn read_u16_le(&mut self) -> io::Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read a big-endian u32.
    pub fn read_u32_be(&mut self) -> io::Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Read a little-endian u32.
    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a big-endian u64.
    pub fn read_u64_be(&mut self) -> io::Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Read a little-endian u64.
    pub fn read_u64_le(&mut self) -> io::Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read exactly `n` bytes.
    pub fn read_bytes(&mut self, n: u64) -> io::Result<Vec<u8>> {
        if n > self.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("need {n} bytes, {} left in record", self.remaining()),
            ));
        }
        let mut buf = vec![0u8; n as usize];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read everything up to the record end.
    pub fn read_rest(&mut self) -> io::Result<Vec<u8>> {
        self.read_bytes(self.remaining())
    }

    /// Discard `n` bytes.
    pub fn skip(&mut self, n: u64) -> io::Result<()> {
        if n > self.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("cannot skip {n} bytes, {} left in record", self.remaining()),
            ));
        }
        let copied = io::copy(&mut (&mut *self).take(n), &mut io::sink())?;
        if copied != n {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(())
    }
}

impl Read for RecordReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(0);
        }
        let max = buf.len().min(remaining.min(usize::MAX as u64) as usize);
        let n = self.inner.read(&mut buf[..max])?;
        self.pos += n as u64;
        Ok(n)
    }
}

/// Bytes of a record the core keeps without interpreting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpaqueBody {
    /// Still in the tree's source at `offset`; copied on write.
    Deferred { offset: u64, len: u64 },
    /// Held in memory.
    Owned(Vec<u8>),
}

impl OpaqueBody {
    /// Length in bytes.
    pub fn len(&self) -> u64 {
        match self {
            Self::Deferred { len, .. } => *len,
            Self::Owned(bytes) => bytes.len() as u64,
        }
    }

    /// Whether there are no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_byte_source_size_restores_position() {
        let mut cursor = Cursor::new(vec![0u8; 32]);
        cursor.seek(SeekFrom::Start(5)).unwrap();
        assert_eq!(ByteSource::size(&mut cursor).unwrap(), 32);
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn test_record_reader_is_bounded() {
        let mut cursor = Cursor::new(b"abcdefgh".to_vec());
        let mut reader = RecordReader::new(&mut cursor, 0, 4);
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"abcd");
        assert_eq!(reader.remaining(), 0);
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn test_record_reader_integers() {
        let mut cursor = Cursor::new(vec![0x00, 0x01, 0x02, 0x00, 0x00, 0x00, 0xFF]);
        let mut reader = RecordReader::new(&mut cursor, 100, 7);
        assert_eq!(reader.read_u16_be().unwrap(), 1);
        assert_eq!(reader.read_u32_le().unwrap(), 2);
        assert_eq!(reader.offset(), 106);
        assert_eq!(reader.read_u8().unwrap(), 0xFF);
    }

    #[test]
    fn test_record_reader_peek() {
        let mut cursor = Cursor::new(b"abcdef".to_vec());
        let mut reader = RecordReader::new(&mut cursor, 0, 3);
        assert_eq!(&reader.peek_array::<2>().unwrap(), b"ab");
        assert_eq!(reader.consumed(), 0);
        assert_eq!(reader.read_u8().unwrap(), b'a');
        assert!(reader.peek_array::<3>().is_err());
    }

    #[test]
    fn test_record_reader_skip_and_rest() {
        let mut cursor = Cursor::new(b"0123456789".to_vec());
        let mut reader = RecordReader::new(&mut cursor, 0, 8);
        reader.skip(3).unwrap();
        assert_eq!(reader.read_rest().unwrap(), b"34567");
        assert!(reader.skip(1).is_err());
    }

    #[test]
    fn test_seek_checked() {
        let mut cursor = Cursor::new(vec![0u8; 10]);
        assert!(seek_checked(&mut cursor, 10, 10).is_ok());
        assert!(matches!(
            seek_checked(&mut cursor, 11, 10),
            Err(Error::TruncatedStream { offset: 11, .. })
        ));
    }
}
