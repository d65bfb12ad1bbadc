use crate::boxes::FourCC;
use crate::error::{ParseError, Result};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

/// Anything we can decode from: files, `Cursor<Vec<u8>>`, `BufReader<File>`, ...
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Big-endian reader over a seekable source with a bounded read window.
///
/// The reader keeps its own copy of the cursor position so bounds checks never
/// need a round trip to the underlying source. Every read first checks that
/// the requested width fits before `limit`; if it doesn't, nothing is consumed
/// and [`ParseError::TruncatedRead`] is returned.
pub struct Reader<'a> {
    inner: &'a mut dyn ReadSeek,
    pos: u64,
    len: u64,
    limit: u64,
}

impl<'a> Reader<'a> {
    /// Wrap a source, measuring its length. The cursor is moved to offset 0.
    pub fn new(inner: &'a mut dyn ReadSeek) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner,
            pos: 0,
            len,
            limit: len,
        })
    }

    /// Total length of the source in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// End of the current read window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Narrow (or restore) the read window, returning the previous limit.
    ///
    /// The window never extends past the end of the source.
    pub fn set_limit(&mut self, limit: u64) -> u64 {
        std::mem::replace(&mut self.limit, limit.min(self.len))
    }

    /// Bytes left between the cursor and the window end.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.pos)
    }

    pub fn seek_absolute(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    pub fn seek_relative(&mut self, delta: i64) -> Result<()> {
        let target = self.pos.checked_add_signed(delta).ok_or_else(|| {
            ParseError::TruncatedRead {
                offset: self.pos,
                wanted: delta.unsigned_abs(),
                available: self.pos,
            }
        })?;
        self.seek_absolute(target)
    }

    /// Skip `n` bytes inside the window.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.ensure(n)?;
        self.seek_absolute(self.pos + n)
    }

    fn ensure(&self, wanted: u64) -> Result<()> {
        let available = self.remaining();
        if wanted > available {
            return Err(ParseError::TruncatedRead {
                offset: self.pos,
                wanted,
                available,
            });
        }
        Ok(())
    }

    // The source may still come up short if it shrank under us; report that
    // the same way as a window overrun.
    fn map_eof(&self, e: std::io::Error, wanted: u64) -> ParseError {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ParseError::TruncatedRead {
                offset: self.pos,
                wanted,
                available: 0,
            }
        } else {
            ParseError::Io(e)
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let v = self.inner.read_u8().map_err(|e| self.map_eof(e, 1))?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        let v = self
            .inner
            .read_u16::<BigEndian>()
            .map_err(|e| self.map_eof(e, 2))?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.ensure(2)?;
        let v = self
            .inner
            .read_i16::<BigEndian>()
            .map_err(|e| self.map_eof(e, 2))?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        self.ensure(3)?;
        let v = self
            .inner
            .read_u24::<BigEndian>()
            .map_err(|e| self.map_eof(e, 3))?;
        self.pos += 3;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        let v = self
            .inner
            .read_u32::<BigEndian>()
            .map_err(|e| self.map_eof(e, 4))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        let v = self
            .inner
            .read_i32::<BigEndian>()
            .map_err(|e| self.map_eof(e, 4))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        let v = self
            .inner
            .read_u64::<BigEndian>()
            .map_err(|e| self.map_eof(e, 8))?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.ensure(8)?;
        let v = self
            .inner
            .read_i64::<BigEndian>()
            .map_err(|e| self.map_eof(e, 8))?;
        self.pos += 8;
        Ok(v)
    }

    /// Unsigned 16.16 fixed point.
    pub fn read_fixed16_16(&mut self) -> Result<f64> {
        let raw = self.read_u32()?;
        Ok((raw >> 16) as f64 + (raw & 0xffff) as f64 / 65536.0)
    }

    /// Signed 16.16 fixed point (playback rate).
    pub fn read_sfixed16_16(&mut self) -> Result<f64> {
        Ok(self.read_i32()? as f64 / 65536.0)
    }

    /// Signed 8.8 fixed point (volume, balance).
    pub fn read_fixed8_8(&mut self) -> Result<f64> {
        Ok(self.read_i16()? as f64 / 256.0)
    }

    pub fn read_fourcc(&mut self) -> Result<FourCC> {
        Ok(FourCC(self.read_array()?))
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N as u64)?;
        let mut buf = [0u8; N];
        self.inner
            .read_exact(&mut buf)
            .map_err(|e| self.map_eof(e, N as u64))?;
        self.pos += N as u64;
        Ok(buf)
    }

    pub fn read_bytes(&mut self, n: u64) -> Result<Vec<u8>> {
        self.ensure(n)?;
        let mut buf = vec![0u8; n as usize];
        self.inner
            .read_exact(&mut buf)
            .map_err(|e| self.map_eof(e, n))?;
        self.pos += n;
        Ok(buf)
    }

    /// Everything up to the window end.
    pub fn read_to_limit(&mut self) -> Result<Vec<u8>> {
        self.read_bytes(self.remaining())
    }
}
